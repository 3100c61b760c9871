//! Table registry mapping table names to schemas and resource routers
//!
//! Built once at startup, the registry is the single list of every resource
//! the process serves. The server builder turns it into the route tree and
//! the PostgreSQL backend uses it to create all tables, so registration
//! order matters: referenced tables come first.

use axum::Router;

use crate::core::record::Record;
use crate::core::schema::TableSchema;
use crate::server::rest::AppState;

/// One registered resource: identity, table definition, route factory
pub struct ResourceDescriptor {
    pub singular: &'static str,
    pub plural: &'static str,
    pub schema: &'static TableSchema,
    routes: fn() -> Router<AppState>,
}

/// Registry for all resources in the application
#[derive(Default)]
pub struct TableRegistry {
    resources: Vec<ResourceDescriptor>,
}

impl TableRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Register a record type with its route factory.
    ///
    /// Registering the same table twice replaces the earlier entry.
    pub fn register<R: Record>(&mut self, routes: fn() -> Router<AppState>) {
        let descriptor = ResourceDescriptor {
            singular: R::resource_name_singular(),
            plural: R::resource_name(),
            schema: R::table(),
            routes,
        };
        if let Some(pos) = self
            .resources
            .iter()
            .position(|r| r.schema.table == descriptor.schema.table)
        {
            self.resources[pos] = descriptor;
        } else {
            self.resources.push(descriptor);
        }
    }

    /// All table schemas in registration (dependency) order
    pub fn schemas(&self) -> Vec<&'static TableSchema> {
        self.resources.iter().map(|r| r.schema).collect()
    }

    /// Look up a schema by table name
    pub fn schema_for(&self, table: &str) -> Option<&'static TableSchema> {
        self.resources
            .iter()
            .find(|r| r.schema.table == table)
            .map(|r| r.schema)
    }

    /// Plural resource names, in registration order
    pub fn resource_names(&self) -> Vec<&'static str> {
        self.resources.iter().map(|r| r.plural).collect()
    }

    /// Build a router with every resource nested under its plural name
    pub fn build_routes(&self) -> Router<AppState> {
        let mut router = Router::new();
        for r in &self.resources {
            router = router.nest(&format!("/{}", r.plural), (r.routes)());
        }
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::country::Country;
    use crate::entities::currency::Currency;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = TableRegistry::new();
        assert!(registry.resource_names().is_empty());
    }

    #[test]
    fn test_register_resources() {
        let mut registry = TableRegistry::new();
        registry.register::<Country>(crate::entities::country::routes);
        registry.register::<Currency>(crate::entities::currency::routes);

        assert_eq!(registry.resource_names(), vec!["countries", "currencies"]);
        assert!(registry.schema_for("countries").is_some());
        assert!(registry.schema_for("missing").is_none());
    }

    #[test]
    fn test_register_duplicate_replaces() {
        let mut registry = TableRegistry::new();
        registry.register::<Country>(crate::entities::country::routes);
        registry.register::<Country>(crate::entities::country::routes);
        assert_eq!(registry.resource_names().len(), 1);
    }

    #[test]
    fn test_schemas_keep_registration_order() {
        let registry = crate::entities::default_registry();
        let tables: Vec<&str> = registry.schemas().iter().map(|s| s.table).collect();
        // referenced tables must precede their referents
        let pos = |t: &str| tables.iter().position(|x| *x == t).unwrap();
        assert!(pos("currencies") < pos("exchange_rates"));
        assert!(pos("countries") < pos("tenants"));
        assert!(pos("tenants") < pos("global_licenses"));
        assert!(pos("global_licenses") < pos("billing_cycles"));
        assert!(pos("license_adjustments") < pos("payment_transactions"));
        assert!(pos("payment_transactions") < pos("fraud_events"));
    }
}
