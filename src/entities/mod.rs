//! Entity modules
//!
//! One module per table. Each declares its schema, validation rules, domain
//! type (via `impl_record!`) and routes. `default_registry` lists them all
//! in dependency order (referenced tables first), which both the router and
//! the SQL schema setup rely on.

pub mod macros;

pub mod activity_log;
pub mod billing_cycle;
pub mod country;
pub mod currency;
pub mod employee_license;
pub mod exchange_rate;
pub mod fraud_event;
pub mod global_license;
pub mod license_adjustment;
pub mod payment_method;
pub mod payment_transaction;
pub mod tax_rule;
pub mod tenant;

use crate::server::registry::TableRegistry;

/// Tolerance used by every amount-reconciliation rule.
/// Amounts are carried as doubles, so equality is always approximate.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// Approximate equality within [`AMOUNT_TOLERANCE`]
pub fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= AMOUNT_TOLERANCE
}

/// Registry with every resource, in dependency order
pub fn default_registry() -> TableRegistry {
    let mut registry = TableRegistry::new();
    registry.register::<country::Country>(country::routes);
    registry.register::<currency::Currency>(currency::routes);
    registry.register::<exchange_rate::ExchangeRate>(exchange_rate::routes);
    registry.register::<tax_rule::TaxRule>(tax_rule::routes);
    registry.register::<tenant::Tenant>(tenant::routes);
    registry.register::<global_license::GlobalLicense>(global_license::routes);
    registry.register::<employee_license::EmployeeLicense>(employee_license::routes);
    registry.register::<billing_cycle::BillingCycle>(billing_cycle::routes);
    registry.register::<payment_method::PaymentMethod>(payment_method::routes);
    registry.register::<license_adjustment::LicenseAdjustment>(license_adjustment::routes);
    registry.register::<payment_transaction::PaymentTransaction>(payment_transaction::routes);
    registry.register::<fraud_event::FraudEvent>(fraud_event::routes);
    registry.register::<activity_log::ActivityLog>(activity_log::routes);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_match_within_tolerance() {
        assert!(amounts_match(120.0, 120.005));
        assert!(amounts_match(120.0, 120.01));
        assert!(!amounts_match(120.0, 120.02));
    }

    #[test]
    fn test_default_registry_has_all_resources() {
        let registry = default_registry();
        assert_eq!(registry.resource_names().len(), 13);
    }

    #[test]
    fn test_guid_offsets_are_distinct() {
        let registry = default_registry();
        let mut offsets: Vec<i64> = registry.schemas().iter().map(|s| s.guid_offset).collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), 13);
    }
}
