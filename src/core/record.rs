//! Record trait and the typed repository over the storage layer
//!
//! [`Record`] binds a domain type to its table definition and validation
//! configs. [`Dao`] wraps a [`TableStore`] with typed CRUD operations:
//! payload validation, merge-patch updates, identifier resolution (guid or
//! natural key), pagination, search and revision queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::error::{ApiError, ApiResult, EntityError, RequestError, ValidationError};
use crate::core::query::{ListParams, Page, TableRevision};
use crate::core::schema::{PROTECTED_COLUMNS, TableSchema};
use crate::core::validation::{Operation, ValidationConfig};
use crate::storage::TableStore;

/// Base trait for all persisted entity types.
///
/// Implemented by the `impl_record!` macro; the defining module supplies the
/// table schema and validation configs.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The table definition backing this type
    fn table() -> &'static TableSchema;

    /// The plural resource name used in URLs (e.g., "countries")
    fn resource_name() -> &'static str;

    /// The singular resource name (e.g., "country")
    fn resource_name_singular() -> &'static str;

    /// Validation configuration for an operation
    fn validation(op: Operation) -> ValidationConfig;

    // === Core Record Fields ===

    /// Primary key, absent until the row is persisted
    fn id(&self) -> Option<i64>;

    /// 6-digit public identifier, absent until the row is persisted
    fn guid(&self) -> Option<i64>;

    /// Get the creation timestamp
    fn created_at(&self) -> DateTime<Utc>;

    /// Get the last update timestamp
    fn updated_at(&self) -> DateTime<Utc>;

    /// Whether the record has been persisted
    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }
}

/// Typed repository for one record type.
///
/// All route handlers and domain flows go through a `Dao`; it owns the
/// validation pipeline and never lets an invalid row reach the store.
pub struct Dao<R: Record> {
    store: Arc<dyn TableStore>,
    _marker: PhantomData<R>,
}

impl<R: Record> Clone for Dao<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Record> Dao<R> {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn from_row(row: Value) -> ApiResult<R> {
        serde_json::from_value(row).map_err(|e| {
            ApiError::Entity(EntityError::Serialization {
                resource: R::resource_name_singular().to_string(),
                message: e.to_string(),
            })
        })
    }

    fn from_rows(rows: Vec<Value>) -> ApiResult<Vec<R>> {
        rows.into_iter().map(Self::from_row).collect()
    }

    /// Drop keys that are neither declared columns nor base columns
    fn strip_unknown(obj: &mut Map<String, Value>) {
        let schema = R::table();
        obj.retain(|k, _| {
            schema.column(k).is_some() || crate::core::schema::BASE_COLUMNS.contains(&k.as_str())
        });
    }

    /// Validate a payload and insert a new row.
    ///
    /// The store assigns `id` and `guid`; client-supplied values for the
    /// base columns are discarded.
    pub async fn create_from(&self, payload: &Value) -> ApiResult<R> {
        let config = R::validation(Operation::Create);
        let cleaned = config
            .apply(payload, Operation::Create)
            .map_err(ValidationError::FieldErrors)?;
        config.check_row(&cleaned).map_err(ValidationError::FieldErrors)?;

        let mut obj = cleaned.as_object().cloned().unwrap_or_default();
        Self::strip_unknown(&mut obj);
        for base in crate::core::schema::BASE_COLUMNS {
            obj.remove(*base);
        }
        let now = Utc::now();
        obj.insert("created_at".to_string(), serde_json::to_value(now)?);
        obj.insert("updated_at".to_string(), serde_json::to_value(now)?);

        let stored = self.store.insert(R::table(), Value::Object(obj)).await?;
        Self::from_row(stored)
    }

    /// Validate a partial payload and update the row with the given guid.
    ///
    /// Only fields supplied in the payload change; row checks and status
    /// transitions run against the merged row.
    pub async fn update_from(&self, guid: i64, payload: &Value) -> ApiResult<R> {
        let old = self.require_row(guid).await?;

        let config = R::validation(Operation::Update);
        let patch = config
            .apply(payload, Operation::Update)
            .map_err(ValidationError::FieldErrors)?;

        let mut merged = old.as_object().cloned().unwrap_or_default();
        if let Some(patch_obj) = patch.as_object() {
            for (key, value) in patch_obj {
                if PROTECTED_COLUMNS.contains(&key.as_str()) || key == "updated_at" {
                    continue;
                }
                if R::table().column(key).is_none() {
                    continue;
                }
                merged.insert(key.clone(), value.clone());
            }
        }
        let merged = Value::Object(merged);

        config.check_row(&merged).map_err(ValidationError::FieldErrors)?;
        config
            .check_transition(&old, &merged)
            .map_err(ValidationError::FieldErrors)?;

        let mut obj = merged.as_object().cloned().unwrap_or_default();
        obj.insert("updated_at".to_string(), serde_json::to_value(Utc::now())?);

        let stored = self
            .store
            .update(R::table(), guid, Value::Object(obj))
            .await?;
        Self::from_row(stored)
    }

    /// Persist a domain object: insert when unpersisted, replace otherwise.
    pub async fn save(&self, record: &R) -> ApiResult<R> {
        let row = serde_json::to_value(record)?;
        match record.guid() {
            None => self.create_from(&row).await,
            Some(guid) => self.update_from(guid, &row).await,
        }
    }

    async fn require_row(&self, guid: i64) -> ApiResult<Value> {
        self.store
            .find_by_guid(R::table(), guid)
            .await?
            .ok_or_else(|| {
                ApiError::Entity(EntityError::NotFound {
                    resource: R::resource_name_singular().to_string(),
                    identifier: guid.to_string(),
                })
            })
    }

    /// Load by guid, failing with 404 when absent
    pub async fn load(&self, guid: i64) -> ApiResult<R> {
        let row = self.require_row(guid).await?;
        Self::from_row(row)
    }

    /// Load by guid, returning None when absent
    pub async fn find(&self, guid: i64) -> ApiResult<Option<R>> {
        match self.store.find_by_guid(R::table(), guid).await? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Resolve an identifier: all digits → guid, otherwise the natural key.
    pub async fn load_by_identifier(&self, identifier: &str) -> ApiResult<R> {
        if !identifier.is_empty() && identifier.chars().all(|c| c.is_ascii_digit()) {
            let guid: i64 = identifier.parse().map_err(|_| {
                ApiError::Request(RequestError::InvalidIdentifier {
                    resource: R::resource_name_singular().to_string(),
                    value: identifier.to_string(),
                })
            })?;
            return self.load(guid).await;
        }

        let Some(key) = R::table().natural_key else {
            return Err(ApiError::Request(RequestError::InvalidIdentifier {
                resource: R::resource_name_singular().to_string(),
                value: identifier.to_string(),
            }));
        };

        let rows = self
            .store
            .find_eq(R::table(), key, &Value::String(identifier.to_string()))
            .await?;
        match rows.into_iter().next() {
            Some(row) => Self::from_row(row),
            None => Err(ApiError::Entity(EntityError::NotFound {
                resource: R::resource_name_singular().to_string(),
                identifier: identifier.to_string(),
            })),
        }
    }

    /// One page of rows plus the table total
    pub async fn list(&self, params: &ListParams) -> ApiResult<Page<R>> {
        let rows = self
            .store
            .list(R::table(), params.offset(), params.limit())
            .await?;
        let total = self.store.count(R::table()).await?;
        Ok(Page::new(Self::from_rows(rows)?, params, total))
    }

    /// Every row in the table (export endpoint)
    pub async fn all(&self) -> ApiResult<Vec<R>> {
        Self::from_rows(self.store.all(R::table()).await?)
    }

    /// Exact-match search restricted to searchable columns
    pub async fn search(&self, field: &str, raw: &str) -> ApiResult<Vec<R>> {
        let schema = R::table();
        if !schema.is_searchable(field) {
            return Err(ApiError::Request(RequestError::UnknownSearchField {
                resource: R::resource_name().to_string(),
                field: field.to_string(),
            }));
        }
        // a value the column type cannot hold matches nothing
        let Some(value) = schema.coerce(field, raw) else {
            return Ok(Vec::new());
        };
        Self::from_rows(self.store.find_eq(schema, field, &value).await?)
    }

    /// Exact-match filter on a known column (entity filter routes)
    pub async fn filter_eq(&self, field: &'static str, raw: &str) -> ApiResult<Vec<R>> {
        let schema = R::table();
        let Some(value) = schema.coerce(field, raw) else {
            return Ok(Vec::new());
        };
        Self::from_rows(self.store.find_eq(schema, field, &value).await?)
    }

    /// Delete by guid, failing with 404 when absent
    pub async fn delete(&self, guid: i64) -> ApiResult<()> {
        self.store.delete(R::table(), guid).await
    }

    pub async fn count(&self) -> ApiResult<u64> {
        self.store.count(R::table()).await
    }

    pub async fn revision(&self) -> ApiResult<TableRevision> {
        self.store.revision(R::table()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_identifier_detection() {
        // mirrors the branch in load_by_identifier
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        assert!(digits("100001"));
        assert!(!digits("FR"));
        assert!(!digits("txn_8a1f"));
        assert!(!digits(""));
        assert!(!digits("12a"));
    }
}
