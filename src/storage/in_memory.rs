//! In-memory implementation of TableStore for testing and development
//!
//! The default backend. All tables live behind one RwLock, which is what
//! makes guid assignment and uniqueness checks atomic: a write takes the
//! lock, verifies constraints, assigns `id`/`guid` and inserts in one
//! critical section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::core::error::{ApiError, ApiResult, EntityError, StorageError, ValidationError};
use crate::core::query::TableRevision;
use crate::core::schema::TableSchema;
use crate::storage::TableStore;

#[derive(Default)]
struct TableData {
    /// Rows keyed by id; BTreeMap keeps listing in insertion order
    rows: BTreeMap<i64, Value>,
    last_id: i64,
}

/// In-memory table store
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, TableData>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn lock_err(e: impl std::fmt::Display) -> ApiError {
        ApiError::Storage(StorageError::Backend {
            backend: "in-memory".to_string(),
            message: format!("failed to acquire lock: {}", e),
        })
    }

    /// Check declared unique constraints, ignoring the row with `skip_id`.
    ///
    /// Tuples containing a null never conflict (SQL semantics).
    fn check_uniques(
        schema: &TableSchema,
        tables: &HashMap<String, TableData>,
        row: &Value,
        skip_id: Option<i64>,
    ) -> ApiResult<()> {
        let Some(data) = tables.get(schema.table) else {
            return Ok(());
        };

        for u in &schema.uniques {
            let candidate: Vec<&Value> = u
                .columns
                .iter()
                .map(|c| row.get(*c).unwrap_or(&Value::Null))
                .collect();
            if candidate.iter().any(|v| v.is_null()) {
                continue;
            }

            let clash = data.rows.iter().any(|(id, existing)| {
                if Some(*id) == skip_id {
                    return false;
                }
                u.columns
                    .iter()
                    .zip(&candidate)
                    .all(|(c, v)| existing.get(*c).unwrap_or(&Value::Null) == *v)
            });

            if clash {
                return Err(ApiError::Entity(EntityError::Conflict {
                    resource: schema.table.to_string(),
                    constraint: u.name.to_string(),
                }));
            }
        }

        Ok(())
    }

    /// Check that every non-null foreign-key column points at an existing row
    fn check_foreign_keys(
        schema: &TableSchema,
        tables: &HashMap<String, TableData>,
        row: &Value,
    ) -> ApiResult<()> {
        for fk in &schema.foreign_keys {
            let value = row.get(fk.column).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }
            let exists = tables
                .get(fk.ref_table)
                .map(|data| {
                    data.rows
                        .values()
                        .any(|r| r.get(fk.ref_column).unwrap_or(&Value::Null) == value)
                })
                .unwrap_or(false);
            if !exists {
                return Err(ApiError::Validation(ValidationError::InvalidReference {
                    field: fk.column.to_string(),
                    table: fk.ref_table.to_string(),
                }));
            }
        }
        Ok(())
    }

    fn id_for_guid(schema: &TableSchema, data: &TableData, guid: i64) -> Option<i64> {
        let id = guid - schema.guid_offset;
        data.rows
            .get(&id)
            .filter(|row| row.get("guid").and_then(Value::as_i64) == Some(guid))
            .map(|_| id)
    }
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn insert(&self, schema: &TableSchema, mut row: Value) -> ApiResult<Value> {
        let mut tables = self.tables.write().map_err(Self::lock_err)?;
        tables.entry(schema.table.to_string()).or_default();

        Self::check_uniques(schema, &tables, &row, None)?;
        Self::check_foreign_keys(schema, &tables, &row)?;

        let data = tables
            .get_mut(schema.table)
            .expect("table entry just created");
        let id = data.last_id + 1;
        let guid = schema.guid_offset + id;

        if let Some(obj) = row.as_object_mut() {
            obj.insert("id".to_string(), Value::from(id));
            obj.insert("guid".to_string(), Value::from(guid));
        }

        data.last_id = id;
        data.rows.insert(id, row.clone());

        Ok(row)
    }

    async fn update(&self, schema: &TableSchema, guid: i64, mut row: Value) -> ApiResult<Value> {
        let mut tables = self.tables.write().map_err(Self::lock_err)?;
        tables.entry(schema.table.to_string()).or_default();

        let id = {
            let data = tables.get(schema.table).expect("table entry just created");
            Self::id_for_guid(schema, data, guid).ok_or_else(|| {
                ApiError::Entity(EntityError::NotFound {
                    resource: schema.table.to_string(),
                    identifier: guid.to_string(),
                })
            })?
        };

        Self::check_uniques(schema, &tables, &row, Some(id))?;
        Self::check_foreign_keys(schema, &tables, &row)?;

        let data = tables.get_mut(schema.table).expect("table entry exists");
        let created_at = data.rows[&id]
            .get("created_at")
            .cloned()
            .unwrap_or(Value::Null);

        if let Some(obj) = row.as_object_mut() {
            obj.insert("id".to_string(), Value::from(id));
            obj.insert("guid".to_string(), Value::from(guid));
            obj.insert("created_at".to_string(), created_at);
        }

        data.rows.insert(id, row.clone());

        Ok(row)
    }

    async fn find_by_guid(&self, schema: &TableSchema, guid: i64) -> ApiResult<Option<Value>> {
        let tables = self.tables.read().map_err(Self::lock_err)?;
        Ok(tables.get(schema.table).and_then(|data| {
            Self::id_for_guid(schema, data, guid).and_then(|id| data.rows.get(&id).cloned())
        }))
    }

    async fn find_eq(
        &self,
        schema: &TableSchema,
        field: &str,
        value: &Value,
    ) -> ApiResult<Vec<Value>> {
        let tables = self.tables.read().map_err(Self::lock_err)?;
        Ok(tables
            .get(schema.table)
            .map(|data| {
                data.rows
                    .values()
                    .filter(|row| row.get(field).unwrap_or(&Value::Null) == value)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(
        &self,
        schema: &TableSchema,
        offset: usize,
        limit: usize,
    ) -> ApiResult<Vec<Value>> {
        let tables = self.tables.read().map_err(Self::lock_err)?;
        Ok(tables
            .get(schema.table)
            .map(|data| {
                data.rows
                    .values()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all(&self, schema: &TableSchema) -> ApiResult<Vec<Value>> {
        let tables = self.tables.read().map_err(Self::lock_err)?;
        Ok(tables
            .get(schema.table)
            .map(|data| data.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, schema: &TableSchema) -> ApiResult<u64> {
        let tables = self.tables.read().map_err(Self::lock_err)?;
        Ok(tables
            .get(schema.table)
            .map(|data| data.rows.len() as u64)
            .unwrap_or(0))
    }

    async fn delete(&self, schema: &TableSchema, guid: i64) -> ApiResult<()> {
        let mut tables = self.tables.write().map_err(Self::lock_err)?;
        let data = tables.get_mut(schema.table).ok_or_else(|| {
            ApiError::Entity(EntityError::NotFound {
                resource: schema.table.to_string(),
                identifier: guid.to_string(),
            })
        })?;

        let id = Self::id_for_guid(schema, data, guid).ok_or_else(|| {
            ApiError::Entity(EntityError::NotFound {
                resource: schema.table.to_string(),
                identifier: guid.to_string(),
            })
        })?;

        data.rows.remove(&id);
        Ok(())
    }

    async fn revision(&self, schema: &TableSchema) -> ApiResult<TableRevision> {
        let tables = self.tables.read().map_err(Self::lock_err)?;
        let (count, revision) = tables
            .get(schema.table)
            .map(|data| {
                let latest = data
                    .rows
                    .values()
                    .filter_map(|row| {
                        row.get("updated_at")
                            .and_then(Value::as_str)
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|dt| dt.with_timezone(&Utc))
                    })
                    .max();
                (data.rows.len() as u64, latest.map(|dt| dt.to_rfc3339()))
            })
            .unwrap_or((0, None));

        Ok(TableRevision {
            table: schema.table.to_string(),
            count,
            revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnType, col, references, unique};
    use serde_json::json;

    fn currencies_schema() -> TableSchema {
        TableSchema {
            table: "currencies",
            guid_offset: 110_000,
            natural_key: Some("iso_code"),
            searchable: &["iso_code", "name"],
            columns: vec![
                col("iso_code", ColumnType::Text, false),
                col("name", ColumnType::Text, false),
            ],
            uniques: vec![unique("uq_currencies_iso_code", &["iso_code"])],
            indexes: vec![],
            foreign_keys: vec![],
        }
    }

    fn rates_schema() -> TableSchema {
        TableSchema {
            table: "exchange_rates",
            guid_offset: 120_000,
            natural_key: None,
            searchable: &["base_code"],
            columns: vec![
                col("base_code", ColumnType::Text, false),
                col("quote_code", ColumnType::Text, false),
                col("rate", ColumnType::Double, false),
            ],
            uniques: vec![],
            indexes: vec![],
            foreign_keys: vec![references("base_code", "currencies", "iso_code")],
        }
    }

    fn currency_row(iso: &str) -> Value {
        json!({
            "iso_code": iso,
            "name": format!("{} currency", iso),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        })
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_guids_from_offset() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        let first = store.insert(&schema, currency_row("EUR")).await.unwrap();
        let second = store.insert(&schema, currency_row("USD")).await.unwrap();

        assert_eq!(first["id"], json!(1));
        assert_eq!(first["guid"], json!(110_001));
        assert_eq!(second["guid"], json!(110_002));
    }

    #[tokio::test]
    async fn test_insert_rejects_unique_violation() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        store.insert(&schema, currency_row("EUR")).await.unwrap();
        let err = store.insert(&schema, currency_row("EUR")).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Entity(EntityError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_foreign_key() {
        let store = InMemoryStore::new();
        let rates = rates_schema();

        let row = json!({"base_code": "EUR", "quote_code": "USD", "rate": 1.1});
        let err = store.insert(&rates, row).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_insert_accepts_satisfied_foreign_key() {
        let store = InMemoryStore::new();
        let currencies = currencies_schema();
        let rates = rates_schema();

        store.insert(&currencies, currency_row("EUR")).await.unwrap();
        let row = json!({"base_code": "EUR", "quote_code": "USD", "rate": 1.1});
        let stored = store.insert(&rates, row).await.unwrap();
        assert_eq!(stored["guid"], json!(120_001));
    }

    #[tokio::test]
    async fn test_update_protects_identity_columns() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        let stored = store.insert(&schema, currency_row("EUR")).await.unwrap();
        let guid = stored["guid"].as_i64().unwrap();
        let created = stored["created_at"].clone();

        let mut tampered = stored.clone();
        tampered["id"] = json!(999);
        tampered["guid"] = json!(999_999);
        tampered["created_at"] = json!("1970-01-01T00:00:00Z");
        tampered["name"] = json!("Euro");

        let updated = store.update(&schema, guid, tampered).await.unwrap();
        assert_eq!(updated["id"], json!(1));
        assert_eq!(updated["guid"], json!(guid));
        assert_eq!(updated["created_at"], created);
        assert_eq!(updated["name"], json!("Euro"));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();
        let err = store
            .update(&schema, 110_042, currency_row("EUR"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Entity(EntityError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_allows_keeping_own_unique_value() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        let stored = store.insert(&schema, currency_row("EUR")).await.unwrap();
        let guid = stored["guid"].as_i64().unwrap();

        // same iso_code on the same row must not conflict with itself
        let updated = store.update(&schema, guid, stored).await.unwrap();
        assert_eq!(updated["iso_code"], json!("EUR"));
    }

    #[tokio::test]
    async fn test_delete_then_find_returns_none() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        let stored = store.insert(&schema, currency_row("EUR")).await.unwrap();
        let guid = stored["guid"].as_i64().unwrap();

        store.delete(&schema, guid).await.unwrap();
        assert!(store.find_by_guid(&schema, guid).await.unwrap().is_none());

        let err = store.delete(&schema, guid).await.unwrap_err();
        assert!(matches!(err, ApiError::Entity(EntityError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        for iso in ["AAA", "BBB", "CCC", "DDD"] {
            store.insert(&schema, currency_row(iso)).await.unwrap();
        }

        let page = store.list(&schema, 1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["iso_code"], json!("BBB"));
        assert_eq!(page[1]["iso_code"], json!("CCC"));
        assert_eq!(store.count(&schema).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_revision_tracks_latest_update() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        let empty = store.revision(&schema).await.unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.revision.is_none());

        store.insert(&schema, currency_row("EUR")).await.unwrap();
        let rev = store.revision(&schema).await.unwrap();
        assert_eq!(rev.count, 1);
        assert!(rev.revision.is_some());
    }

    #[tokio::test]
    async fn test_find_eq() {
        let store = InMemoryStore::new();
        let schema = currencies_schema();

        store.insert(&schema, currency_row("EUR")).await.unwrap();
        store.insert(&schema, currency_row("USD")).await.unwrap();

        let hits = store
            .find_eq(&schema, "iso_code", &json!("USD"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["guid"], json!(110_002));

        let none = store
            .find_eq(&schema, "iso_code", &json!("GBP"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
