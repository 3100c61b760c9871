//! Storage implementations for different backends

use async_trait::async_trait;
use serde_json::Value;

use crate::core::error::ApiResult;
use crate::core::query::TableRevision;
use crate::core::schema::TableSchema;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Generic CRUD primitives parameterized by table definition.
///
/// Rows cross this boundary as JSON objects; the typed layer above
/// ([`crate::core::Dao`]) owns serialization. Implementations enforce the
/// schema's unique constraints and foreign keys, and assign `id` and `guid`
/// atomically on insert (`guid = schema.guid_offset + id`).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert a row, assigning `id` and `guid`. Returns the stored row.
    async fn insert(&self, schema: &TableSchema, row: Value) -> ApiResult<Value>;

    /// Replace the row with the given guid. `id`, `guid` and `created_at`
    /// are kept from the stored row. Returns the stored row.
    async fn update(&self, schema: &TableSchema, guid: i64, row: Value) -> ApiResult<Value>;

    /// Find a row by guid
    async fn find_by_guid(&self, schema: &TableSchema, guid: i64) -> ApiResult<Option<Value>>;

    /// Find rows where a column equals a value
    async fn find_eq(&self, schema: &TableSchema, field: &str, value: &Value)
    -> ApiResult<Vec<Value>>;

    /// Rows in id order, paginated
    async fn list(&self, schema: &TableSchema, offset: usize, limit: usize)
    -> ApiResult<Vec<Value>>;

    /// Every row in id order
    async fn all(&self, schema: &TableSchema) -> ApiResult<Vec<Value>>;

    /// Number of rows in the table
    async fn count(&self, schema: &TableSchema) -> ApiResult<u64>;

    /// Delete the row with the given guid (error when absent)
    async fn delete(&self, schema: &TableSchema, guid: i64) -> ApiResult<()>;

    /// Row count plus the most recent `updated_at`
    async fn revision(&self, schema: &TableSchema) -> ApiResult<TableRevision>;
}
