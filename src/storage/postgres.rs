//! PostgreSQL storage backend using sqlx.
//!
//! Provides a `PostgresStore` implementation of [`TableStore`] backed by a
//! `sqlx::PgPool`.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! billhub = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//!
//! One table per entity with typed snake_case columns, generated from each
//! [`TableSchema`] by [`PostgresStore::ensure_schema`] (idempotent, safe to
//! call on every startup). Rows cross the [`TableStore`] boundary as JSON
//! objects; this module converts between JSON values and SQL types per the
//! declared column kinds.
//!
//! # Constraint mapping
//!
//! - unique violation (SQLSTATE 23505) → 409 conflict
//! - foreign-key violation (SQLSTATE 23503) → 400 invalid reference
//!
//! # Guid assignment
//!
//! `INSERT .. RETURNING id` plus a guid update run inside one transaction,
//! so `guid = offset + id` is assigned without a separate max() scan.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::core::error::{ApiError, ApiResult, EntityError, StorageError, ValidationError};
use crate::core::query::TableRevision;
use crate::core::schema::{ColumnType, TableSchema};
use crate::storage::TableStore;

/// Table store backed by PostgreSQL
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store with an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL
    pub async fn connect(url: &str) -> ApiResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| backend_err(format!("failed to connect: {}", e)))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the required tables and indexes (idempotent).
    ///
    /// Tables must be passed in dependency order (referenced tables first);
    /// the registry provides them that way.
    pub async fn ensure_schema(&self, schemas: &[&TableSchema]) -> ApiResult<()> {
        for schema in schemas {
            sqlx::query(&schema.create_table_sql())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    backend_err(format!("failed to create table {}: {}", schema.table, e))
                })?;

            for stmt in schema.create_index_sql() {
                sqlx::query(&stmt).execute(&self.pool).await.map_err(|e| {
                    backend_err(format!("failed to create index on {}: {}", schema.table, e))
                })?;
            }
        }
        Ok(())
    }

    fn select_columns(schema: &TableSchema) -> String {
        let mut cols = vec!["id".to_string(), "guid".to_string()];
        cols.extend(schema.columns.iter().map(|c| c.name.to_string()));
        cols.push("created_at".to_string());
        cols.push("updated_at".to_string());
        cols.join(", ")
    }

    async fn fetch_by_id(&self, schema: &TableSchema, id: i64) -> ApiResult<Option<Value>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::select_columns(schema),
            schema.table
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        row.map(|r| row_to_json(schema, &r)).transpose()
    }
}

/// Bind one JSON value as the SQL type of its column
fn bind_json<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    kind: ColumnType,
    field: &str,
    value: &Value,
) -> ApiResult<sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>> {
    let mismatch = |expected: &str| {
        ApiError::Storage(StorageError::Integrity {
            message: format!("column '{}' expects {}, got {}", field, expected, value),
        })
    };

    let query = match kind {
        ColumnType::BigInt | ColumnType::Integer => {
            let v = match value {
                Value::Null => None,
                _ => Some(value.as_i64().ok_or_else(|| mismatch("an integer"))?),
            };
            query.bind(v)
        }
        ColumnType::Double => {
            let v = match value {
                Value::Null => None,
                _ => Some(value.as_f64().ok_or_else(|| mismatch("a number"))?),
            };
            query.bind(v)
        }
        ColumnType::Boolean => {
            let v = match value {
                Value::Null => None,
                _ => Some(value.as_bool().ok_or_else(|| mismatch("a boolean"))?),
            };
            query.bind(v)
        }
        ColumnType::Text => {
            let v = match value {
                Value::Null => None,
                _ => Some(
                    value
                        .as_str()
                        .ok_or_else(|| mismatch("a string"))?
                        .to_string(),
                ),
            };
            query.bind(v)
        }
        ColumnType::Date => {
            let v = match value {
                Value::Null => None,
                _ => {
                    let s = value.as_str().ok_or_else(|| mismatch("a date string"))?;
                    Some(
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .map_err(|_| mismatch("a YYYY-MM-DD date"))?,
                    )
                }
            };
            query.bind(v)
        }
        ColumnType::TimestampTz => {
            let v = match value {
                Value::Null => None,
                _ => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| mismatch("a timestamp string"))?;
                    Some(
                        DateTime::parse_from_rfc3339(s)
                            .map_err(|_| mismatch("an RFC 3339 timestamp"))?
                            .with_timezone(&Utc),
                    )
                }
            };
            query.bind(v)
        }
    };

    Ok(query)
}

/// Convert a fetched row back into the JSON shape the typed layer expects
fn row_to_json(schema: &TableSchema, row: &PgRow) -> ApiResult<Value> {
    let get_err =
        |field: &str, e: sqlx::Error| backend_err(format!("failed to read '{}': {}", field, e));

    let mut obj = Map::new();
    let id: i64 = row.try_get("id").map_err(|e| get_err("id", e))?;
    let guid: i64 = row.try_get("guid").map_err(|e| get_err("guid", e))?;
    obj.insert("id".to_string(), Value::from(id));
    obj.insert("guid".to_string(), Value::from(guid));

    for c in &schema.columns {
        let value = match c.kind {
            ColumnType::BigInt | ColumnType::Integer => row
                .try_get::<Option<i64>, _>(c.name)
                .map_err(|e| get_err(c.name, e))?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnType::Double => row
                .try_get::<Option<f64>, _>(c.name)
                .map_err(|e| get_err(c.name, e))?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnType::Boolean => row
                .try_get::<Option<bool>, _>(c.name)
                .map_err(|e| get_err(c.name, e))?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnType::Text => row
                .try_get::<Option<String>, _>(c.name)
                .map_err(|e| get_err(c.name, e))?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnType::Date => row
                .try_get::<Option<NaiveDate>, _>(c.name)
                .map_err(|e| get_err(c.name, e))?
                .map(|d| Value::from(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            ColumnType::TimestampTz => row
                .try_get::<Option<DateTime<Utc>>, _>(c.name)
                .map_err(|e| get_err(c.name, e))?
                .map(|dt| Value::from(dt.to_rfc3339()))
                .unwrap_or(Value::Null),
        };
        obj.insert(c.name.to_string(), value);
    }

    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| get_err("created_at", e))?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(|e| get_err("updated_at", e))?;
    obj.insert("created_at".to_string(), Value::from(created_at.to_rfc3339()));
    obj.insert("updated_at".to_string(), Value::from(updated_at.to_rfc3339()));

    Ok(Value::Object(obj))
}

fn backend_err(message: String) -> ApiError {
    ApiError::Storage(StorageError::Backend {
        backend: "PostgreSQL".to_string(),
        message,
    })
}

/// Map database errors onto the service error hierarchy
fn map_db_error(schema: &TableSchema, e: sqlx::Error) -> ApiError {
    if let Some(dbe) = e.as_database_error() {
        let constraint = dbe.constraint().unwrap_or("").to_string();
        match dbe.code().as_deref() {
            Some("23505") => {
                return ApiError::Entity(EntityError::Conflict {
                    resource: schema.table.to_string(),
                    constraint,
                });
            }
            Some("23503") => {
                // constraint names follow fk_<table>_<column>
                let fk = schema
                    .foreign_keys
                    .iter()
                    .find(|fk| constraint == format!("fk_{}_{}", schema.table, fk.column));
                return ApiError::Validation(ValidationError::InvalidReference {
                    field: fk.map(|fk| fk.column.to_string()).unwrap_or(constraint),
                    table: fk.map(|fk| fk.ref_table.to_string()).unwrap_or_default(),
                });
            }
            _ => {}
        }
    }
    backend_err(e.to_string())
}

#[async_trait]
impl TableStore for PostgresStore {
    async fn insert(&self, schema: &TableSchema, row: Value) -> ApiResult<Value> {
        let placeholders: Vec<String> = (1..=schema.columns.len() + 2)
            .map(|i| format!("${}", i))
            .collect();
        let mut names: Vec<&str> = schema.columns.iter().map(|c| c.name).collect();
        names.push("created_at");
        names.push("updated_at");

        let sql = format!(
            "INSERT INTO {} (guid, {}) VALUES (0, {}) RETURNING id",
            schema.table,
            names.join(", "),
            placeholders.join(", ")
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend_err(format!("failed to begin transaction: {}", e)))?;

        let mut query = sqlx::query(&sql);
        for c in &schema.columns {
            let value = row.get(c.name).unwrap_or(&Value::Null);
            query = bind_json(query, c.kind, c.name, value)?;
        }
        for ts in ["created_at", "updated_at"] {
            let value = row.get(ts).unwrap_or(&Value::Null);
            query = bind_json(query, ColumnType::TimestampTz, ts, value)?;
        }

        let inserted = query
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        let id: i64 = inserted
            .try_get("id")
            .map_err(|e| backend_err(format!("failed to read inserted id: {}", e)))?;

        let guid = schema.guid_offset + id;
        let update_sql = format!("UPDATE {} SET guid = $1 WHERE id = $2", schema.table);
        sqlx::query(&update_sql)
            .bind(guid)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error(schema, e))?;

        tx.commit()
            .await
            .map_err(|e| backend_err(format!("failed to commit: {}", e)))?;

        self.fetch_by_id(schema, id).await?.ok_or_else(|| {
            backend_err(format!("failed to read back inserted row {} {}", schema.table, id))
        })
    }

    async fn update(&self, schema: &TableSchema, guid: i64, row: Value) -> ApiResult<Value> {
        let assignments: Vec<String> = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", c.name, i + 1))
            .collect();
        let n = schema.columns.len();
        let sql = format!(
            "UPDATE {} SET {}, updated_at = ${} WHERE guid = ${} RETURNING id",
            schema.table,
            assignments.join(", "),
            n + 1,
            n + 2
        );

        let mut query = sqlx::query(&sql);
        for c in &schema.columns {
            let value = row.get(c.name).unwrap_or(&Value::Null);
            query = bind_json(query, c.kind, c.name, value)?;
        }
        let updated_at = row.get("updated_at").unwrap_or(&Value::Null);
        query = bind_json(query, ColumnType::TimestampTz, "updated_at", updated_at)?;
        query = query.bind(guid);

        let updated = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;

        let Some(updated) = updated else {
            return Err(ApiError::Entity(EntityError::NotFound {
                resource: schema.table.to_string(),
                identifier: guid.to_string(),
            }));
        };
        let id: i64 = updated
            .try_get("id")
            .map_err(|e| backend_err(format!("failed to read updated id: {}", e)))?;

        self.fetch_by_id(schema, id).await?.ok_or_else(|| {
            backend_err(format!("failed to read back updated row {} {}", schema.table, id))
        })
    }

    async fn find_by_guid(&self, schema: &TableSchema, guid: i64) -> ApiResult<Option<Value>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE guid = $1",
            Self::select_columns(schema),
            schema.table
        );
        let row = sqlx::query(&sql)
            .bind(guid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        row.map(|r| row_to_json(schema, &r)).transpose()
    }

    async fn find_eq(
        &self,
        schema: &TableSchema,
        field: &str,
        value: &Value,
    ) -> ApiResult<Vec<Value>> {
        // column name comes from the schema or the base columns, never
        // from user input directly
        let kind = if field == "id" || field == "guid" {
            ColumnType::BigInt
        } else {
            schema
                .column(field)
                .ok_or_else(|| {
                    ApiError::Entity(EntityError::UnknownTable {
                        table: format!("{}.{}", schema.table, field),
                    })
                })?
                .kind
        };

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY id",
            Self::select_columns(schema),
            schema.table,
            field
        );
        let query = bind_json(sqlx::query(&sql), kind, field, value)?;
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        rows.iter().map(|r| row_to_json(schema, r)).collect()
    }

    async fn list(
        &self,
        schema: &TableSchema,
        offset: usize,
        limit: usize,
    ) -> ApiResult<Vec<Value>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id LIMIT $1 OFFSET $2",
            Self::select_columns(schema),
            schema.table
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        rows.iter().map(|r| row_to_json(schema, r)).collect()
    }

    async fn all(&self, schema: &TableSchema) -> ApiResult<Vec<Value>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id",
            Self::select_columns(schema),
            schema.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        rows.iter().map(|r| row_to_json(schema, r)).collect()
    }

    async fn count(&self, schema: &TableSchema) -> ApiResult<u64> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", schema.table);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| backend_err(format!("failed to read count: {}", e)))?;
        Ok(total as u64)
    }

    async fn delete(&self, schema: &TableSchema, guid: i64) -> ApiResult<()> {
        let sql = format!("DELETE FROM {} WHERE guid = $1", schema.table);
        let result = sqlx::query(&sql)
            .bind(guid)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Entity(EntityError::NotFound {
                resource: schema.table.to_string(),
                identifier: guid.to_string(),
            }));
        }
        Ok(())
    }

    async fn revision(&self, schema: &TableSchema) -> ApiResult<TableRevision> {
        let sql = format!(
            "SELECT COUNT(*) AS total, MAX(updated_at) AS latest FROM {}",
            schema.table
        );
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| backend_err(format!("failed to read count: {}", e)))?;
        let latest: Option<DateTime<Utc>> = row
            .try_get("latest")
            .map_err(|e| backend_err(format!("failed to read revision: {}", e)))?;

        Ok(TableRevision {
            table: schema.table.to_string(),
            count: total as u64,
            revision: latest.map(|dt| dt.to_rfc3339()),
        })
    }
}
