//! Declarative table definitions
//!
//! Every entity declares a [`TableSchema`]: its snake_case columns, named
//! unique constraints, named indexes, foreign keys, searchable columns and
//! guid offset. The storage layer consumes the schema to enforce constraints
//! and (for the SQL backend) to generate DDL.
//!
//! Four base columns exist on every table and are not declared per entity:
//! `id` (primary key), `guid` (6-digit public identifier), `created_at` and
//! `updated_at`.

use serde_json::Value;

/// Column names present on every table
pub const BASE_COLUMNS: &[&str] = &["id", "guid", "created_at", "updated_at"];

/// Columns that the storage layer refuses to overwrite on update
pub const PROTECTED_COLUMNS: &[&str] = &["id", "guid", "created_at"];

/// SQL-level type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Integer,
    Double,
    Boolean,
    Text,
    /// Calendar date, carried as a `YYYY-MM-DD` string in JSON
    Date,
    /// Instant, carried as an RFC 3339 string in JSON
    TimestampTz,
}

impl ColumnType {
    /// PostgreSQL type name
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
            ColumnType::Date => "DATE",
            ColumnType::TimestampTz => "TIMESTAMPTZ",
        }
    }
}

/// One declared column
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnType,
    pub nullable: bool,
}

/// A named unique constraint over one or more columns
#[derive(Debug, Clone)]
pub struct UniqueDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// A named (non-unique) index
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// A foreign key from one column to a unique column of another table
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub column: &'static str,
    pub ref_table: &'static str,
    pub ref_column: &'static str,
}

/// Complete structure definition for one table
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name (snake_case, plural)
    pub table: &'static str,

    /// Offset added to `id` when assigning the 6-digit guid
    pub guid_offset: i64,

    /// Column usable as a human-facing lookup key besides the guid
    pub natural_key: Option<&'static str>,

    /// Columns exposed through the search endpoint
    pub searchable: &'static [&'static str],

    pub columns: Vec<ColumnDef>,
    pub uniques: Vec<UniqueDef>,
    pub indexes: Vec<IndexDef>,
    pub foreign_keys: Vec<ForeignKey>,
}

/// Shorthand for a [`ColumnDef`]
pub fn col(name: &'static str, kind: ColumnType, nullable: bool) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable,
    }
}

/// Shorthand for a [`UniqueDef`]
pub fn unique(name: &'static str, columns: &'static [&'static str]) -> UniqueDef {
    UniqueDef { name, columns }
}

/// Shorthand for an [`IndexDef`]
pub fn index(name: &'static str, columns: &'static [&'static str]) -> IndexDef {
    IndexDef { name, columns }
}

/// Shorthand for a [`ForeignKey`]
pub fn references(
    column: &'static str,
    ref_table: &'static str,
    ref_column: &'static str,
) -> ForeignKey {
    ForeignKey {
        column,
        ref_table,
        ref_column,
    }
}

impl TableSchema {
    /// Look up a declared column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the column may be used with the search endpoint
    pub fn is_searchable(&self, field: &str) -> bool {
        self.searchable.contains(&field)
    }

    /// Convert a raw path/query string into the JSON value the column holds.
    ///
    /// Returns `None` when the string cannot represent the column type.
    pub fn coerce(&self, field: &str, raw: &str) -> Option<Value> {
        if field == "id" || field == "guid" {
            return raw.parse::<i64>().ok().map(Value::from);
        }
        let kind = self.column(field)?.kind;
        match kind {
            ColumnType::BigInt | ColumnType::Integer => raw.parse::<i64>().ok().map(Value::from),
            ColumnType::Double => raw.parse::<f64>().ok().map(Value::from),
            ColumnType::Boolean => match raw {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            ColumnType::Text | ColumnType::Date | ColumnType::TimestampTz => {
                Some(Value::String(raw.to_string()))
            }
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the PostgreSQL backend.
    ///
    /// Referenced tables must be created first; the registry registers
    /// resources in dependency order.
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = vec![
            "id BIGSERIAL PRIMARY KEY".to_string(),
            "guid BIGINT NOT NULL DEFAULT 0".to_string(),
        ];

        for c in &self.columns {
            let null = if c.nullable { "NULL" } else { "NOT NULL" };
            parts.push(format!("{} {} {}", c.name, c.kind.sql_type(), null));
        }

        parts.push("created_at TIMESTAMPTZ NOT NULL".to_string());
        parts.push("updated_at TIMESTAMPTZ NOT NULL".to_string());

        for fk in &self.foreign_keys {
            parts.push(format!(
                "CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.table, fk.column, fk.column, fk.ref_table, fk.ref_column
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            parts.join(",\n    ")
        )
    }

    /// Index statements (guid uniqueness, declared uniques, declared indexes)
    pub fn create_index_sql(&self) -> Vec<String> {
        let mut stmts = vec![format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_{}_guid ON {} (guid)",
            self.table, self.table
        )];

        for u in &self.uniques {
            stmts.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                u.name,
                self.table,
                u.columns.join(", ")
            ));
        }

        for i in &self.indexes {
            stmts.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                i.name,
                self.table,
                i.columns.join(", ")
            ));
        }

        stmts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableSchema {
        TableSchema {
            table: "countries",
            guid_offset: 100_000,
            natural_key: Some("iso_code"),
            searchable: &["iso_code", "name"],
            columns: vec![
                col("iso_code", ColumnType::Text, false),
                col("name", ColumnType::Text, false),
                col("is_active", ColumnType::Boolean, false),
                col("population", ColumnType::BigInt, true),
            ],
            uniques: vec![unique("uq_countries_iso_code", &["iso_code"])],
            indexes: vec![index("idx_countries_name", &["name"])],
            foreign_keys: vec![references("currency_code", "currencies", "iso_code")],
        }
    }

    #[test]
    fn test_column_lookup() {
        let schema = sample();
        assert!(schema.column("iso_code").is_some());
        assert!(schema.column("missing").is_none());
    }

    #[test]
    fn test_searchable() {
        let schema = sample();
        assert!(schema.is_searchable("iso_code"));
        assert!(!schema.is_searchable("is_active"));
    }

    #[test]
    fn test_coerce_by_column_type() {
        let schema = sample();
        assert_eq!(schema.coerce("guid", "100001"), Some(serde_json::json!(100001)));
        assert_eq!(schema.coerce("is_active", "true"), Some(serde_json::json!(true)));
        assert_eq!(
            schema.coerce("population", "8000000"),
            Some(serde_json::json!(8000000))
        );
        assert_eq!(schema.coerce("name", "France"), Some(serde_json::json!("France")));
        assert_eq!(schema.coerce("population", "abc"), None);
        assert_eq!(schema.coerce("missing", "x"), None);
    }

    #[test]
    fn test_create_table_sql() {
        let sql = sample().create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS countries"));
        assert!(sql.contains("id BIGSERIAL PRIMARY KEY"));
        assert!(sql.contains("guid BIGINT NOT NULL"));
        assert!(sql.contains("iso_code TEXT NOT NULL"));
        assert!(sql.contains("population BIGINT NULL"));
        assert!(sql.contains("FOREIGN KEY (currency_code) REFERENCES currencies (iso_code)"));
    }

    #[test]
    fn test_create_index_sql() {
        let stmts = sample().create_index_sql();
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].contains("uq_countries_guid"));
        assert!(stmts[1].contains("uq_countries_iso_code"));
        assert!(stmts[2].contains("idx_countries_name"));
    }
}
