//! Activity monitoring: who did what, when, from where

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references};
use crate::core::validation::{Operation, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

impl_record!(
    ActivityLog,
    "activity_log",
    "activity_logs",
    {
        /// Absent for system-wide activity
        #[serde(default)]
        tenant_guid: Option<i64>,
        /// Acting user or service account
        actor: String,
        /// Dotted action name, e.g. billing_cycle.mark_paid
        action: String,
        #[serde(default)]
        subject_table: Option<String>,
        #[serde(default)]
        subject_guid: Option<i64>,
        #[serde(default)]
        ip_address: Option<String>,
        /// Request correlation id, generated when omitted
        #[serde(default)]
        correlation_id: Option<String>,
        recorded_at: String,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "activity_logs",
        guid_offset: 280_000,
        natural_key: None,
        searchable: &["actor", "action", "subject_table"],
        columns: vec![
            col("tenant_guid", ColumnType::BigInt, true),
            col("actor", ColumnType::Text, false),
            col("action", ColumnType::Text, false),
            col("subject_table", ColumnType::Text, true),
            col("subject_guid", ColumnType::BigInt, true),
            col("ip_address", ColumnType::Text, true),
            col("correlation_id", ColumnType::Text, true),
            col("recorded_at", ColumnType::TimestampTz, false),
        ],
        uniques: vec![],
        indexes: vec![
            index("idx_activity_logs_tenant", &["tenant_guid"]),
            index("idx_activity_logs_action", &["action"]),
        ],
        foreign_keys: vec![references("tenant_guid", "tenants", "guid")],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("activity_log")
        .rule("tenant_guid", validators::integer())
        .filter("actor", filters::trim())
        .rule("actor", validators::string_length(1, 120))
        .filter("action", filters::trim())
        .filter("action", filters::lowercase())
        .rule("action", validators::matches(r"^[a-z0-9_.]+$"))
        .rule("subject_guid", validators::integer())
        .rule("ip_address", validators::ipv4())
        .rule("correlation_id", validators::uuid_format())
        .rule("recorded_at", validators::rfc3339());

    match op {
        Operation::Create => config
            .rule("actor", validators::required())
            .rule("action", validators::required())
            .filter("correlation_id", filters::default_uuid())
            .filter("recorded_at", filters::default_now()),
        Operation::Update => config,
    }
}

impl ActivityLog {
    pub fn with_subject(mut self, table: impl Into<String>, guid: i64) -> Self {
        self.subject_table = Some(table.into());
        self.subject_guid = Some(guid);
        self.touch();
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self.touch();
        self
    }

    /// Whether the entry concerns a specific row
    pub fn has_subject(&self) -> bool {
        self.subject_table.is_some() && self.subject_guid.is_some()
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<ActivityLog>()
        .route("/tenant/{guid}", get(by_tenant))
        .route("/actor/{actor}", get(by_actor))
        .route("/action/{action}", get(by_action))
}

async fn by_tenant(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<ActivityLog>(&state, "tenant_guid", &guid).await
}

async fn by_actor(
    State(state): State<AppState>,
    Path(actor): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<ActivityLog>(&state, "actor", &actor).await
}

async fn by_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<ActivityLog>(&state, "action", &action).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;
    use serde_json::json;

    #[test]
    fn test_with_subject() {
        let entry = ActivityLog::new(
            Some(200_001),
            "jane@acme.io".to_string(),
            "billing_cycle.mark_paid".to_string(),
            None,
            None,
            None,
            None,
            "2026-08-05T10:00:00Z".to_string(),
        )
        .with_subject("billing_cycles", 230_001)
        .with_ip("10.0.0.7");

        assert!(entry.has_subject());
        assert_eq!(entry.subject_table.as_deref(), Some("billing_cycles"));
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_create_generates_correlation_and_timestamp() {
        let cleaned = ActivityLog::validation(Operation::Create)
            .apply(
                &json!({"actor": "system", "action": "Tenant.Suspend"}),
                Operation::Create,
            )
            .unwrap();
        assert_eq!(cleaned["action"], json!("tenant.suspend"));
        assert!(uuid::Uuid::parse_str(cleaned["correlation_id"].as_str().unwrap()).is_ok());
        assert!(cleaned["recorded_at"].is_string());
    }

    #[test]
    fn test_bad_action_rejected() {
        let err = ActivityLog::validation(Operation::Create)
            .apply(
                &json!({"actor": "system", "action": "not an action!"}),
                Operation::Create,
            )
            .unwrap_err();
        assert!(err.iter().any(|i| i.field == "action"));
    }

    #[test]
    fn test_bad_ip_rejected() {
        let err = ActivityLog::validation(Operation::Create)
            .apply(
                &json!({"actor": "system", "action": "login", "ip_address": "999.0.0.1"}),
                Operation::Create,
            )
            .unwrap_err();
        assert!(err.iter().any(|i| i.field == "ip_address"));
    }

    #[test]
    fn test_schema_identity() {
        assert_eq!(ActivityLog::table().guid_offset, 280_000);
        assert_eq!(ActivityLog::table().natural_key, None);
    }
}
