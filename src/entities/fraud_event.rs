//! Fraud-detection events raised against tenants and transactions

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
pub const FRAUD_STATUSES: &[&str] = &["open", "confirmed", "dismissed"];

/// open → confirmed|dismissed; both resolutions are terminal
pub const FRAUD_STATUS_FLOW: StatusFlow = &[("open", &["confirmed", "dismissed"])];

impl_record!(
    FraudEvent,
    "fraud_event",
    "fraud_events",
    {
        tenant_guid: i64,
        #[serde(default)]
        transaction_guid: Option<i64>,
        /// Detection rule that fired (e.g. VELOCITY_02)
        rule_code: String,
        severity: String,
        /// Model score, 0..=100
        score: f64,
        #[serde(default)]
        details: Option<String>,
        detected_at: String,
        status: String,
        #[serde(default)]
        resolution_note: Option<String>,
        #[serde(default)]
        resolved_at: Option<String>,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "fraud_events",
        guid_offset: 270_000,
        natural_key: None,
        searchable: &["rule_code", "severity", "status"],
        columns: vec![
            col("tenant_guid", ColumnType::BigInt, false),
            col("transaction_guid", ColumnType::BigInt, true),
            col("rule_code", ColumnType::Text, false),
            col("severity", ColumnType::Text, false),
            col("score", ColumnType::Double, false),
            col("details", ColumnType::Text, true),
            col("detected_at", ColumnType::TimestampTz, false),
            col("status", ColumnType::Text, false),
            col("resolution_note", ColumnType::Text, true),
            col("resolved_at", ColumnType::TimestampTz, true),
        ],
        uniques: vec![],
        indexes: vec![
            index("idx_fraud_events_tenant", &["tenant_guid"]),
            index("idx_fraud_events_severity", &["severity"]),
        ],
        foreign_keys: vec![
            references("tenant_guid", "tenants", "guid"),
            references("transaction_guid", "payment_transactions", "guid"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("fraud_event")
        .rule("tenant_guid", validators::integer())
        .rule("transaction_guid", validators::integer())
        .filter("rule_code", filters::trim())
        .filter("rule_code", filters::uppercase())
        .rule("rule_code", validators::matches(r"^[A-Z0-9_]{3,40}$"))
        .filter("severity", filters::lowercase())
        .rule(
            "severity",
            validators::in_list(SEVERITIES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("score", validators::range(0.0, 100.0))
        .rule("detected_at", validators::rfc3339())
        .rule(
            "status",
            validators::in_list(FRAUD_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("resolved_at", validators::rfc3339())
        .check("resolution_note", |row| {
            let status = row.get("status").and_then(Value::as_str).unwrap_or("open");
            if matches!(status, "confirmed" | "dismissed") {
                let note = row.get("resolution_note").and_then(Value::as_str);
                let at = row.get("resolved_at").and_then(Value::as_str);
                if note.is_none() || at.is_none() {
                    return Err(format!(
                        "status '{}' requires resolution_note and resolved_at",
                        status
                    ));
                }
            }
            Ok(())
        })
        .allow_transitions("status", FRAUD_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("tenant_guid", validators::required())
            .rule("rule_code", validators::required())
            .rule("severity", validators::required())
            .rule("score", validators::required())
            .filter("detected_at", filters::default_now())
            .filter("status", filters::default_value(json!("open"))),
        Operation::Update => config,
    }
}

impl FraudEvent {
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self.touch();
        self
    }

    pub fn confirm(&mut self, note: impl Into<String>, at: impl Into<String>) {
        self.status = "confirmed".to_string();
        self.resolution_note = Some(note.into());
        self.resolved_at = Some(at.into());
        self.touch();
    }

    pub fn dismiss(&mut self, note: impl Into<String>, at: impl Into<String>) {
        self.status = "dismissed".to_string();
        self.resolution_note = Some(note.into());
        self.resolved_at = Some(at.into());
        self.touch();
    }

    pub fn is_resolved(&self) -> bool {
        self.status != "open"
    }

    /// Open events of high or critical severity need a human first
    pub fn requires_review(&self) -> bool {
        !self.is_resolved() && matches!(self.severity.as_str(), "high" | "critical")
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<FraudEvent>()
        .route("/tenant/{guid}", get(by_tenant))
        .route("/severity/{level}", get(by_severity))
        .route("/rule/{code}", get(by_rule))
        .route("/status/{status}", get(by_status))
}

async fn by_tenant(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<FraudEvent>(&state, "tenant_guid", &guid).await
}

async fn by_severity(
    State(state): State<AppState>,
    Path(level): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<FraudEvent>(&state, "severity", &level).await
}

async fn by_rule(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<FraudEvent>(&state, "rule_code", &code).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<FraudEvent>(&state, "status", &status).await
}
