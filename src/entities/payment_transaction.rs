//! Payment transactions against billing cycles and license adjustments

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::{ApiError, ApiResult, ValidationError};
use crate::core::response;
use crate::core::schema::{ColumnType, TableSchema, col, index, references, unique};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::entities::billing_cycle::BillingCycle;
use crate::entities::license_adjustment::LicenseAdjustment;
use crate::entities::{AMOUNT_TOLERANCE, amounts_match};
use crate::impl_record;
use crate::server::rest::{AppState, dao, filtered, json_body, resource_routes_with_create};

pub const TRANSACTION_STATUSES: &[&str] = &["pending", "settled", "failed", "refunded"];

/// pending → settled|failed, settled → refunded, failed → pending (retry)
pub const TRANSACTION_STATUS_FLOW: StatusFlow = &[
    ("pending", &["settled", "failed"]),
    ("settled", &["refunded"]),
    ("failed", &["pending"]),
];

impl_record!(
    PaymentTransaction,
    "payment_transaction",
    "payment_transactions",
    {
        /// Human-facing reference, generated when omitted
        reference: String,
        /// Exactly one of cycle_guid / adjustment_guid is set
        #[serde(default)]
        cycle_guid: Option<i64>,
        #[serde(default)]
        adjustment_guid: Option<i64>,
        method_guid: i64,
        amount: f64,
        currency_code: String,
        status: String,
        #[serde(default)]
        processed_at: Option<String>,
        #[serde(default)]
        failure_reason: Option<String>,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "payment_transactions",
        guid_offset: 250_000,
        natural_key: Some("reference"),
        searchable: &["reference", "status", "currency_code"],
        columns: vec![
            col("reference", ColumnType::Text, false),
            col("cycle_guid", ColumnType::BigInt, true),
            col("adjustment_guid", ColumnType::BigInt, true),
            col("method_guid", ColumnType::BigInt, false),
            col("amount", ColumnType::Double, false),
            col("currency_code", ColumnType::Text, false),
            col("status", ColumnType::Text, false),
            col("processed_at", ColumnType::TimestampTz, true),
            col("failure_reason", ColumnType::Text, true),
        ],
        uniques: vec![unique("uq_payment_transactions_reference", &["reference"])],
        indexes: vec![
            index("idx_payment_transactions_cycle", &["cycle_guid"]),
            index("idx_payment_transactions_status", &["status"]),
        ],
        foreign_keys: vec![
            references("cycle_guid", "billing_cycles", "guid"),
            references("adjustment_guid", "license_adjustments", "guid"),
            references("method_guid", "payment_methods", "guid"),
            references("currency_code", "currencies", "iso_code"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("payment_transaction")
        .filter("reference", filters::trim())
        .rule("reference", validators::matches(r"^[a-z0-9_-]{6,64}$"))
        .rule("cycle_guid", validators::integer())
        .rule("adjustment_guid", validators::integer())
        .rule("method_guid", validators::integer())
        .filter("amount", filters::round_decimals(2))
        .rule("amount", validators::positive())
        .filter("currency_code", filters::uppercase())
        .rule("currency_code", validators::matches(r"^[A-Z]{3}$"))
        .rule(
            "status",
            validators::in_list(TRANSACTION_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("processed_at", validators::rfc3339())
        .check("cycle_guid", |row| {
            let cycle = row.get("cycle_guid").map(Value::is_null).unwrap_or(true);
            let adjustment = row
                .get("adjustment_guid")
                .map(Value::is_null)
                .unwrap_or(true);
            if cycle == adjustment {
                Err("exactly one of cycle_guid and adjustment_guid must be set".to_string())
            } else {
                Ok(())
            }
        })
        .check("failure_reason", |row| {
            let status = row.get("status").and_then(Value::as_str);
            let reason = row.get("failure_reason").and_then(Value::as_str);
            if status == Some("failed") && reason.is_none() {
                return Err("failed transactions require failure_reason".to_string());
            }
            Ok(())
        })
        .check("processed_at", |row| {
            let status = row.get("status").and_then(Value::as_str).unwrap_or("pending");
            if matches!(status, "settled" | "refunded")
                && row.get("processed_at").and_then(Value::as_str).is_none()
            {
                return Err(format!("status '{}' requires processed_at", status));
            }
            Ok(())
        })
        .allow_transitions("status", TRANSACTION_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("reference", validators::required())
            .rule("method_guid", validators::required())
            .rule("amount", validators::required())
            .rule("currency_code", validators::required())
            .filter("status", filters::default_value(json!("pending"))),
        Operation::Update => config,
    }
}

impl PaymentTransaction {
    /// Generate a transaction reference (`txn_` + 12 hex chars)
    pub fn new_reference() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("txn_{}", &id[..12])
    }

    pub fn mark_settled(&mut self, processed_at: impl Into<String>) {
        self.status = "settled".to_string();
        self.processed_at = Some(processed_at.into());
        self.touch();
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = "failed".to_string();
        self.failure_reason = Some(reason.into());
        self.touch();
    }

    /// Whether the transaction amount settles the cycle's gross amount
    pub fn covers_cycle(&self, cycle: &BillingCycle) -> bool {
        amounts_match(self.amount, cycle.gross_amount)
    }

    /// Whether the transaction amount matches the adjustment's amount
    pub fn covers_adjustment(&self, adjustment: &LicenseAdjustment) -> bool {
        amounts_match(self.amount, adjustment.amount)
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes_with_create::<PaymentTransaction, _, _>(create_reconciled)
        .route("/cycle/{guid}", get(by_cycle))
        .route("/method/{guid}", get(by_method))
        .route("/status/{status}", get(by_status))
}

/// POST / — create, reconciling the amount against the billed target.
///
/// A transaction against a cycle must match the cycle's gross amount, one
/// against an adjustment must match the adjustment's amount; mismatches are
/// rejected before the row is stored. A missing reference is generated.
async fn create_reconciled(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut payload = json_body(body)?;

    if let Some(obj) = payload.as_object_mut() {
        if obj.get("reference").map(Value::is_null).unwrap_or(true) {
            obj.insert(
                "reference".to_string(),
                json!(PaymentTransaction::new_reference()),
            );
        }
    }

    let amount = payload.get("amount").and_then(Value::as_f64).unwrap_or(0.0);

    if let Some(cycle_guid) = payload.get("cycle_guid").and_then(Value::as_i64) {
        let cycle = dao::<BillingCycle>(&state)
            .find(cycle_guid)
            .await?
            .ok_or_else(|| {
                ApiError::Validation(ValidationError::InvalidReference {
                    field: "cycle_guid".to_string(),
                    table: "billing_cycles".to_string(),
                })
            })?;
        if !amounts_match(amount, cycle.gross_amount) {
            return Err(ApiError::Validation(ValidationError::FieldError {
                field: "amount".to_string(),
                message: format!(
                    "amount {} does not reconcile with cycle gross {} (tolerance {})",
                    amount, cycle.gross_amount, AMOUNT_TOLERANCE
                ),
            }));
        }
    } else if let Some(adjustment_guid) = payload.get("adjustment_guid").and_then(Value::as_i64) {
        let adjustment = dao::<LicenseAdjustment>(&state)
            .find(adjustment_guid)
            .await?
            .ok_or_else(|| {
                ApiError::Validation(ValidationError::InvalidReference {
                    field: "adjustment_guid".to_string(),
                    table: "license_adjustments".to_string(),
                })
            })?;
        if !amounts_match(amount, adjustment.amount) {
            return Err(ApiError::Validation(ValidationError::FieldError {
                field: "amount".to_string(),
                message: format!(
                    "amount {} does not reconcile with adjustment amount {} (tolerance {})",
                    amount, adjustment.amount, AMOUNT_TOLERANCE
                ),
            }));
        }
    }
    // the XOR row check rejects payloads naming neither or both targets

    let record = dao::<PaymentTransaction>(&state).create_from(&payload).await?;
    Ok((StatusCode::CREATED, response::success(record)))
}

async fn by_cycle(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<PaymentTransaction>(&state, "cycle_guid", &guid).await
}

async fn by_method(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<PaymentTransaction>(&state, "method_guid", &guid).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<PaymentTransaction>(&state, "status", &status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn txn() -> PaymentTransaction {
        PaymentTransaction::new(
            "txn_abc123def456".to_string(),
            Some(230_001),
            None,
            240_001,
            300.0,
            "EUR".to_string(),
            "pending".to_string(),
            None,
            None,
        )
    }

    #[test]
    fn test_new_reference_format() {
        let reference = PaymentTransaction::new_reference();
        assert!(reference.starts_with("txn_"));
        assert_eq!(reference.len(), 16);
        assert_ne!(reference, PaymentTransaction::new_reference());
    }

    #[test]
    fn test_settle_and_fail() {
        let mut txn = txn();
        txn.mark_settled("2026-08-05T10:00:00Z");
        assert_eq!(txn.status, "settled");
        assert!(txn.processed_at.is_some());

        let mut other = txn();
        other.mark_failed("card declined");
        assert_eq!(other.status, "failed");
        assert_eq!(other.failure_reason.as_deref(), Some("card declined"));
    }

    #[test]
    fn test_xor_check_rejects_both_targets() {
        let config = PaymentTransaction::validation(Operation::Create);
        let row = json!({
            "reference": "txn_abc123def456",
            "cycle_guid": 230_001,
            "adjustment_guid": 260_001,
            "method_guid": 240_001,
            "amount": 300.0,
            "currency_code": "EUR",
            "status": "pending"
        });
        let err = config.check_row(&row).unwrap_err();
        assert!(err.iter().any(|i| i.field == "cycle_guid"));
    }

    #[test]
    fn test_xor_check_rejects_neither_target() {
        let config = PaymentTransaction::validation(Operation::Create);
        let row = json!({
            "reference": "txn_abc123def456",
            "method_guid": 240_001,
            "amount": 300.0,
            "currency_code": "EUR",
            "status": "pending"
        });
        assert!(config.check_row(&row).is_err());
    }

    #[test]
    fn test_failed_requires_reason() {
        let config = PaymentTransaction::validation(Operation::Update);
        let row = json!({
            "reference": "txn_abc123def456",
            "cycle_guid": 230_001,
            "method_guid": 240_001,
            "amount": 300.0,
            "currency_code": "EUR",
            "status": "failed"
        });
        let err = config.check_row(&row).unwrap_err();
        assert!(err.iter().any(|i| i.field == "failure_reason"));
    }

    #[test]
    fn test_settled_requires_processed_at() {
        let config = PaymentTransaction::validation(Operation::Update);
        let row = json!({
            "reference": "txn_abc123def456",
            "cycle_guid": 230_001,
            "method_guid": 240_001,
            "amount": 300.0,
            "currency_code": "EUR",
            "status": "settled"
        });
        let err = config.check_row(&row).unwrap_err();
        assert!(err.iter().any(|i| i.field == "processed_at"));
    }

    #[test]
    fn test_failed_may_retry() {
        let config = PaymentTransaction::validation(Operation::Update);
        assert!(config
            .check_transition(&json!({"status": "failed"}), &json!({"status": "pending"}))
            .is_ok());
        assert!(config
            .check_transition(&json!({"status": "refunded"}), &json!({"status": "pending"}))
            .is_err());
    }

    #[test]
    fn test_covers_cycle_within_tolerance() {
        let txn = txn();
        let mut cycle = crate::entities::billing_cycle::BillingCycle::new(
            210_001,
            "2026-03-01".to_string(),
            "2026-04-01".to_string(),
            20,
            250.0,
            20.0,
            50.0,
            300.0,
            "EUR".to_string(),
            "invoiced".to_string(),
            Some("2026-04-01".to_string()),
            Some("2026-04-15".to_string()),
            None,
        );
        assert!(txn.covers_cycle(&cycle));
        cycle.gross_amount = 300.005;
        assert!(txn.covers_cycle(&cycle));
        cycle.gross_amount = 301.0;
        assert!(!txn.covers_cycle(&cycle));
    }

    #[test]
    fn test_reference_is_natural_key() {
        assert_eq!(PaymentTransaction::table().natural_key, Some("reference"));
    }
}
