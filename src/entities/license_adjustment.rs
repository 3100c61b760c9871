//! License adjustments: seat changes, credits and refunds against a
//! global license

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const ADJUSTMENT_TYPES: &[&str] = &["seat_increase", "seat_decrease", "credit", "refund"];
pub const ADJUSTMENT_STATUSES: &[&str] = &["pending", "applied", "declined"];

/// pending → applied|declined; both outcomes are terminal
pub const ADJUSTMENT_STATUS_FLOW: StatusFlow = &[("pending", &["applied", "declined"])];

impl_record!(
    LicenseAdjustment,
    "license_adjustment",
    "license_adjustments",
    {
        license_guid: i64,
        adjustment_type: String,
        /// Seat delta; positive for increases, negative for decreases,
        /// zero for monetary adjustments
        seat_delta: i64,
        amount: f64,
        currency_code: String,
        effective_on: String,
        #[serde(default)]
        reason: Option<String>,
        status: String,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "license_adjustments",
        guid_offset: 260_000,
        natural_key: None,
        searchable: &["adjustment_type", "status"],
        columns: vec![
            col("license_guid", ColumnType::BigInt, false),
            col("adjustment_type", ColumnType::Text, false),
            col("seat_delta", ColumnType::Integer, false),
            col("amount", ColumnType::Double, false),
            col("currency_code", ColumnType::Text, false),
            col("effective_on", ColumnType::Date, false),
            col("reason", ColumnType::Text, true),
            col("status", ColumnType::Text, false),
        ],
        uniques: vec![],
        indexes: vec![
            index("idx_license_adjustments_license", &["license_guid"]),
            index("idx_license_adjustments_status", &["status"]),
        ],
        foreign_keys: vec![
            references("license_guid", "global_licenses", "guid"),
            references("currency_code", "currencies", "iso_code"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("license_adjustment")
        .rule("license_guid", validators::integer())
        .filter("adjustment_type", filters::lowercase())
        .rule(
            "adjustment_type",
            validators::in_list(ADJUSTMENT_TYPES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("seat_delta", validators::integer())
        .filter("amount", filters::round_decimals(2))
        .rule("amount", validators::non_negative())
        .filter("currency_code", filters::uppercase())
        .rule("currency_code", validators::matches(r"^[A-Z]{3}$"))
        .rule("effective_on", validators::date_format("%Y-%m-%d"))
        .rule(
            "status",
            validators::in_list(ADJUSTMENT_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .check("seat_delta", |row| {
            let kind = row.get("adjustment_type").and_then(Value::as_str);
            let delta = row.get("seat_delta").and_then(Value::as_i64).unwrap_or(0);
            match kind {
                Some("seat_increase") if delta <= 0 => {
                    Err("seat_increase requires a positive seat_delta".to_string())
                }
                Some("seat_decrease") if delta >= 0 => {
                    Err("seat_decrease requires a negative seat_delta".to_string())
                }
                Some("credit") | Some("refund") if delta != 0 => {
                    Err("monetary adjustments must not change seats".to_string())
                }
                _ => Ok(()),
            }
        })
        .check("amount", |row| {
            let kind = row.get("adjustment_type").and_then(Value::as_str);
            let amount = row.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
            match kind {
                Some("credit") | Some("refund") if amount <= 0.0 => {
                    Err("monetary adjustments require a positive amount".to_string())
                }
                _ => Ok(()),
            }
        })
        .allow_transitions("status", ADJUSTMENT_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("license_guid", validators::required())
            .rule("adjustment_type", validators::required())
            .rule("amount", validators::required())
            .rule("currency_code", validators::required())
            .rule("effective_on", validators::required())
            .filter("seat_delta", filters::default_value(json!(0)))
            .filter("status", filters::default_value(json!("pending"))),
        Operation::Update => config,
    }
}

impl LicenseAdjustment {
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self.touch();
        self
    }

    pub fn apply(&mut self) {
        self.status = "applied".to_string();
        self.touch();
    }

    pub fn decline(&mut self) {
        self.status = "declined".to_string();
        self.touch();
    }

    /// Whether this adjustment changes the seat count
    pub fn is_seat_change(&self) -> bool {
        matches!(
            self.adjustment_type.as_str(),
            "seat_increase" | "seat_decrease"
        )
    }

    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<LicenseAdjustment>()
        .route("/license/{guid}", get(by_license))
        .route("/type/{adjustment_type}", get(by_type))
        .route("/status/{status}", get(by_status))
}

async fn by_license(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<LicenseAdjustment>(&state, "license_guid", &guid).await
}

async fn by_type(
    State(state): State<AppState>,
    Path(adjustment_type): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<LicenseAdjustment>(&state, "adjustment_type", &adjustment_type).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<LicenseAdjustment>(&state, "status", &status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn refund() -> LicenseAdjustment {
        LicenseAdjustment::new(
            210_001,
            "refund".to_string(),
            0,
            49.99,
            "EUR".to_string(),
            "2026-05-01".to_string(),
            Some("double charge".to_string()),
            "pending".to_string(),
        )
    }

    #[test]
    fn test_lifecycle() {
        let mut adj = refund();
        assert!(adj.is_pending());
        adj.apply();
        assert_eq!(adj.status, "applied");
        assert!(!adj.is_pending());
    }

    #[test]
    fn test_is_seat_change() {
        assert!(!refund().is_seat_change());
        let mut inc = refund();
        inc.adjustment_type = "seat_increase".to_string();
        assert!(inc.is_seat_change());
    }

    #[test]
    fn test_seat_increase_needs_positive_delta() {
        let config = LicenseAdjustment::validation(Operation::Create);
        let cleaned = config
            .apply(
                &json!({
                    "license_guid": 210_001,
                    "adjustment_type": "seat_increase",
                    "seat_delta": 0,
                    "amount": 0.0,
                    "currency_code": "EUR",
                    "effective_on": "2026-05-01"
                }),
                Operation::Create,
            )
            .unwrap();
        let err = config.check_row(&cleaned).unwrap_err();
        assert!(err.iter().any(|i| i.field == "seat_delta"));
    }

    #[test]
    fn test_seat_decrease_needs_negative_delta() {
        let config = LicenseAdjustment::validation(Operation::Create);
        let row = json!({
            "license_guid": 210_001,
            "adjustment_type": "seat_decrease",
            "seat_delta": -5,
            "amount": 0.0,
            "currency_code": "EUR",
            "effective_on": "2026-05-01",
            "status": "pending"
        });
        assert!(config.check_row(&row).is_ok());
    }

    #[test]
    fn test_refund_needs_positive_amount() {
        let config = LicenseAdjustment::validation(Operation::Create);
        let cleaned = config
            .apply(
                &json!({
                    "license_guid": 210_001,
                    "adjustment_type": "refund",
                    "amount": 0.0,
                    "currency_code": "EUR",
                    "effective_on": "2026-05-01"
                }),
                Operation::Create,
            )
            .unwrap();
        let err = config.check_row(&cleaned).unwrap_err();
        assert!(err.iter().any(|i| i.field == "amount"));
    }

    #[test]
    fn test_refund_must_not_move_seats() {
        let config = LicenseAdjustment::validation(Operation::Create);
        let row = json!({
            "license_guid": 210_001,
            "adjustment_type": "refund",
            "seat_delta": 3,
            "amount": 10.0,
            "currency_code": "EUR",
            "effective_on": "2026-05-01",
            "status": "pending"
        });
        let err = config.check_row(&row).unwrap_err();
        assert!(err.iter().any(|i| i.field == "seat_delta"));
    }

    #[test]
    fn test_outcomes_are_terminal() {
        let config = LicenseAdjustment::validation(Operation::Update);
        assert!(config
            .check_transition(&json!({"status": "pending"}), &json!({"status": "applied"}))
            .is_ok());
        assert!(config
            .check_transition(&json!({"status": "applied"}), &json!({"status": "pending"}))
            .is_err());
        assert!(config
            .check_transition(&json!({"status": "declined"}), &json!({"status": "applied"}))
            .is_err());
    }

    #[test]
    fn test_schema_identity() {
        assert_eq!(LicenseAdjustment::table().guid_offset, 260_000);
    }
}
