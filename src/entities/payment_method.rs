//! Payment methods registered by tenants

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const METHOD_TYPES: &[&str] = &["card", "bank_transfer", "paypal"];
pub const CARD_BRANDS: &[&str] = &["visa", "mastercard", "amex"];
pub const METHOD_STATUSES: &[&str] = &["active", "disabled", "expired"];

/// active → disabled|expired, disabled → active; expired is terminal
pub const METHOD_STATUS_FLOW: StatusFlow = &[
    ("active", &["disabled", "expired"]),
    ("disabled", &["active"]),
];

impl_record!(
    PaymentMethod,
    "payment_method",
    "payment_methods",
    {
        tenant_guid: i64,
        method_type: String,
        /// Display label chosen by the tenant
        label: String,
        #[serde(default)]
        card_brand: Option<String>,
        #[serde(default)]
        last_four: Option<String>,
        #[serde(default)]
        expiry_month: Option<i64>,
        #[serde(default)]
        expiry_year: Option<i64>,
        is_default: bool,
        status: String,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "payment_methods",
        guid_offset: 240_000,
        natural_key: None,
        searchable: &["method_type", "status", "label"],
        columns: vec![
            col("tenant_guid", ColumnType::BigInt, false),
            col("method_type", ColumnType::Text, false),
            col("label", ColumnType::Text, false),
            col("card_brand", ColumnType::Text, true),
            col("last_four", ColumnType::Text, true),
            col("expiry_month", ColumnType::Integer, true),
            col("expiry_year", ColumnType::Integer, true),
            col("is_default", ColumnType::Boolean, false),
            col("status", ColumnType::Text, false),
        ],
        uniques: vec![],
        indexes: vec![index("idx_payment_methods_tenant", &["tenant_guid"])],
        foreign_keys: vec![references("tenant_guid", "tenants", "guid")],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("payment_method")
        .rule("tenant_guid", validators::integer())
        .filter("method_type", filters::lowercase())
        .rule(
            "method_type",
            validators::in_list(METHOD_TYPES.iter().map(|s| s.to_string()).collect()),
        )
        .filter("label", filters::trim())
        .rule("label", validators::string_length(2, 80))
        .filter("card_brand", filters::lowercase())
        .rule(
            "card_brand",
            validators::in_list(CARD_BRANDS.iter().map(|s| s.to_string()).collect()),
        )
        .rule("last_four", validators::matches(r"^\d{4}$"))
        .rule("expiry_month", validators::integer())
        .rule("expiry_month", validators::range(1.0, 12.0))
        .rule("expiry_year", validators::integer())
        .rule("expiry_year", validators::min_value(2000.0))
        .rule(
            "status",
            validators::in_list(METHOD_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .check("card_brand", |row| {
            if row.get("method_type").and_then(Value::as_str) == Some("card") {
                for required in ["card_brand", "last_four", "expiry_month", "expiry_year"] {
                    if row.get(required).map(Value::is_null).unwrap_or(true) {
                        return Err(format!("card methods require {}", required));
                    }
                }
            }
            Ok(())
        })
        .allow_transitions("status", METHOD_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("tenant_guid", validators::required())
            .rule("method_type", validators::required())
            .rule("label", validators::required())
            .filter("is_default", filters::default_value(json!(false)))
            .filter("status", filters::default_value(json!("active"))),
        Operation::Update => config,
    }
}

impl PaymentMethod {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self.touch();
        self
    }

    pub fn make_default(&mut self) {
        self.is_default = true;
        self.touch();
    }

    pub fn disable(&mut self) {
        self.status = "disabled".to_string();
        self.touch();
    }

    /// Whether a card method has passed its expiry (year/month granularity)
    pub fn is_expired_at(&self, year: i64, month: i64) -> bool {
        match (self.expiry_year, self.expiry_month) {
            (Some(ey), Some(em)) => (ey, em) < (year, month),
            _ => false,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == "active"
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<PaymentMethod>()
        .route("/tenant/{guid}", get(by_tenant))
        .route("/type/{method_type}", get(by_type))
        .route("/status/{status}", get(by_status))
}

async fn by_tenant(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<PaymentMethod>(&state, "tenant_guid", &guid).await
}

async fn by_type(
    State(state): State<AppState>,
    Path(method_type): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<PaymentMethod>(&state, "method_type", &method_type).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<PaymentMethod>(&state, "status", &status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn card() -> PaymentMethod {
        PaymentMethod::new(
            200_001,
            "card".to_string(),
            "Corporate Visa".to_string(),
            Some("visa".to_string()),
            Some("4242".to_string()),
            Some(9),
            Some(2027),
            true,
            "active".to_string(),
        )
    }

    #[test]
    fn test_expiry_check() {
        let card = card();
        assert!(!card.is_expired_at(2027, 9));
        assert!(card.is_expired_at(2027, 10));
        assert!(card.is_expired_at(2028, 1));
        assert!(!card.is_expired_at(2026, 12));
    }

    #[test]
    fn test_bank_transfer_never_expires() {
        let sepa = PaymentMethod::new(
            200_001,
            "bank_transfer".to_string(),
            "SEPA".to_string(),
            None,
            None,
            None,
            None,
            false,
            "active".to_string(),
        );
        assert!(!sepa.is_expired_at(2099, 12));
    }

    #[test]
    fn test_card_requires_card_fields() {
        let config = PaymentMethod::validation(Operation::Create);
        let cleaned = config
            .apply(
                &json!({
                    "tenant_guid": 200_001,
                    "method_type": "card",
                    "label": "Corporate Visa"
                }),
                Operation::Create,
            )
            .unwrap();
        let err = config.check_row(&cleaned).unwrap_err();
        assert_eq!(err[0].field, "card_brand");
    }

    #[test]
    fn test_bank_transfer_needs_no_card_fields() {
        let config = PaymentMethod::validation(Operation::Create);
        let cleaned = config
            .apply(
                &json!({
                    "tenant_guid": 200_001,
                    "method_type": "bank_transfer",
                    "label": "SEPA"
                }),
                Operation::Create,
            )
            .unwrap();
        assert!(config.check_row(&cleaned).is_ok());
        assert_eq!(cleaned["is_default"], json!(false));
    }

    #[test]
    fn test_last_four_format() {
        let err = PaymentMethod::validation(Operation::Create)
            .apply(
                &json!({
                    "tenant_guid": 200_001,
                    "method_type": "card",
                    "label": "Visa",
                    "card_brand": "visa",
                    "last_four": "42",
                    "expiry_month": 9,
                    "expiry_year": 2027
                }),
                Operation::Create,
            )
            .unwrap_err();
        assert!(err.iter().any(|i| i.field == "last_four"));
    }

    #[test]
    fn test_disabled_can_reactivate_expired_cannot() {
        let config = PaymentMethod::validation(Operation::Update);
        assert!(config
            .check_transition(&json!({"status": "disabled"}), &json!({"status": "active"}))
            .is_ok());
        assert!(config
            .check_transition(&json!({"status": "expired"}), &json!({"status": "active"}))
            .is_err());
    }

    #[test]
    fn test_schema_identity() {
        assert_eq!(PaymentMethod::table().guid_offset, 240_000);
    }
}
