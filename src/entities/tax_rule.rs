//! Tax rules per country

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references, unique};
use crate::core::validation::{Operation, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const TAX_TYPES: &[&str] = &["vat", "gst", "sales", "withholding"];

impl_record!(
    TaxRule,
    "tax_rule",
    "tax_rules",
    {
        country_code: String,
        tax_type: String,
        rate_percent: f64,
        /// First day the rule applies (YYYY-MM-DD)
        valid_from: String,
        /// Last day the rule applies, open-ended when absent
        #[serde(default)]
        valid_to: Option<String>,
        is_active: bool,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "tax_rules",
        guid_offset: 130_000,
        natural_key: None,
        searchable: &["country_code", "tax_type", "valid_from"],
        columns: vec![
            col("country_code", ColumnType::Text, false),
            col("tax_type", ColumnType::Text, false),
            col("rate_percent", ColumnType::Double, false),
            col("valid_from", ColumnType::Date, false),
            col("valid_to", ColumnType::Date, true),
            col("is_active", ColumnType::Boolean, false),
        ],
        uniques: vec![unique(
            "uq_tax_rules_country_type_from",
            &["country_code", "tax_type", "valid_from"],
        )],
        indexes: vec![index("idx_tax_rules_country", &["country_code"])],
        foreign_keys: vec![references("country_code", "countries", "iso_code")],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("tax_rule")
        .filter("country_code", filters::trim())
        .filter("country_code", filters::uppercase())
        .rule("country_code", validators::matches(r"^[A-Z]{2}$"))
        .filter("tax_type", filters::lowercase())
        .rule(
            "tax_type",
            validators::in_list(TAX_TYPES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("rate_percent", validators::range(0.0, 100.0))
        .rule("valid_from", validators::date_format("%Y-%m-%d"))
        .rule("valid_to", validators::date_format("%Y-%m-%d"))
        .check("valid_to", |row| {
            let from = row.get("valid_from").and_then(Value::as_str);
            let to = row.get("valid_to").and_then(Value::as_str);
            // zero-padded ISO dates compare correctly as strings
            match (from, to) {
                (Some(from), Some(to)) if to <= from => {
                    Err("valid_to must be after valid_from".to_string())
                }
                _ => Ok(()),
            }
        });

    match op {
        Operation::Create => config
            .rule("country_code", validators::required())
            .rule("tax_type", validators::required())
            .rule("rate_percent", validators::required())
            .rule("valid_from", validators::required())
            .filter("is_active", filters::default_value(json!(true))),
        Operation::Update => config,
    }
}

impl TaxRule {
    pub fn with_rate(mut self, rate_percent: f64) -> Self {
        self.rate_percent = rate_percent;
        self.touch();
        self
    }

    pub fn with_validity(mut self, from: impl Into<String>, to: Option<String>) -> Self {
        self.valid_from = from.into();
        self.valid_to = to;
        self.touch();
        self
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    /// Whether the rule covers a given day (YYYY-MM-DD)
    pub fn applies_on(&self, date: &str) -> bool {
        if !self.is_active || date < self.valid_from.as_str() {
            return false;
        }
        match &self.valid_to {
            Some(to) => date <= to.as_str(),
            None => true,
        }
    }

    /// Tax amount for a net amount under this rule
    pub fn tax_amount(&self, net: f64) -> f64 {
        net * self.rate_percent / 100.0
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<TaxRule>()
        .route("/country/{code}", get(by_country))
        .route("/type/{tax_type}", get(by_type))
        .route("/active/{flag}", get(by_active))
}

async fn by_country(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<TaxRule>(&state, "country_code", &code).await
}

async fn by_type(
    State(state): State<AppState>,
    Path(tax_type): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<TaxRule>(&state, "tax_type", &tax_type).await
}

async fn by_active(
    State(state): State<AppState>,
    Path(flag): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<TaxRule>(&state, "is_active", &flag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn french_vat() -> TaxRule {
        TaxRule::new(
            "FR".to_string(),
            "vat".to_string(),
            20.0,
            "2026-01-01".to_string(),
            Some("2026-12-31".to_string()),
            true,
        )
    }

    #[test]
    fn test_applies_on_window() {
        let rule = french_vat();
        assert!(rule.applies_on("2026-01-01"));
        assert!(rule.applies_on("2026-06-15"));
        assert!(rule.applies_on("2026-12-31"));
        assert!(!rule.applies_on("2025-12-31"));
        assert!(!rule.applies_on("2027-01-01"));
    }

    #[test]
    fn test_applies_on_open_ended() {
        let rule = french_vat().with_validity("2026-01-01", None);
        assert!(rule.applies_on("2030-01-01"));
    }

    #[test]
    fn test_inactive_rule_never_applies() {
        let mut rule = french_vat();
        rule.deactivate();
        assert!(!rule.applies_on("2026-06-15"));
    }

    #[test]
    fn test_tax_amount() {
        let rule = french_vat();
        assert!((rule.tax_amount(100.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_validity_window_check() {
        let config = TaxRule::validation(Operation::Create);
        let cleaned = config
            .apply(
                &json!({
                    "country_code": "FR",
                    "tax_type": "VAT",
                    "rate_percent": 20.0,
                    "valid_from": "2026-06-01",
                    "valid_to": "2026-01-01"
                }),
                Operation::Create,
            )
            .unwrap();
        // tax_type normalized to lowercase
        assert_eq!(cleaned["tax_type"], json!("vat"));
        let err = config.check_row(&cleaned).unwrap_err();
        assert_eq!(err[0].field, "valid_to");
    }

    #[test]
    fn test_unknown_tax_type_rejected() {
        let err = TaxRule::validation(Operation::Create)
            .apply(
                &json!({
                    "country_code": "FR",
                    "tax_type": "tithe",
                    "rate_percent": 10.0,
                    "valid_from": "2026-01-01"
                }),
                Operation::Create,
            )
            .unwrap_err();
        assert!(err.iter().any(|i| i.field == "tax_type"));
    }

    #[test]
    fn test_schema_has_country_fk() {
        let schema = TaxRule::table();
        assert_eq!(schema.foreign_keys.len(), 1);
        assert_eq!(schema.foreign_keys[0].ref_table, "countries");
    }
}
