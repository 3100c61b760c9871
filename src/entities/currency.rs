//! Currency reference data

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, unique};
use crate::core::validation::{Operation, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

impl_record!(
    Currency,
    "currency",
    "currencies",
    {
        /// ISO 4217 alpha-3 code
        iso_code: String,
        name: String,
        symbol: String,
        /// Minor-unit digits (0 for JPY, 2 for EUR, ...)
        decimal_places: i64,
        is_active: bool,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "currencies",
        guid_offset: 110_000,
        natural_key: Some("iso_code"),
        searchable: &["iso_code", "name"],
        columns: vec![
            col("iso_code", ColumnType::Text, false),
            col("name", ColumnType::Text, false),
            col("symbol", ColumnType::Text, false),
            col("decimal_places", ColumnType::Integer, false),
            col("is_active", ColumnType::Boolean, false),
        ],
        uniques: vec![unique("uq_currencies_iso_code", &["iso_code"])],
        indexes: vec![index("idx_currencies_name", &["name"])],
        foreign_keys: vec![],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("currency")
        .filter("iso_code", filters::trim())
        .filter("iso_code", filters::uppercase())
        .rule("iso_code", validators::matches(r"^[A-Z]{3}$"))
        .filter("name", filters::trim())
        .rule("name", validators::string_length(2, 80))
        .rule("symbol", validators::string_length(1, 8))
        .rule("decimal_places", validators::integer())
        .rule("decimal_places", validators::range(0.0, 6.0));

    match op {
        Operation::Create => config
            .rule("iso_code", validators::required())
            .rule("name", validators::required())
            .rule("symbol", validators::required())
            .filter("decimal_places", filters::default_value(json!(2)))
            .filter("is_active", filters::default_value(json!(true))),
        Operation::Update => config,
    }
}

impl Currency {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.touch();
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self.touch();
        self
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    /// Round an amount to this currency's minor units
    pub fn round_amount(&self, amount: f64) -> f64 {
        let factor = 10_f64.powi(self.decimal_places as i32);
        (amount * factor).round() / factor
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<Currency>().route("/active/{flag}", get(by_active))
}

async fn by_active(
    State(state): State<AppState>,
    Path(flag): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<Currency>(&state, "is_active", &flag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn euro() -> Currency {
        Currency::new("EUR".to_string(), "Euro".to_string(), "€".to_string(), 2, true)
    }

    #[test]
    fn test_round_amount_uses_decimal_places() {
        let eur = euro();
        assert_eq!(eur.round_amount(12.345), 12.35);

        let yen = Currency::new("JPY".to_string(), "Yen".to_string(), "¥".to_string(), 0, true);
        assert_eq!(yen.round_amount(1200.6), 1201.0);
    }

    #[test]
    fn test_create_defaults() {
        let cleaned = Currency::validation(Operation::Create)
            .apply(
                &json!({"iso_code": "usd", "name": "US Dollar", "symbol": "$"}),
                Operation::Create,
            )
            .unwrap();
        assert_eq!(cleaned["iso_code"], json!("USD"));
        assert_eq!(cleaned["decimal_places"], json!(2));
        assert_eq!(cleaned["is_active"], json!(true));
    }

    #[test]
    fn test_decimal_places_bounds() {
        let err = Currency::validation(Operation::Create)
            .apply(
                &json!({"iso_code": "USD", "name": "US Dollar", "symbol": "$", "decimal_places": 9}),
                Operation::Create,
            )
            .unwrap_err();
        assert!(err.iter().any(|i| i.field == "decimal_places"));
    }

    #[test]
    fn test_schema_identity() {
        let schema = Currency::table();
        assert_eq!(schema.table, "currencies");
        assert_eq!(schema.guid_offset, 110_000);
        assert_eq!(schema.natural_key, Some("iso_code"));
    }
}
