//! Exchange rates between currency pairs

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::core::error::ApiResult;
use crate::core::response;
use crate::core::schema::{ColumnType, TableSchema, col, index, references, unique};
use crate::core::validation::{Operation, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, dao, resource_routes};

impl_record!(
    ExchangeRate,
    "exchange_rate",
    "exchange_rates",
    {
        base_code: String,
        quote_code: String,
        /// Units of quote currency per one unit of base currency
        rate: f64,
        /// Day the rate applies to (YYYY-MM-DD)
        valid_on: String,
        #[serde(default)]
        source: Option<String>,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "exchange_rates",
        guid_offset: 120_000,
        natural_key: None,
        searchable: &["base_code", "quote_code", "valid_on"],
        columns: vec![
            col("base_code", ColumnType::Text, false),
            col("quote_code", ColumnType::Text, false),
            col("rate", ColumnType::Double, false),
            col("valid_on", ColumnType::Date, false),
            col("source", ColumnType::Text, true),
        ],
        uniques: vec![unique(
            "uq_exchange_rates_pair_date",
            &["base_code", "quote_code", "valid_on"],
        )],
        indexes: vec![index("idx_exchange_rates_base", &["base_code"])],
        foreign_keys: vec![
            references("base_code", "currencies", "iso_code"),
            references("quote_code", "currencies", "iso_code"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("exchange_rate")
        .filter("base_code", filters::trim())
        .filter("base_code", filters::uppercase())
        .rule("base_code", validators::matches(r"^[A-Z]{3}$"))
        .filter("quote_code", filters::trim())
        .filter("quote_code", filters::uppercase())
        .rule("quote_code", validators::matches(r"^[A-Z]{3}$"))
        .rule("rate", validators::positive())
        .rule("valid_on", validators::date_format("%Y-%m-%d"))
        .check("quote_code", |row| {
            match (row.get("base_code"), row.get("quote_code")) {
                (Some(base), Some(quote)) if !base.is_null() && base == quote => {
                    Err("base_code and quote_code must differ".to_string())
                }
                _ => Ok(()),
            }
        });

    match op {
        Operation::Create => config
            .rule("base_code", validators::required())
            .rule("quote_code", validators::required())
            .rule("rate", validators::required())
            .rule("valid_on", validators::required()),
        Operation::Update => config,
    }
}

impl ExchangeRate {
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self.touch();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.touch();
        self
    }

    /// Convert an amount of base currency into the quote currency
    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.rate
    }

    /// The same rate seen from the other side of the pair, as a new
    /// unpersisted row
    pub fn inverted(&self) -> ExchangeRate {
        ExchangeRate::new(
            self.quote_code.clone(),
            self.base_code.clone(),
            1.0 / self.rate,
            self.valid_on.clone(),
            self.source.clone(),
        )
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<ExchangeRate>()
        .route("/currency/{code}", get(by_currency))
        .route("/pair/{base}/{quote}", get(by_pair))
}

/// Rates where the currency appears on either side of the pair
async fn by_currency(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    let repo = dao::<ExchangeRate>(&state);
    let mut rows = repo.filter_eq("base_code", &code).await?;
    let quoted = repo.filter_eq("quote_code", &code).await?;
    rows.extend(quoted);
    Ok(response::success(rows))
}

async fn by_pair(
    State(state): State<AppState>,
    Path((base, quote)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let rows = dao::<ExchangeRate>(&state).filter_eq("base_code", &base).await?;
    let pair: Vec<ExchangeRate> = rows
        .into_iter()
        .filter(|r| r.quote_code == quote)
        .collect();
    Ok(response::success(pair))
}
