//! Country reference data

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
    Country,
    "country",
    "countries",
    {
        /// ISO 3166-1 alpha-2 code
        iso_code: String,
        /// ISO 3166-1 alpha-3 code
        iso3_code: String,
        name: String,
        #[serde(default)]
        phone_prefix: Option<String>,
        /// IANA timezone of the capital (Area/City)
        timezone: String,
        #[serde(default)]
        currency_code: Option<String>,
        is_active: bool,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "countries",
        guid_offset: 100_000,
        natural_key: Some("iso_code"),
        searchable: &["iso_code", "iso3_code", "name", "timezone"],
        columns: vec![
            col("iso_code", ColumnType::Text, false),
            col("iso3_code", ColumnType::Text, false),
            col("name", ColumnType::Text, false),
            col("phone_prefix", ColumnType::Text, true),
            col("timezone", ColumnType::Text, false),
            col("currency_code", ColumnType::Text, true),
            col("is_active", ColumnType::Boolean, false),
        ],
        uniques: vec![
            unique("uq_countries_iso_code", &["iso_code"]),
            unique("uq_countries_iso3_code", &["iso3_code"]),
        ],
        indexes: vec![
            index("idx_countries_timezone", &["timezone"]),
            index("idx_countries_name", &["name"]),
        ],
        foreign_keys: vec![],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("country")
        .filter("iso_code", filters::trim())
        .filter("iso_code", filters::uppercase())
        .rule("iso_code", validators::matches(r"^[A-Z]{2}$"))
        .filter("iso3_code", filters::trim())
        .filter("iso3_code", filters::uppercase())
        .rule("iso3_code", validators::matches(r"^[A-Z]{3}$"))
        .filter("name", filters::trim())
        .rule("name", validators::string_length(2, 120))
        .rule("phone_prefix", validators::matches(r"^\+\d{1,4}$"))
        .filter("timezone", filters::trim())
        .rule("timezone", validators::matches(r"^[A-Za-z]+/[A-Za-z0-9_+-]+$"))
        .filter("currency_code", filters::uppercase())
        .rule("currency_code", validators::matches(r"^[A-Z]{3}$"));

    match op {
        Operation::Create => config
            .rule("iso_code", validators::required())
            .rule("iso3_code", validators::required())
            .rule("name", validators::required())
            .rule("timezone", validators::required())
            .filter("is_active", filters::default_value(json!(true))),
        Operation::Update => config,
    }
}

impl Country {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.touch();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self.touch();
        self
    }

    pub fn with_currency(mut self, code: impl Into<String>) -> Self {
        self.currency_code = Some(code.into());
        self.touch();
        self
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<Country>()
        .route("/timezone/{tz}", get(by_timezone))
        .route("/currency/{code}", get(by_currency))
        .route("/active/{flag}", get(by_active))
}

async fn by_timezone(
    State(state): State<AppState>,
    Path(tz): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<Country>(&state, "timezone", &tz).await
}

async fn by_currency(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<Country>(&state, "currency_code", &code).await
}

async fn by_active(
    State(state): State<AppState>,
    Path(flag): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<Country>(&state, "is_active", &flag).await
}
