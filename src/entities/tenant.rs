//! Tenants: customer organizations in the multi-tenant billing model

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references, unique};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const TENANT_STATUSES: &[&str] = &["active", "suspended", "closed"];

/// active ↔ suspended, both may close; closed is terminal
pub const TENANT_STATUS_FLOW: StatusFlow = &[
    ("active", &["suspended", "closed"]),
    ("suspended", &["active", "closed"]),
];

impl_record!(
    Tenant,
    "tenant",
    "tenants",
    {
        name: String,
        /// DNS label the tenant is served under
        subdomain: String,
        contact_email: String,
        country_code: String,
        currency_code: String,
        /// ISO 639-1 language code
        #[serde(default)]
        language_code: Option<String>,
        #[serde(default)]
        timezone: Option<String>,
        status: String,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "tenants",
        guid_offset: 200_000,
        natural_key: Some("subdomain"),
        searchable: &["subdomain", "name", "contact_email", "status"],
        columns: vec![
            col("name", ColumnType::Text, false),
            col("subdomain", ColumnType::Text, false),
            col("contact_email", ColumnType::Text, false),
            col("country_code", ColumnType::Text, false),
            col("currency_code", ColumnType::Text, false),
            col("language_code", ColumnType::Text, true),
            col("timezone", ColumnType::Text, true),
            col("status", ColumnType::Text, false),
        ],
        uniques: vec![unique("uq_tenants_subdomain", &["subdomain"])],
        indexes: vec![
            index("idx_tenants_country", &["country_code"]),
            index("idx_tenants_status", &["status"]),
        ],
        foreign_keys: vec![
            references("country_code", "countries", "iso_code"),
            references("currency_code", "currencies", "iso_code"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("tenant")
        .filter("name", filters::trim())
        .rule("name", validators::string_length(2, 120))
        .filter("subdomain", filters::trim())
        .filter("subdomain", filters::lowercase())
        .rule(
            "subdomain",
            validators::matches(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$"),
        )
        .filter("contact_email", filters::trim())
        .filter("contact_email", filters::lowercase())
        .rule("contact_email", validators::email())
        .filter("country_code", filters::uppercase())
        .rule("country_code", validators::matches(r"^[A-Z]{2}$"))
        .filter("currency_code", filters::uppercase())
        .rule("currency_code", validators::matches(r"^[A-Z]{3}$"))
        .filter("language_code", filters::lowercase())
        .rule("language_code", validators::matches(r"^[a-z]{2}$"))
        .rule(
            "status",
            validators::in_list(TENANT_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .allow_transitions("status", TENANT_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("name", validators::required())
            .rule("subdomain", validators::required())
            .rule("contact_email", validators::required())
            .rule("country_code", validators::required())
            .rule("currency_code", validators::required())
            .filter("status", filters::default_value(json!("active"))),
        Operation::Update => config,
    }
}

impl Tenant {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.touch();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self.touch();
        self
    }

    pub fn suspend(&mut self) {
        self.status = "suspended".to_string();
        self.touch();
    }

    pub fn reactivate(&mut self) {
        self.status = "active".to_string();
        self.touch();
    }

    pub fn close(&mut self) {
        self.status = "closed".to_string();
        self.touch();
    }

    /// Whether the tenant may be billed and served
    pub fn is_operational(&self) -> bool {
        self.status == "active"
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<Tenant>()
        .route("/country/{code}", get(by_country))
        .route("/status/{status}", get(by_status))
}

async fn by_country(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<Tenant>(&state, "country_code", &code).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<Tenant>(&state, "status", &status).await
}
