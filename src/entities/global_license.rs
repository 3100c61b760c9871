//! Global licenses: a tenant's subscription governing billing cycles
//! and employee license counts

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const PLAN_CODES: &[&str] = &["starter", "standard", "premium", "enterprise"];
pub const BILLING_PERIODS: &[&str] = &["monthly", "yearly"];
pub const LICENSE_STATUSES: &[&str] = &["trial", "active", "suspended", "cancelled"];

/// trial → active|cancelled, active ↔ suspended, anything may cancel;
/// cancelled is terminal
pub const LICENSE_STATUS_FLOW: StatusFlow = &[
    ("trial", &["active", "cancelled"]),
    ("active", &["suspended", "cancelled"]),
    ("suspended", &["active", "cancelled"]),
];

impl_record!(
    GlobalLicense,
    "global_license",
    "global_licenses",
    {
        tenant_guid: i64,
        plan_code: String,
        /// Maximum number of assigned employee licenses
        seat_limit: i64,
        price_per_seat: f64,
        currency_code: String,
        billing_period: String,
        starts_on: String,
        #[serde(default)]
        expires_on: Option<String>,
        status: String,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "global_licenses",
        guid_offset: 210_000,
        natural_key: None,
        searchable: &["plan_code", "status", "currency_code"],
        columns: vec![
            col("tenant_guid", ColumnType::BigInt, false),
            col("plan_code", ColumnType::Text, false),
            col("seat_limit", ColumnType::Integer, false),
            col("price_per_seat", ColumnType::Double, false),
            col("currency_code", ColumnType::Text, false),
            col("billing_period", ColumnType::Text, false),
            col("starts_on", ColumnType::Date, false),
            col("expires_on", ColumnType::Date, true),
            col("status", ColumnType::Text, false),
        ],
        uniques: vec![],
        indexes: vec![
            index("idx_global_licenses_tenant", &["tenant_guid"]),
            index("idx_global_licenses_status", &["status"]),
        ],
        foreign_keys: vec![
            references("tenant_guid", "tenants", "guid"),
            references("currency_code", "currencies", "iso_code"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("global_license")
        .rule("tenant_guid", validators::integer())
        .filter("plan_code", filters::lowercase())
        .rule(
            "plan_code",
            validators::in_list(PLAN_CODES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("seat_limit", validators::integer())
        .rule("seat_limit", validators::min_value(1.0))
        .rule("price_per_seat", validators::non_negative())
        .filter("price_per_seat", filters::round_decimals(2))
        .filter("currency_code", filters::uppercase())
        .rule("currency_code", validators::matches(r"^[A-Z]{3}$"))
        .filter("billing_period", filters::lowercase())
        .rule(
            "billing_period",
            validators::in_list(BILLING_PERIODS.iter().map(|s| s.to_string()).collect()),
        )
        .rule("starts_on", validators::date_format("%Y-%m-%d"))
        .rule("expires_on", validators::date_format("%Y-%m-%d"))
        .rule(
            "status",
            validators::in_list(LICENSE_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .check("expires_on", |row| {
            let starts = row.get("starts_on").and_then(Value::as_str);
            let expires = row.get("expires_on").and_then(Value::as_str);
            match (starts, expires) {
                (Some(starts), Some(expires)) if expires <= starts => {
                    Err("expires_on must be after starts_on".to_string())
                }
                _ => Ok(()),
            }
        })
        .allow_transitions("status", LICENSE_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("tenant_guid", validators::required())
            .rule("plan_code", validators::required())
            .rule("seat_limit", validators::required())
            .rule("price_per_seat", validators::required())
            .rule("currency_code", validators::required())
            .rule("starts_on", validators::required())
            .filter("billing_period", filters::default_value(json!("monthly")))
            .filter("status", filters::default_value(json!("trial"))),
        Operation::Update => config,
    }
}

impl GlobalLicense {
    pub fn with_plan(mut self, plan_code: impl Into<String>) -> Self {
        self.plan_code = plan_code.into();
        self.touch();
        self
    }

    pub fn with_seat_limit(mut self, seat_limit: i64) -> Self {
        self.seat_limit = seat_limit;
        self.touch();
        self
    }

    pub fn activate(&mut self) {
        self.status = "active".to_string();
        self.touch();
    }

    pub fn cancel(&mut self) {
        self.status = "cancelled".to_string();
        self.touch();
    }

    /// Whether the license is usable on a given day (YYYY-MM-DD)
    pub fn is_current(&self, date: &str) -> bool {
        if !matches!(self.status.as_str(), "trial" | "active") {
            return false;
        }
        if date < self.starts_on.as_str() {
            return false;
        }
        match &self.expires_on {
            Some(expires) => date < expires.as_str(),
            None => true,
        }
    }

    /// Whether `assigned` seats exhaust the seat limit
    pub fn seats_exhausted(&self, assigned: u64) -> bool {
        assigned >= self.seat_limit as u64
    }

    /// Per-period price for a number of billed seats
    pub fn period_price(&self, seats: i64) -> f64 {
        self.price_per_seat * seats as f64
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<GlobalLicense>()
        .route("/tenant/{guid}", get(by_tenant))
        .route("/plan/{plan}", get(by_plan))
        .route("/status/{status}", get(by_status))
}

async fn by_tenant(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<GlobalLicense>(&state, "tenant_guid", &guid).await
}

async fn by_plan(
    State(state): State<AppState>,
    Path(plan): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<GlobalLicense>(&state, "plan_code", &plan).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<GlobalLicense>(&state, "status", &status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn license() -> GlobalLicense {
        GlobalLicense::new(
            200_001,
            "standard".to_string(),
            25,
            12.50,
            "EUR".to_string(),
            "monthly".to_string(),
            "2026-01-01".to_string(),
            Some("2027-01-01".to_string()),
            "active".to_string(),
        )
    }

    #[test]
    fn test_is_current_window() {
        let lic = license();
        assert!(lic.is_current("2026-01-01"));
        assert!(lic.is_current("2026-12-31"));
        assert!(!lic.is_current("2027-01-01"));
        assert!(!lic.is_current("2025-12-31"));
    }

    #[test]
    fn test_cancelled_license_is_not_current() {
        let mut lic = license();
        lic.cancel();
        assert!(!lic.is_current("2026-06-01"));
    }

    #[test]
    fn test_seats_exhausted() {
        let lic = license();
        assert!(!lic.seats_exhausted(24));
        assert!(lic.seats_exhausted(25));
        assert!(lic.seats_exhausted(26));
    }

    #[test]
    fn test_period_price() {
        let lic = license();
        assert!((lic.period_price(4) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_create_defaults() {
        let cleaned = GlobalLicense::validation(Operation::Create)
            .apply(
                &json!({
                    "tenant_guid": 200_001,
                    "plan_code": "Premium",
                    "seat_limit": 10,
                    "price_per_seat": 19.999,
                    "currency_code": "eur",
                    "starts_on": "2026-01-01"
                }),
                Operation::Create,
            )
            .unwrap();
        assert_eq!(cleaned["plan_code"], json!("premium"));
        assert_eq!(cleaned["billing_period"], json!("monthly"));
        assert_eq!(cleaned["status"], json!("trial"));
        assert_eq!(cleaned["price_per_seat"], json!(20.0));
    }

    #[test]
    fn test_seat_limit_must_be_at_least_one() {
        let err = GlobalLicense::validation(Operation::Create)
            .apply(
                &json!({
                    "tenant_guid": 200_001,
                    "plan_code": "starter",
                    "seat_limit": 0,
                    "price_per_seat": 5.0,
                    "currency_code": "EUR",
                    "starts_on": "2026-01-01"
                }),
                Operation::Create,
            )
            .unwrap_err();
        assert!(err.iter().any(|i| i.field == "seat_limit"));
    }

    #[test]
    fn test_expiry_after_start() {
        let config = GlobalLicense::validation(Operation::Create);
        let cleaned = config
            .apply(
                &json!({
                    "tenant_guid": 200_001,
                    "plan_code": "starter",
                    "seat_limit": 5,
                    "price_per_seat": 5.0,
                    "currency_code": "EUR",
                    "starts_on": "2026-06-01",
                    "expires_on": "2026-01-01"
                }),
                Operation::Create,
            )
            .unwrap();
        assert!(config.check_row(&cleaned).is_err());
    }

    #[test]
    fn test_status_flow() {
        let config = GlobalLicense::validation(Operation::Update);
        assert!(config
            .check_transition(&json!({"status": "trial"}), &json!({"status": "active"}))
            .is_ok());
        assert!(config
            .check_transition(&json!({"status": "cancelled"}), &json!({"status": "active"}))
            .is_err());
        assert!(config
            .check_transition(&json!({"status": "trial"}), &json!({"status": "suspended"}))
            .is_err());
    }

    #[test]
    fn test_schema_identity() {
        let schema = GlobalLicense::table();
        assert_eq!(schema.guid_offset, 210_000);
        assert_eq!(schema.foreign_keys[0].ref_table, "tenants");
    }
}
