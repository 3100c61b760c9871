//! Employee licenses: seats assigned under a global license

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::{ApiError, ApiResult, EntityError, ValidationError};
use crate::core::response;
use crate::core::schema::{ColumnType, TableSchema, col, index, references, unique};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::entities::global_license::GlobalLicense;
use crate::impl_record;
use crate::server::rest::{AppState, dao, filtered, json_body, resource_routes_with_create};

pub const EMPLOYEE_LICENSE_STATUSES: &[&str] = &["assigned", "revoked"];

/// assigned → revoked; revoked is terminal
pub const EMPLOYEE_LICENSE_STATUS_FLOW: StatusFlow = &[("assigned", &["revoked"])];

impl_record!(
    EmployeeLicense,
    "employee_license",
    "employee_licenses",
    {
        license_guid: i64,
        employee_email: String,
        employee_name: String,
        assigned_on: String,
        #[serde(default)]
        revoked_on: Option<String>,
        status: String,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "employee_licenses",
        guid_offset: 220_000,
        natural_key: None,
        searchable: &["employee_email", "employee_name", "status"],
        columns: vec![
            col("license_guid", ColumnType::BigInt, false),
            col("employee_email", ColumnType::Text, false),
            col("employee_name", ColumnType::Text, false),
            col("assigned_on", ColumnType::Date, false),
            col("revoked_on", ColumnType::Date, true),
            col("status", ColumnType::Text, false),
        ],
        uniques: vec![unique(
            "uq_employee_licenses_license_email",
            &["license_guid", "employee_email"],
        )],
        indexes: vec![index("idx_employee_licenses_license", &["license_guid"])],
        foreign_keys: vec![references("license_guid", "global_licenses", "guid")],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("employee_license")
        .rule("license_guid", validators::integer())
        .filter("employee_email", filters::trim())
        .filter("employee_email", filters::lowercase())
        .rule("employee_email", validators::email())
        .filter("employee_name", filters::trim())
        .rule("employee_name", validators::string_length(2, 120))
        .rule("assigned_on", validators::date_format("%Y-%m-%d"))
        .rule("revoked_on", validators::date_format("%Y-%m-%d"))
        .rule(
            "status",
            validators::in_list(
                EMPLOYEE_LICENSE_STATUSES.iter().map(|s| s.to_string()).collect(),
            ),
        )
        .check("revoked_on", |row| {
            let status = row.get("status").and_then(Value::as_str);
            let assigned = row.get("assigned_on").and_then(Value::as_str);
            let revoked = row.get("revoked_on").and_then(Value::as_str);
            if status == Some("revoked") {
                match (assigned, revoked) {
                    (_, None) => {
                        return Err("revoked status requires revoked_on".to_string());
                    }
                    (Some(assigned), Some(revoked)) if revoked < assigned => {
                        return Err("revoked_on must not precede assigned_on".to_string());
                    }
                    _ => {}
                }
            }
            Ok(())
        })
        .allow_transitions("status", EMPLOYEE_LICENSE_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("license_guid", validators::required())
            .rule("employee_email", validators::required())
            .rule("employee_name", validators::required())
            .rule("assigned_on", validators::required())
            .filter("status", filters::default_value(json!("assigned"))),
        Operation::Update => config,
    }
}

impl EmployeeLicense {
    pub fn with_employee(
        mut self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        self.employee_name = name.into();
        self.employee_email = email.into();
        self.touch();
        self
    }

    /// Revoke the seat as of a given day
    pub fn revoke(&mut self, on: impl Into<String>) {
        self.status = "revoked".to_string();
        self.revoked_on = Some(on.into());
        self.touch();
    }

    pub fn is_assigned(&self) -> bool {
        self.status == "assigned"
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes_with_create::<EmployeeLicense, _, _>(create_seat_limited)
        .route("/license/{guid}", get(by_license))
        .route("/email/{email}", get(by_email))
        .route("/status/{status}", get(by_status))
}

/// POST / — create, rejecting assignments beyond the license seat limit
async fn create_seat_limited(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload = json_body(body)?;

    let license_guid = payload
        .get("license_guid")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            ApiError::Validation(ValidationError::FieldError {
                field: "license_guid".to_string(),
                message: "'license_guid' is required".to_string(),
            })
        })?;

    let license = dao::<GlobalLicense>(&state)
        .find(license_guid)
        .await?
        .ok_or_else(|| {
            ApiError::Validation(ValidationError::InvalidReference {
                field: "license_guid".to_string(),
                table: "global_licenses".to_string(),
            })
        })?;

    let assigned = dao::<EmployeeLicense>(&state)
        .filter_eq("license_guid", &license_guid.to_string())
        .await?
        .into_iter()
        .filter(EmployeeLicense::is_assigned)
        .count() as u64;

    if license.seats_exhausted(assigned) {
        return Err(ApiError::Entity(EntityError::Conflict {
            resource: "employee_license".to_string(),
            constraint: "seat_limit".to_string(),
        }));
    }

    let record = dao::<EmployeeLicense>(&state).create_from(&payload).await?;
    Ok((StatusCode::CREATED, response::success(record)))
}

async fn by_license(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<EmployeeLicense>(&state, "license_guid", &guid).await
}

async fn by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<EmployeeLicense>(&state, "employee_email", &email).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<EmployeeLicense>(&state, "status", &status).await
}
