//! Generic REST handlers shared by every resource
//!
//! Each entity gets the same eight endpoints, parameterized by its record
//! type; entity modules add their specific filter routes on top (and two
//! resources replace the generic create with a handler that checks
//! cross-table rules).

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use std::sync::Arc;

use crate::core::error::{ApiError, ApiResult, RequestError, ValidationError};
use crate::core::query::ListParams;
use crate::core::record::{Dao, Record};
use crate::core::response;
use crate::storage::TableStore;

/// Shared handler state: the storage backend
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
}

/// Typed repository for a record type over the request state
pub fn dao<R: Record>(state: &AppState) -> Dao<R> {
    Dao::new(state.store.clone())
}

/// Unwrap a JSON body, mapping extractor rejections into the envelope
pub fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::Validation(ValidationError::InvalidJson {
            message: rejection.body_text(),
        })),
    }
}

/// Parse a path segment that must be a guid
fn parse_guid<R: Record>(raw: &str) -> ApiResult<i64> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Request(RequestError::InvalidIdentifier {
            resource: R::resource_name_singular().to_string(),
            value: raw.to_string(),
        }));
    }
    raw.parse().map_err(|_| {
        ApiError::Request(RequestError::InvalidIdentifier {
            resource: R::resource_name_singular().to_string(),
            value: raw.to_string(),
        })
    })
}

/// GET / — every row of the table
pub async fn export<R: Record>(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rows = dao::<R>(&state).all().await?;
    Ok(response::success(rows))
}

/// GET /revision — row count plus the latest update instant
pub async fn revision<R: Record>(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let revision = dao::<R>(&state).revision().await?;
    Ok(response::success(revision))
}

/// GET /list — paginated rows
pub async fn list<R: Record>(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let page = dao::<R>(&state).list(&params).await?;
    Ok(response::success(page))
}

/// GET /search/{field}/{value} — exact match on a searchable column
pub async fn search<R: Record>(
    State(state): State<AppState>,
    Path((field, value)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let rows = dao::<R>(&state).search(&field, &value).await?;
    Ok(response::success(rows))
}

/// GET /{identifier} — by guid or natural key
pub async fn get_one<R: Record>(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = dao::<R>(&state).load_by_identifier(&identifier).await?;
    Ok(response::success(record))
}

/// POST / — create from a validated payload
pub async fn create<R: Record>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload = json_body(body)?;
    let record = dao::<R>(&state).create_from(&payload).await?;
    Ok((StatusCode::CREATED, response::success(record)))
}

/// PUT /{guid} — partial update
pub async fn update_one<R: Record>(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let guid = parse_guid::<R>(&identifier)?;
    let payload = json_body(body)?;
    let record = dao::<R>(&state).update_from(guid, &payload).await?;
    Ok(response::success(record))
}

/// DELETE /{guid}
pub async fn delete_one<R: Record>(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<Value>> {
    let guid = parse_guid::<R>(&identifier)?;
    dao::<R>(&state).delete(guid).await?;
    Ok(response::success(serde_json::json!({ "deleted": guid })))
}

/// Exact-match filter helper backing entity-specific filter routes
pub async fn filtered<R: Record>(
    state: &AppState,
    field: &'static str,
    raw: &str,
) -> ApiResult<Json<Value>> {
    let rows = dao::<R>(state).filter_eq(field, raw).await?;
    Ok(response::success(rows))
}

/// The eight standard endpoints for a resource
pub fn resource_routes<R: Record>() -> Router<AppState> {
    Router::new()
        .route("/", get(export::<R>).post(create::<R>))
        .route("/revision", get(revision::<R>))
        .route("/list", get(list::<R>))
        .route("/search/{field}/{value}", get(search::<R>))
        .route(
            "/{identifier}",
            get(get_one::<R>)
                .put(update_one::<R>)
                .delete(delete_one::<R>),
        )
}

/// The standard endpoints with a custom create handler.
///
/// Used by resources whose creation enforces cross-table rules.
pub fn resource_routes_with_create<R: Record, H, T>(create_handler: H) -> Router<AppState>
where
    H: axum::handler::Handler<T, AppState>,
    T: 'static,
{
    Router::new()
        .route("/", get(export::<R>).post(create_handler))
        .route("/revision", get(revision::<R>))
        .route("/list", get(list::<R>))
        .route("/search/{field}/{value}", get(search::<R>))
        .route(
            "/{identifier}",
            get(get_one::<R>)
                .put(update_one::<R>)
                .delete(delete_one::<R>),
        )
}
