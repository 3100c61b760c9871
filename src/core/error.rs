//! Typed error handling for the billhub service
//!
//! Every failure that can surface over HTTP is represented here, grouped by
//! category. Each variant maps to an HTTP status code and a stable error code
//! so clients can handle failures programmatically instead of parsing
//! messages.
//!
//! # Error Categories
//!
//! - [`EntityError`]: row-level failures (not found, uniqueness conflicts)
//! - [`ValidationError`]: input validation failures
//! - [`RequestError`]: malformed requests (bad identifiers, unknown fields)
//! - [`StorageError`]: storage backend failures
//!
//! # HTTP mapping
//!
//! Validation and request errors map to 400, missing rows to 404, uniqueness
//! conflicts to 409, storage and internal errors to 500. Internal detail is
//! only included in 500 responses outside production.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::config;
use crate::core::response;

/// The main error type for the billhub service
#[derive(Debug)]
pub enum ApiError {
    /// Row-level errors (CRUD operations)
    Entity(EntityError),

    /// Input validation errors
    Validation(ValidationError),

    /// Malformed request errors
    Request(RequestError),

    /// Storage backend errors
    Storage(StorageError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Entity(e) => write!(f, "{}", e),
            ApiError::Validation(e) => write!(f, "{}", e),
            ApiError::Request(e) => write!(f, "{}", e),
            ApiError::Storage(e) => write!(f, "{}", e),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Entity(e) => Some(e),
            ApiError::Validation(e) => Some(e),
            ApiError::Request(e) => Some(e),
            ApiError::Storage(e) => Some(e),
            ApiError::Internal(_) => None,
        }
    }
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Entity(e) => e.status_code(),
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Request(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Entity(e) => e.error_code(),
            ApiError::Validation(e) => e.error_code(),
            ApiError::Request(e) => e.error_code(),
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The message exposed to clients.
    ///
    /// 500-class errors are reduced to a generic message in production;
    /// the full detail still goes to the logs.
    pub fn client_message(&self) -> String {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR && config::is_production() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Additional structured details for the error, if any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            ApiError::Entity(EntityError::Conflict { constraint, .. }) => {
                Some(serde_json::json!({ "constraint": constraint }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = response::failure(self.error_code(), &self.client_message(), self.details());
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to row-level operations
#[derive(Debug)]
pub enum EntityError {
    /// No row matched the identifier
    NotFound {
        resource: String,
        identifier: String,
    },

    /// A unique constraint rejected the write
    Conflict {
        resource: String,
        constraint: String,
    },

    /// The table is not registered
    UnknownTable {
        table: String,
    },

    /// Failed to serialize/deserialize a row
    Serialization {
        resource: String,
        message: String,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotFound {
                resource,
                identifier,
            } => {
                write!(f, "{} '{}' not found", resource, identifier)
            }
            EntityError::Conflict {
                resource,
                constraint,
            } => {
                write!(f, "{} violates constraint '{}'", resource, constraint)
            }
            EntityError::UnknownTable { table } => {
                write!(f, "Unknown table: {}", table)
            }
            EntityError::Serialization { resource, message } => {
                write!(
                    f,
                    "Failed to serialize/deserialize {}: {}",
                    resource, message
                )
            }
        }
    }
}

impl std::error::Error for EntityError {}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntityError::Conflict { .. } => StatusCode::CONFLICT,
            EntityError::UnknownTable { .. } => StatusCode::BAD_REQUEST,
            EntityError::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "NOT_FOUND",
            EntityError::Conflict { .. } => "CONFLICT",
            EntityError::UnknownTable { .. } => "UNKNOWN_TABLE",
            EntityError::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }
}

impl From<EntityError> for ApiError {
    fn from(err: EntityError) -> Self {
        ApiError::Entity(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug)]
pub enum ValidationError {
    /// Single field validation error
    FieldError {
        field: String,
        message: String,
    },

    /// Multiple field validation errors
    FieldErrors(Vec<FieldIssue>),

    /// Invalid JSON body
    InvalidJson {
        message: String,
    },

    /// A foreign-key column references a row that does not exist
    InvalidReference {
        field: String,
        table: String,
    },
}

/// A single field validation failure
#[derive(Debug, Clone, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldError { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::InvalidJson { message } => {
                write!(f, "Invalid JSON: {}", message)
            }
            ValidationError::InvalidReference { field, table } => {
                write!(f, "'{}' references a missing row in '{}'", field, table)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::FieldError { .. } => "VALIDATION_ERROR",
            ValidationError::FieldErrors(_) => "VALIDATION_ERROR",
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
            ValidationError::InvalidReference { .. } => "INVALID_REFERENCE",
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to malformed requests
#[derive(Debug)]
pub enum RequestError {
    /// Identifier is neither a guid nor a natural key for this resource
    InvalidIdentifier {
        resource: String,
        value: String,
    },

    /// Search requested on a column that is not searchable
    UnknownSearchField {
        resource: String,
        field: String,
    },

    /// Invalid request body
    InvalidBody {
        message: String,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidIdentifier { resource, value } => {
                write!(f, "Invalid {} identifier: '{}'", resource, value)
            }
            RequestError::UnknownSearchField { resource, field } => {
                write!(f, "'{}' is not a searchable field of {}", field, resource)
            }
            RequestError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            RequestError::UnknownSearchField { .. } => "UNKNOWN_SEARCH_FIELD",
            RequestError::InvalidBody { .. } => "INVALID_BODY",
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug)]
pub enum StorageError {
    /// Backend-level failure (connection, query)
    Backend {
        backend: String,
        message: String,
    },

    /// Data integrity error
    Integrity {
        message: String,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Backend { backend, message } => {
                write!(f, "{} error: {}", backend, message)
            }
            StorageError::Integrity { message } => {
                write!(f, "Data integrity error: {}", message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for billhub operations
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Tests
// =============================================================================
