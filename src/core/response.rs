//! Response envelope shared by every endpoint
//!
//! All handlers answer with the same JSON shape:
//!
//! ```json
//! { "success": true,  "data": ..., "timestamp": "..." }
//! { "success": false, "error": { "code": "...", "message": "..." }, "timestamp": "..." }
//! ```

use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

/// Error payload inside the envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Wrap a payload in a success envelope
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Build a failure envelope body
pub fn failure(code: &str, message: &str, details: Option<Value>) -> Value {
    json!({
        "success": false,
        "error": ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
            details,
        },
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = success(json!({"iso_code": "FR"}));
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["iso_code"], json!("FR"));
        assert!(body["timestamp"].is_string());
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_failure_envelope_shape() {
        let body = failure("NOT_FOUND", "country 'ZZ' not found", None);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("NOT_FOUND"));
        assert_eq!(body["error"]["message"], json!("country 'ZZ' not found"));
        assert!(body["error"].get("details").is_none());
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn test_failure_envelope_with_details() {
        let body = failure(
            "VALIDATION_ERROR",
            "Validation errors",
            Some(json!({"fields": [{"field": "name", "message": "required"}]})),
        );
        assert_eq!(body["error"]["details"]["fields"][0]["field"], json!("name"));
    }
}
