//! Reusable field filters
//!
//! Filters transform field values before validation runs: cleanup (trim,
//! case normalization, rounding) and defaults for omitted columns.

use anyhow::Result;
use serde_json::{Value, json};

/// Filter: trim whitespace from string
pub fn trim() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| {
        if let Some(s) = value.as_str() {
            Ok(Value::String(s.trim().to_string()))
        } else {
            Ok(value)
        }
    }
}

/// Filter: convert string to uppercase
pub fn uppercase() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| {
        if let Some(s) = value.as_str() {
            Ok(Value::String(s.to_uppercase()))
        } else {
            Ok(value)
        }
    }
}

/// Filter: convert string to lowercase
pub fn lowercase() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| {
        if let Some(s) = value.as_str() {
            Ok(Value::String(s.to_lowercase()))
        } else {
            Ok(value)
        }
    }
}

/// Filter: round number to specified decimal places
pub fn round_decimals(decimals: u32) -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    move |_: &str, value: Value| {
        if let Some(num) = value.as_f64() {
            let factor = 10_f64.powi(decimals as i32);
            let rounded = (num * factor).round() / factor;
            Ok(json!(rounded))
        } else {
            Ok(value)
        }
    }
}

/// Filter: replace a null/omitted value with a constant default
pub fn default_value(default: Value) -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    move |_: &str, value: Value| {
        if value.is_null() {
            Ok(default.clone())
        } else {
            Ok(value)
        }
    }
}

/// Filter: default a null/omitted instant to now (RFC 3339)
pub fn default_now() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| {
        if value.is_null() {
            Ok(Value::String(chrono::Utc::now().to_rfc3339()))
        } else {
            Ok(value)
        }
    }
}

/// Filter: default a null/omitted value to a fresh UUID string
pub fn default_uuid() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| {
        if value.is_null() {
            Ok(Value::String(uuid::Uuid::new_v4().to_string()))
        } else {
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // === trim() ===

    #[test]
    fn test_trim_removes_whitespace() {
        let f = trim();
        let result = f("name", json!("  hello  ")).expect("should not fail");
        assert_eq!(result, json!("hello"));
    }

    #[test]
    fn test_trim_non_string_passthrough() {
        let f = trim();
        let result = f("age", json!(42)).expect("should not fail");
        assert_eq!(result, json!(42));
    }

    // === case filters ===

    #[test]
    fn test_uppercase_converts_string() {
        let f = uppercase();
        let result = f("iso_code", json!("fr")).expect("should not fail");
        assert_eq!(result, json!("FR"));
    }

    #[test]
    fn test_lowercase_converts_string() {
        let f = lowercase();
        let result = f("subdomain", json!("Acme")).expect("should not fail");
        assert_eq!(result, json!("acme"));
    }

    // === round_decimals() ===

    #[test]
    fn test_round_decimals() {
        let f = round_decimals(2);
        let result = f("amount", json!(12.3456)).expect("should not fail");
        assert_eq!(result, json!(12.35));
    }

    #[test]
    fn test_round_decimals_non_number_passthrough() {
        let f = round_decimals(2);
        let result = f("amount", json!("abc")).expect("should not fail");
        assert_eq!(result, json!("abc"));
    }

    // === defaults ===

    #[test]
    fn test_default_value_fills_null() {
        let f = default_value(json!(true));
        assert_eq!(f("is_active", json!(null)).unwrap(), json!(true));
        assert_eq!(f("is_active", json!(false)).unwrap(), json!(false));
    }

    #[test]
    fn test_default_now_fills_null_with_rfc3339() {
        let f = default_now();
        let value = f("detected_at", json!(null)).unwrap();
        let s = value.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(s).is_ok());
    }

    #[test]
    fn test_default_uuid_fills_null() {
        let f = default_uuid();
        let value = f("correlation_id", json!(null)).unwrap();
        assert!(uuid::Uuid::parse_str(value.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_default_uuid_keeps_existing() {
        let f = default_uuid();
        let value = f("correlation_id", json!("keep-me")).unwrap();
        assert_eq!(value, json!("keep-me"));
    }
}
