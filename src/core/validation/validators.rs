//! Reusable field validators
//!
//! Validators receive the field name and its JSON value and return a message
//! on failure. Type-mismatched values pass through (another validator or the
//! deserialization step reports those), so validators compose freely.

use regex::Regex;
use serde_json::Value;

/// Validator: field is required (not null)
pub fn required() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if value.is_null() {
            Err(format!("'{}' is required", field))
        } else {
            Ok(())
        }
    }
}

/// Validator: field is optional (always valid)
pub fn optional() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |_: &str, _: &Value| Ok(())
}

/// Validator: number must be strictly positive
pub fn positive() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if let Some(num) = value.as_f64() {
            if num <= 0.0 {
                Err(format!("'{}' must be positive (got {})", field, num))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: number must be zero or greater
pub fn non_negative() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if let Some(num) = value.as_f64() {
            if num < 0.0 {
                Err(format!("'{}' must not be negative (got {})", field, num))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: number must be a whole number
pub fn integer() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if value.is_number() && value.as_i64().is_none() {
            Err(format!("'{}' must be an integer", field))
        } else {
            Ok(())
        }
    }
}

/// Validator: string length must be within range
pub fn string_length(
    min: usize,
    max: usize,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if len < min {
                Err(format!(
                    "'{}' must be at least {} characters (got {})",
                    field, min, len
                ))
            } else if len > max {
                Err(format!(
                    "'{}' must not exceed {} characters (got {})",
                    field, max, len
                ))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: number must not be below minimum
pub fn min_value(min: f64) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(num) = value.as_f64() {
            if num < min {
                Err(format!("'{}' must be at least {} (got {})", field, min, num))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: number must not exceed maximum
pub fn max_value(max: f64) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(num) = value.as_f64() {
            if num > max {
                Err(format!("'{}' must not exceed {} (got {})", field, max, num))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: number must be within an inclusive range
pub fn range(
    min: f64,
    max: f64,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(num) = value.as_f64() {
            if num < min || num > max {
                Err(format!(
                    "'{}' must be between {} and {} (got {})",
                    field, min, max, num
                ))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: value must be in allowed list
pub fn in_list(
    allowed: Vec<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if !allowed.contains(&s.to_string()) {
                Err(format!(
                    "'{}' must be one of {:?} (got '{}')",
                    field, allowed, s
                ))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: date string must match format
pub fn date_format(
    format: &'static str,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            match chrono::NaiveDate::parse_from_str(s, format) {
                Ok(_) => Ok(()),
                Err(_) => Err(format!(
                    "'{}' must be a date in format {} (got '{}')",
                    field, format, s
                )),
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: string must match a regex pattern.
///
/// The pattern is a compile-time literal; compilation failure is a
/// programming error.
pub fn matches(
    pattern: &'static str,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    let re = Regex::new(pattern).expect("invalid validator pattern");
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if re.is_match(s) {
                Ok(())
            } else {
                Err(format!("'{}' must match {} (got '{}')", field, pattern, s))
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: string must be a plausible email address
pub fn email() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("invalid email pattern");
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if re.is_match(s) {
                Ok(())
            } else {
                Err(format!("'{}' must be a valid email address", field))
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: string must be a dotted IPv4 address
pub fn ipv4() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if s.parse::<std::net::Ipv4Addr>().is_ok() {
                Ok(())
            } else {
                Err(format!("'{}' must be an IPv4 address (got '{}')", field, s))
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: string must parse as a UUID
pub fn uuid_format() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if uuid::Uuid::parse_str(s).is_ok() {
                Ok(())
            } else {
                Err(format!("'{}' must be a UUID (got '{}')", field, s))
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: instant string must parse as RFC 3339
pub fn rfc3339() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if chrono::DateTime::parse_from_rfc3339(s).is_ok() {
                Ok(())
            } else {
                Err(format!(
                    "'{}' must be an RFC 3339 timestamp (got '{}')",
                    field, s
                ))
            }
        } else {
            Ok(())
        }
    }
}
