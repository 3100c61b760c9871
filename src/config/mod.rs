//! Environment configuration
//!
//! The service is configured entirely through environment variables:
//!
//! | Variable       | Default       | Purpose                                |
//! |----------------|---------------|----------------------------------------|
//! | `SERVER_HOST`  | `127.0.0.1`   | bind address                           |
//! | `PORT`         | `3000`        | bind port                              |
//! | `APP_ENV`      | `development` | runtime environment                    |
//! | `DATABASE_URL` | —             | PostgreSQL URL (`postgres` feature)    |
//!
//! The runtime environment controls error redaction: 500 responses carry
//! internal detail only outside `production`.

use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                var: "APP_ENV".to_string(),
                value: s.to_string(),
                message: "expected development, test or production".to_string(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {message}")]
    InvalidValue {
        var: String,
        value: String,
        message: String,
    },
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: Environment,
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                var: "PORT".to_string(),
                value: raw,
                message: "expected a port number".to_string(),
            })?,
            Err(_) => 3000,
        };

        let env = match std::env::var("APP_ENV") {
            Ok(raw) => raw.parse()?,
            Err(_) => Environment::default(),
        };

        Ok(Self {
            host,
            port,
            env,
            database_url: std::env::var("DATABASE_URL").ok(),
        })
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

static RUNTIME_ENV: OnceLock<Environment> = OnceLock::new();

/// Record the runtime environment for the life of the process.
///
/// Called once from the binary; later calls are ignored.
pub fn set_runtime_env(env: Environment) {
    let _ = RUNTIME_ENV.set(env);
}

/// The runtime environment (defaults to development when never set,
/// which is the case in tests)
pub fn runtime_env() -> Environment {
    RUNTIME_ENV.get().copied().unwrap_or_default()
}

/// Whether the process runs in production mode
pub fn is_production() -> bool {
    runtime_env() == Environment::Production
}
