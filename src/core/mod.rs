//! Core module containing fundamental traits and types for the service

pub mod error;
pub mod query;
pub mod record;
pub mod response;
pub mod schema;
pub mod validation;

pub use error::{ApiError, ApiResult, EntityError, RequestError, StorageError, ValidationError};
pub use query::{ListParams, Page, TableRevision};
pub use record::{Dao, Record};
pub use schema::{ColumnType, TableSchema};
pub use validation::{Operation, ValidationConfig};
