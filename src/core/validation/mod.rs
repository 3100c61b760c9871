//! Validation and filtering system
//!
//! Declarative, closure-based validation applied to request payloads before
//! they reach the storage layer. Each entity declares, per operation, a set
//! of field filters (cleanup, defaults), field validators, row-level checks
//! (cross-field rules) and status-transition rules.

pub mod config;
pub mod filters;
pub mod validators;

pub use config::{Operation, StatusFlow, ValidationConfig};
