//! # billhub
//!
//! A multi-tenant SaaS billing and reference-data backend.
//!
//! ## Features
//!
//! - **Uniform resource pattern**: every entity declares a table schema,
//!   a validation config, a domain type and a route module
//! - **Declarative validation**: field filters and validators, cross-field
//!   row checks and status-transition rules per operation
//! - **Typed errors**: every failure maps to an HTTP status and a stable
//!   error code inside a common response envelope
//! - **Pluggable storage**: in-memory backend by default, PostgreSQL behind
//!   the `postgres` feature flag
//! - **Atomic identifiers**: 6-digit guids assigned from per-table offsets
//!   inside the storage layer, never via a separate max() read
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use billhub::prelude::*;
//!
//! let app = ServerBuilder::new()
//!     .with_store(InMemoryStore::new())
//!     .with_registry(billhub::entities::default_registry())
//!     .build()?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        error::{ApiError, ApiResult, EntityError, RequestError, StorageError, ValidationError},
        query::{ListParams, Page, TableRevision},
        record::{Dao, Record},
        response,
        schema::{ColumnType, TableSchema},
        validation::{Operation, StatusFlow, ValidationConfig, filters, validators},
    };

    // === Macros ===
    pub use crate::impl_record;

    // === Storage ===
    pub use crate::storage::{InMemoryStore, TableStore};
    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresStore;

    // === Config ===
    pub use crate::config::{AppConfig, Environment};

    // === Server ===
    pub use crate::server::{AppState, ServerBuilder, TableRegistry};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;

    // === Axum ===
    pub use axum::{
        Json, Router,
        extract::{Path, Query, State},
        routing::{delete, get, post, put},
    };
}
