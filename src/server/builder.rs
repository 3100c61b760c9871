//! ServerBuilder for fluent API to build the HTTP server
//!
//! # Example
//!
//! ```ignore
//! let app = ServerBuilder::new()
//!     .with_store(InMemoryStore::new())
//!     .with_registry(entities::default_registry())
//!     .build()?;
//! ```

use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::record::Record;
use crate::core::response;
use crate::server::registry::TableRegistry;
use crate::server::rest::AppState;
use crate::storage::TableStore;

/// Builder for the service router
pub struct ServerBuilder {
    store: Option<Arc<dyn TableStore>>,
    registry: TableRegistry,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            store: None,
            registry: TableRegistry::new(),
        }
    }

    /// Set the storage backend (required)
    pub fn with_store(mut self, store: impl TableStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set an already-shared storage backend
    pub fn with_store_arc(mut self, store: Arc<dyn TableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a pre-built registry (replaces individually registered resources)
    pub fn with_registry(mut self, registry: TableRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a single resource
    pub fn register<R: Record>(
        mut self,
        routes: fn() -> Router<AppState>,
    ) -> Self {
        self.registry.register::<R>(routes);
        self
    }

    /// Access the registry (e.g. to run schema setup before serving)
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Build the final router
    ///
    /// This generates:
    /// - the service descriptor route (`GET /`)
    /// - health check routes
    /// - all registered resource routes
    /// and attaches request tracing plus a permissive CORS layer.
    pub fn build(self) -> Result<Router> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("TableStore is required. Call .with_store()"))?;

        let resources: Vec<String> = self
            .registry
            .resource_names()
            .into_iter()
            .map(String::from)
            .collect();

        let state = AppState { store };

        let service_routes: Router<AppState> = Router::new()
            .route(
                "/",
                get(move || {
                    let resources = resources.clone();
                    async move { service_index(&resources) }
                }),
            )
            .route("/health", get(health_check))
            .route("/healthz", get(health_check));

        let app = service_routes
            .merge(self.registry.build_routes())
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        Ok(app)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Service descriptor handler body
fn service_index(resources: &[String]) -> Json<Value> {
    response::success(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "resources": resources,
    }))
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}
