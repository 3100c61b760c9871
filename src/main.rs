//! billhub server binary
//!
//! Reads configuration from the environment, picks the storage backend,
//! builds the router with every registered resource and serves it.

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use billhub::config::{self, AppConfig};
use billhub::entities;
use billhub::server::ServerBuilder;
use billhub::storage::{InMemoryStore, TableStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("billhub=info,tower_http=info")),
        )
        .init();

    let app_config = AppConfig::from_env()?;
    config::set_runtime_env(app_config.env);

    let registry = entities::default_registry();
    let store = select_store(&app_config, &registry).await?;

    let builder = ServerBuilder::new()
        .with_store_arc(store)
        .with_registry(registry);

    let app = builder.build()?;

    let listener = tokio::net::TcpListener::bind(app_config.bind_addr()).await?;
    tracing::info!(
        addr = %app_config.bind_addr(),
        env = ?app_config.env,
        "billhub listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Pick the storage backend from the configuration.
///
/// With the `postgres` feature and a `DATABASE_URL`, connect and apply the
/// schema; otherwise fall back to the in-memory store.
async fn select_store(
    config: &AppConfig,
    registry: &billhub::server::TableRegistry,
) -> Result<Arc<dyn TableStore>> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        let store = billhub::storage::PostgresStore::connect(url).await?;
        store.ensure_schema(&registry.schemas()).await?;
        tracing::info!("using PostgreSQL storage");
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "postgres"))]
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL set but the postgres feature is not enabled");
    }

    let _ = registry;
    tracing::info!("using in-memory storage");
    Ok(Arc::new(InMemoryStore::new()))
}
