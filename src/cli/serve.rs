use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cli::StoreKind;
use crate::config::config;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::router::app;
use crate::state::AppState;
use crate::storage::LocalBlobStore;

pub async fn handle(port: u16, store: StoreKind, uploads: Option<PathBuf>, migrate: bool) -> anyhow::Result<()> {
    let config = config();
    info!("Starting Family Notes API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }
    if crate::is_production!() && store == StoreKind::Memory {
        anyhow::bail!("The memory store is not available in production");
    }

    let store: Arc<dyn Store> = match store {
        StoreKind::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            if migrate {
                DatabaseManager::ensure_schema(&pool).await?;
            }
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            info!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let upload_dir = uploads.unwrap_or_else(|| PathBuf::from(&config.uploads.dir));
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .with_context(|| format!("failed to create upload directory {}", upload_dir.display()))?;
    let blobs = Arc::new(LocalBlobStore::new(upload_dir));

    let state = AppState::new(store, blobs, config)?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Family Notes API listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
