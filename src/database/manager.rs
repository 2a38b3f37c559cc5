use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::store::StoreError;

const SCHEMA: &str = include_str!("schema.sql");

/// Builds the connection pool and bootstraps the schema
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
        let database_url = Self::database_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&database_url)
            .await?;

        info!("Created database pool for: {}", Self::redact(&database_url));
        Ok(pool)
    }

    /// Applies `schema.sql`. Every statement is idempotent.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
        pool.execute(SCHEMA).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    fn database_url() -> Result<String, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::QueryError("DATABASE_URL is not set".to_string()))?;
        url::Url::parse(&url).map_err(|_| StoreError::QueryError("DATABASE_URL is not a valid URL".to_string()))?;
        Ok(url)
    }

    /// Connection string safe for logs
    fn redact(database_url: &str) -> String {
        match url::Url::parse(database_url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("****"));
                }
                url.into()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }
}
