use anyhow::Context;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::clock::SystemClock;
use crate::config::config;
use crate::database::{DatabaseManager, PgStore, Store};
use crate::services::{EventService, NewEvent};
use crate::visibility::VisibilityResolver;

/// Reads a JSON array of events in the same shape `POST /api/events` accepts.
pub async fn load(file: &Path) -> anyhow::Result<Vec<NewEvent>> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of events", file.display()))
}

pub async fn seed(file: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let entries = load(file).await?;

    let pool = DatabaseManager::connect(&config().database).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let events = EventService::new(store.clone(), VisibilityResolver::new(store), Arc::new(SystemClock));
    let report = events.seed_system(entries).await?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({"success": true, "data": report})),
        OutputFormat::Text => {
            for event in &report.published {
                println!("{}  {}  {}", event.id, event.date.format("%Y-%m-%d"), event.title);
            }
            println!(
                "Published {} system events, skipped {} already present",
                report.published.len(),
                report.skipped
            );
        }
    }
    Ok(())
}
