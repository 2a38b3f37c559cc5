use anyhow::Context;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{DatabaseManager, PgStore, Store};
use crate::services::migration::{apply_backfill, plan_legacy_backfill, BackfillReport, LegacyUser};

pub async fn handle(file: &Path, dry_run: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let users: Vec<LegacyUser> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of legacy users", file.display()))?;

    let plan = plan_legacy_backfill(&users);

    let report: Option<BackfillReport> = if dry_run {
        None
    } else {
        let pool = DatabaseManager::connect(&config().database).await?;
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        Some(apply_backfill(&store, &plan).await?)
    };

    match output_format {
        OutputFormat::Json => {
            let families: Vec<_> = plan
                .families
                .iter()
                .map(|planned| {
                    json!({
                        "id": planned.family.id,
                        "name": planned.family.name,
                        "creator_id": planned.family.creator_id,
                        "members": planned.members.len(),
                    })
                })
                .collect();
            println!(
                "{}",
                json!({"success": true, "data": {"applied": report, "families": families}})
            );
        }
        OutputFormat::Text => {
            for planned in &plan.families {
                println!(
                    "{}  {}  owner={}  members={}",
                    planned.family.id,
                    planned.family.name,
                    planned.family.creator_id,
                    planned.members.len()
                );
            }
            match report {
                None => println!(
                    "Planned {} families with {} memberships",
                    plan.families.len(),
                    plan.member_count()
                ),
                Some(report) => println!(
                    "Created {} families with {} memberships, skipped {} already present",
                    report.created, report.memberships, report.skipped
                ),
            }
        }
    }
    Ok(())
}
