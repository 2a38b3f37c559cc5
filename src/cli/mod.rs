pub mod backfill;
pub mod events;
pub mod schema;
pub mod serve;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "family-notes")]
#[command(about = "Family Notes - notes and calendar backend with family-scoped sharing")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API server")]
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3000, help = "Port to listen on")]
        port: u16,

        #[arg(long, value_enum, env = "STORE", default_value_t = StoreKind::Postgres, help = "Storage backend")]
        store: StoreKind,

        #[arg(long, help = "Attachment directory (overrides UPLOADS_DIR)")]
        uploads: Option<PathBuf>,

        #[arg(long, help = "Apply the database schema before serving")]
        migrate: bool,
    },

    #[command(about = "Apply the database schema (idempotent)")]
    Schema,

    #[command(about = "Convert legacy per-user family codes into memberships")]
    Backfill {
        #[arg(help = "JSON array of {user_id, family_code, created_at}")]
        file: PathBuf,

        #[arg(long, help = "Print the plan without writing it")]
        dry_run: bool,
    },

    #[command(about = "Manage system events")]
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
}

#[derive(Subcommand)]
pub enum EventsCommand {
    #[command(about = "Publish system events from a file, skipping ones already present")]
    Seed {
        #[arg(help = "JSON array of {title, date, event_type, recurrence, ...}")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve {
            port,
            store,
            uploads,
            migrate,
        } => serve::handle(port, store, uploads, migrate).await,
        Commands::Schema => schema::handle(output_format).await,
        Commands::Backfill { file, dry_run } => backfill::handle(&file, dry_run, output_format).await,
        Commands::Events {
            command: EventsCommand::Seed { file },
        } => events::seed(&file, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["family-notes", "serve", "--store", "memory"]).unwrap();
        match cli.command {
            Commands::Serve { store, migrate, .. } => {
                assert_eq!(store, StoreKind::Memory);
                assert!(!migrate);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn backfill_takes_a_file() {
        let cli = Cli::try_parse_from(["family-notes", "--json", "backfill", "users.json", "--dry-run"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Backfill { file, dry_run } => {
                assert_eq!(file, PathBuf::from("users.json"));
                assert!(dry_run);
            }
            _ => panic!("expected backfill"),
        }
    }

    #[test]
    fn events_seed_takes_a_file() {
        let cli = Cli::try_parse_from(["family-notes", "events", "seed", "holidays.json"]).unwrap();
        match cli.command {
            Commands::Events {
                command: EventsCommand::Seed { file },
            } => assert_eq!(file, PathBuf::from("holidays.json")),
            _ => panic!("expected events seed"),
        }
        assert!(Cli::try_parse_from(["family-notes", "events", "seed"]).is_err());
    }
}
