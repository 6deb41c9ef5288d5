mod commands;
mod config;
mod identity;
mod scrape;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{cmd_ideas, cmd_labels, cmd_reap};
use crate::config::Config;
use haus_core::db::Database;
use haus_core::models::{IdeaFilter, LabelKind};
use haus_core::store::Store;

#[derive(Parser)]
#[command(
    name = "haus",
    version,
    about = "Household backend: food plans, notes, tasks, recipes and recipe ideas"
)]
struct Cli {
    /// Path to the SQLite database (default: <data dir>/haus/haus.db)
    #[arg(long, global = true, env = "HAUS_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// List recipe ideas
    Ideas {
        /// Only ideas whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Only ideas in this category ID
        #[arg(short, long)]
        category: Option<i64>,
        /// Only ideas with any of these tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Only ideas with any of these main ingredients (comma-separated)
        #[arg(long, value_delimiter = ',')]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipe tags with usage counts
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List main ingredients with usage counts
    Ingredients {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete tags and ingredients no recipe idea uses
    Reap {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haus=info,haus_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;

    match cli.command {
        Commands::Serve { port, bind } => {
            tracing::info!("Using database {}", config.db_path.display());
            server::start_server(Store::new(db), port, &bind).await
        }
        Commands::Ideas {
            search,
            category,
            tags,
            ingredients,
            json,
        } => {
            let clean = |names: Vec<String>| -> Vec<String> {
                names
                    .into_iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect()
            };
            let filter = IdeaFilter {
                search,
                category,
                tags: clean(tags),
                ingredients: clean(ingredients),
            };
            cmd_ideas(&db, &filter, json)
        }
        Commands::Tags { json } => cmd_labels(&db, LabelKind::Tag, json),
        Commands::Ingredients { json } => cmd_labels(&db, LabelKind::Ingredient, json),
        Commands::Reap { json } => cmd_reap(&db, json),
    }
}
