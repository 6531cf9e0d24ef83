//! Mokuhyo - goal-tree server
//!
//! `serve` runs the HTTP API; `suggest` prints the follow-up question for a
//! new child of one node in a JSON tree snapshot.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mokuhyo_server::oracle::QuestionOracle;
use mokuhyo_server::tree::models::TreeSnapshot;
use mokuhyo_server::tree::{MemoryTreeStore, TreeStore};
use mokuhyo_server::{AppState, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mokuhyo")]
#[command(about = "Goal-tree server with follow-up question generation")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the question a new child of PARENT would receive
    Suggest {
        /// JSON file with `{"nodes": [...], "edges": [...]}`
        #[arg(short, long)]
        tree: PathBuf,

        /// Parent node ID
        #[arg(long)]
        parent: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            mokuhyo_server::start_server(config).await
        }
        Commands::Suggest { tree, parent } => run_suggest(config, &tree, parent).await,
    }
}

/// Logs go to stderr so `suggest` keeps stdout for its JSON output.
/// `LOG_FORMAT=json` switches to structured JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,mokuhyo_server=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_suggest(config: Config, tree_path: &std::path::Path, parent: Uuid) -> Result<()> {
    let raw = std::fs::read_to_string(tree_path)
        .with_context(|| format!("Failed to read {}", tree_path.display()))?;
    let snapshot: TreeSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse tree snapshot {}", tree_path.display()))?;

    let project_id = snapshot
        .nodes
        .iter()
        .find(|n| n.id == parent)
        .map(|n| n.project_id)
        .with_context(|| format!("Parent {} is not in the snapshot", parent))?;

    let store: Arc<dyn TreeStore> = Arc::new(MemoryTreeStore::new().with_snapshot(snapshot).await);
    let oracle = config
        .oracle()
        .map(|o| Arc::new(o) as Arc<dyn QuestionOracle>);
    let state = AppState::with_services(config, store, oracle);

    let outcome = state
        .questions
        .question_for_child(project_id, Some(parent), &CancellationToken::new())
        .await?
        .context("No question produced")?;

    tracing::info!(source = ?outcome.source, calls = outcome.oracle_calls, "question resolved");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
