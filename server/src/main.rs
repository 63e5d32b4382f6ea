//! Ontograph command-line entry point
//!
//! Loads the records directory, runs one query and prints the result as JSON
//! on stdout. `watch` keeps the graph live and applies file changes until
//! interrupted. Logs go to stderr.

use clap::{Parser, Subcommand};
use ontograph_core::{RelationType, UpdateQueue};
use ontograph_server::{FileWatcher, OntologyService, ServerResult, Settings};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ontograph")]
#[command(about = "Query a concept knowledge graph built from JSON records")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print graph statistics
    Stats,

    /// Look up a concept by id, label or notation
    Get { id: String },

    /// Ranked search over labels and definitions
    Search {
        query: String,

        /// Maximum number of hits
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Concepts around a focus concept
    Expand {
        id: String,

        /// Relation type to follow; repeatable (default: broader, narrower, related)
        #[arg(long = "relation")]
        relations: Vec<RelationType>,

        /// Maximum number of hops
        #[arg(long, short)]
        depth: Option<u32>,

        /// Include the content of every reached concept
        #[arg(long)]
        content: bool,
    },

    /// Shortest connection between two concepts
    Path { from: String, to: String },

    /// Keep the graph in sync with the records directory until interrupted
    Watch,
}

fn print_json<T: Serialize>(value: &T) -> ServerResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> ServerResult<()> {
    let settings = cli.settings;
    let (service, loader) = OntologyService::from_records(&settings).await?;

    match cli.command {
        Command::Stats => print_json(&service.statistics()),
        Command::Get { id } => print_json(service.get_concept(&id)?.as_ref()),
        Command::Search { query, limit } => print_json(&service.search(&query, limit)?),
        Command::Expand {
            id,
            relations,
            depth,
            content,
        } => print_json(&service.expand_context(&id, relations, depth, content)?),
        Command::Path { from, to } => {
            let path = service.shortest_path(&from, &to)?;
            if path.is_none() {
                tracing::info!("No path between {} and {}", from, to);
            }
            print_json(&path)
        }
        Command::Watch => {
            let (queue, worker) = UpdateQueue::spawn(
                Arc::clone(service.coordinator()),
                ontograph_core::queue::DEFAULT_QUEUE_CAPACITY,
            );
            let mut watcher = FileWatcher::new(Arc::clone(&loader), queue, settings.debounce())?;
            watcher.watch(loader.root())?;

            let stats = service.statistics();
            tracing::info!(
                "Watching {} ({} concepts, {} relations)",
                loader.root().display(),
                stats.total_concepts,
                stats.total_relations
            );
            tracing::debug!("Query limits: {:?}", service.limits());

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down");

            if let Err(e) = watcher.unwatch(loader.root()) {
                tracing::warn!("Failed to stop watching {}: {}", loader.root().display(), e);
            }
            // Dropping the watcher closes the last queue handle
            drop(watcher);
            let _ = worker.await;
            print_json(&service.statistics())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ontograph_server=info,ontograph_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
