use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hnmirror_feed::FeedClient;
use hnmirror_storage::{ItemStore, PgItemStore};
use hnmirror_sync::{SyncConfig, SyncEngine};
use hnmirror_web::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hnmirror")]
#[command(about = "Hacker News mirror daemon and tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply migrations, start the sync engine and serve the read API.
    Serve,
    /// Run a single sync cycle and exit.
    Sync,
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let (store, engine) = build(&config).await?;
            engine.start().await?;
            let port = web_port();
            info!(port, "serving read api");
            hnmirror_web::serve(AppState { store, engine }, port).await?;
        }
        Commands::Sync => {
            let (_store, engine) = build(&config).await?;
            let summary = engine.run_cycle().await;
            println!(
                "sync complete: run_id={} persisted={} failed_categories={:?}",
                summary.run_id,
                summary.total_persisted(),
                summary.failed_categories()
            );
        }
        Commands::Migrate => {
            let store = PgItemStore::connect(&config.database_url)
                .await
                .context("connecting to database")?;
            store.run_migrations().await.context("applying migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}

async fn build(config: &SyncConfig) -> Result<(Arc<dyn ItemStore>, Arc<SyncEngine>)> {
    let store = PgItemStore::connect(&config.database_url)
        .await
        .context("connecting to database")?;
    store.run_migrations().await.context("applying migrations")?;
    let store: Arc<dyn ItemStore> = Arc::new(store);

    let feed = FeedClient::new(config.feed_config()).context("building feed client")?;
    let engine = Arc::new(SyncEngine::new(
        Arc::new(feed),
        Arc::clone(&store),
        config.poll_interval,
    ));
    Ok((store, engine))
}

fn web_port() -> u16 {
    std::env::var("HNMIRROR_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}
