// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use copilot::agent::Agent;
use copilot::batch::run_batch;
use copilot::config::Config;
use copilot::llm::OllamaClient;
use copilot::retrieval::DocumentIndex;
use copilot::sql::{SchemaCache, SqlExecutor};

/// Run the retail analytics copilot in batch mode
#[derive(Debug, Parser)]
#[command(name = "copilot", version, about)]
struct Args {
    /// Input JSONL file with questions
    #[arg(long)]
    batch: PathBuf,

    /// Output JSONL file for results
    #[arg(long)]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    info!("Starting retail analytics copilot");
    info!("Model: {} @ {}", config.model, config.ollama_base_url);
    info!("Database: {}", config.database_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.sqlite_max_connections)
        .connect(&config.database_url)
        .await?;

    let schema = Arc::new(SchemaCache::load(&pool).await?);
    let index = Arc::new(DocumentIndex::load(&config.docs_dir));
    info!("Indexed {} document chunks", index.len());

    let completion = Arc::new(OllamaClient::new(&config)?);
    let agent = Agent::new(
        completion,
        index,
        SqlExecutor::new(pool),
        schema,
        &config,
    );

    let summary = run_batch(&agent, &args.batch, &args.out).await?;
    info!(
        "Done: {} answered, {} failed -> {}",
        summary.answered,
        summary.failed,
        args.out.display()
    );

    Ok(())
}
