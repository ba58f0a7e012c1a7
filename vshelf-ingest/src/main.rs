//! vshelf-ingest - Semantic Ingestion & Taxonomy service
//!
//! Subcommands:
//! - `serve`: HTTP API (ingest, relevant collections, health)
//! - `ingest <source-id>`: one video
//! - `backfill`: every known source video, sequentially
//! - `recommend <video-id>`: closest SYSTEM collection

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vshelf_common::config::{
    default_config_path, load_or_default, resolve_api_keys, CompiledDefaults,
    RootFolderInitializer, RootFolderResolver, TomlConfig, CONFIG_PATH_ENV,
};

use vshelf_ingest::config::{CallerConfig, PipelineConfig};
use vshelf_ingest::services::{
    Backfill, HttpGenerationBackend, IngestOutcome, IngestServices, SqliteTranscriptProvider,
};
use vshelf_ingest::AppState;

#[derive(Debug, Parser)]
#[command(name = "vshelf-ingest", version, about = "Semantic ingestion and taxonomy engine")]
struct Cli {
    /// Root folder holding vshelf.db
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Overrides [server] bind_address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ingest one source video
    Ingest { source_id: String },
    /// Ingest every source video
    Backfill {
        /// Pause between videos (overrides [ingest] backfill_delay_ms)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Closest taxonomy collection for an ingested video
    Recommend {
        video_id: Uuid,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        threshold: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(default_config_path);
    let toml_config = load_or_default(config_path.as_deref());
    init_tracing(&toml_config);

    info!("Starting vshelf-ingest");
    info!(
        "Version: {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("VSHELF_GIT_HASH"),
        env!("VSHELF_BUILD_TIMESTAMP")
    );

    // Resolve root folder: CLI → ENV → TOML → default
    let root_folder = RootFolderResolver::new("vshelf-ingest")
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = vshelf_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let services = build_services(db.clone(), &toml_config)?;

    match cli.command {
        Command::Serve { bind } => {
            let bind_address = bind.unwrap_or_else(|| toml_config.server.bind_address.clone());
            let app = vshelf_ingest::build_router(AppState::new(db, services));

            let listener = tokio::net::TcpListener::bind(&bind_address)
                .await
                .with_context(|| format!("Failed to bind {}", bind_address))?;
            info!("Listening on http://{}", bind_address);
            info!("Health check: http://{}/health", bind_address);

            axum::serve(listener, app).await?;
        }
        Command::Ingest { source_id } => {
            let outcome = services.orchestrator.ingest(&source_id).await?;
            if let IngestOutcome::Skipped { .. } = outcome {
                info!(source_id = %source_id, "Nothing to ingest");
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Backfill { delay_ms } => {
            let delay = delay_ms.unwrap_or(toml_config.ingest.backfill_delay_ms);
            let backfill = Backfill::new(services.orchestrator, Duration::from_millis(delay));
            let summary = backfill.run().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Recommend {
            video_id,
            threshold,
        } => {
            let best = services
                .librarian
                .find_relevant_collections(video_id, threshold)
                .await?;
            println!("{}", serde_json::to_string_pretty(&best)?);
        }
    }

    Ok(())
}

/// RUST_LOG wins; otherwise `[logging] level`, otherwise the compiled default
fn init_tracing(config: &TomlConfig) {
    let fallback = if config.logging.level.trim().is_empty() {
        CompiledDefaults::for_current_platform().log_level
    } else {
        config.logging.level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_services(db: sqlx::SqlitePool, config: &TomlConfig) -> Result<IngestServices> {
    let credentials = resolve_api_keys(&config.generation)?;
    let caller_config = CallerConfig::from_generation(&config.generation, credentials);
    let pipeline = PipelineConfig::from_toml(config);

    let backend = HttpGenerationBackend::new(
        config.generation.base_url.clone(),
        Duration::from_secs(config.generation.request_timeout_secs),
    )
    .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

    let provider = Arc::new(SqliteTranscriptProvider::new(db.clone()));
    let services = IngestServices::build(db, caller_config, pipeline, Arc::new(backend), provider)?;
    Ok(services)
}
