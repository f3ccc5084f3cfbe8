//! Strata application binary - composition root.
//!
//! `strata ingest` loads an ingestion config, chunks and embeds the matching
//! files, and writes a store directory. `strata serve` loads a store, the
//! embedding model named in its index, and serves search over HTTP until
//! Ctrl-C.

mod cli;

use std::path::PathBuf;

use clap::Parser;

use strata_core::config::{IngestConfig, StrataConfig};
use strata_vector::embedding::build_embedder;
use strata_vector::pipeline::IngestPipeline;
use strata_vector::store::load_store;

use strata_api::routes;
use strata_api::state::AppState;

use cli::{CliArgs, Command, IngestArgs, ServeArgs};

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn model_dir(flag: Option<&PathBuf>, config: &StrataConfig) -> PathBuf {
    flag.cloned()
        .unwrap_or_else(|| cli::expand_home(&config.general.model_dir))
}

async fn run_ingest(args: IngestArgs, config: StrataConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ingest_config = match IngestConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %args.config.display(), error = %e, "Invalid ingestion config");
            return Err(e.into());
        }
    };

    let models = model_dir(args.model_dir.as_ref(), &config);
    let report = IngestPipeline::new(ingest_config, models)
        .with_prune(args.prune)
        .run(&args.output_dir)
        .await?;

    if report.degraded {
        tracing::warn!("Store was written with placeholder vectors; text search results will be meaningless");
    }
    tracing::info!(
        output = %args.output_dir.display(),
        files = report.files_processed,
        skipped = report.files_skipped,
        chunks = report.chunks,
        pruned = report.pruned,
        "Ingestion finished"
    );
    Ok(())
}

async fn run_serve(args: ServeArgs, config: StrataConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = match load_store(&args.vector_dir) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(dir = %args.vector_dir.display(), error = %e, "Failed to load vector store");
            return Err(e.into());
        }
    };

    // The store's own embedder config decides the query model unless overridden.
    let mut embedder_config = store.index().embedder.clone();
    if let Some(model) = &args.embedder_model {
        embedder_config.model = model.clone();
    }

    let models = model_dir(args.model_dir.as_ref(), &config);
    let embedder = match build_embedder(&embedder_config, &models) {
        Ok(embedder) => {
            tracing::info!(model = %embedder_config.model, kind = embedder.kind(), "Embedding model ready");
            if embedder.dimensions() != store.dimensions() && !store.is_empty() {
                tracing::warn!(
                    model_dims = embedder.dimensions(),
                    store_dims = store.dimensions(),
                    "Embedding model width differs from the store; text search will fail"
                );
            }
            Some(embedder)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Embedding model unavailable; text search disabled");
            None
        }
    };

    let host = args.resolve_host(&config.server.host);
    let port = args.resolve_port(config.server.port);
    let state = AppState::new(config, &args.vector_dir, store, embedder);

    routes::start_server(&host, port, state, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = match &args.command {
        Command::Serve(serve) => serve.resolve_config_path(),
        Command::Ingest(_) => cli::resolve_config_path(None),
    };
    let config = StrataConfig::load_or_default(&config_file);

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    init_tracing(&level);

    tracing::info!("Starting Strata v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    match args.command {
        Command::Ingest(ingest) => run_ingest(ingest, config).await,
        Command::Serve(serve) => run_serve(serve, config).await,
    }
}
