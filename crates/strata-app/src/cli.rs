//! CLI argument definitions for the Strata binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Default service port when neither flag, env, nor config set one.
pub const DEFAULT_PORT: u16 = 8000;

/// Strata - ingest text files into a vector store and serve similarity search.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about)]
pub struct CliArgs {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a vector store from the sources named in an ingestion config.
    Ingest(IngestArgs),
    /// Load a vector store and serve search over HTTP.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Ingestion config (JSON, or TOML when the name ends in `.toml`).
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Directory the store is written to.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,

    /// Delete record files the new index no longer lists.
    #[arg(long = "prune")]
    pub prune: bool,

    /// Directory embedding models are looked up in.
    #[arg(long = "model-dir")]
    pub model_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Store directory produced by `strata ingest`.
    #[arg(short = 'v', long = "vector-dir")]
    pub vector_dir: PathBuf,

    /// Service configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Port to bind.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Embedding model to use for text queries, overriding the store's.
    #[arg(long = "embedder-model")]
    pub embedder_model: Option<String>,

    /// Directory embedding models are looked up in.
    #[arg(long = "model-dir")]
    pub model_dir: Option<PathBuf>,
}

impl ServeArgs {
    /// Resolve the service configuration path.
    ///
    /// Priority: --config flag > STRATA_CONFIG env var > ~/.strata/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        resolve_config_path(self.config.as_deref())
    }

    /// Resolve the bind port.
    ///
    /// Priority: --port flag > STRATA_PORT env var > config file value > 8000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        let env = std::env::var("STRATA_PORT").ok();
        pick_port(self.port, env.as_deref(), config_port)
    }

    /// Resolve the bind host: --host flag > config file value.
    pub fn resolve_host(&self, config_host: &str) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| config_host.to_string())
    }
}

/// Service configuration path for a command with an optional `--config`.
pub fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(p) = flag {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var("STRATA_CONFIG") {
        return PathBuf::from(p);
    }
    default_config_path()
}

fn pick_port(flag: Option<u16>, env: Option<&str>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = env.and_then(|val| val.parse::<u16>().ok()) {
        return p;
    }
    if config_port != 0 {
        return config_port;
    }
    DEFAULT_PORT
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".strata").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"));
    match (rest, home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if path == "~" => home_dir().unwrap_or_else(|| PathBuf::from(".")),
        _ => PathBuf::from(path),
    }
}
