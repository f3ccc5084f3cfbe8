use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Result, StrataError};

/// Default chunk budget in characters when a splitter omits `chunk_size`.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap budget in characters when a splitter omits `chunk_overlap`.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default number of texts sent to the embedder per call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

// =============================================================================
// Service configuration (TOML)
// =============================================================================

/// Top-level configuration for the Strata service.
///
/// Loaded from `~/.strata/config.toml` by default. Ingestion runs are driven
/// by a separate [`IngestConfig`] file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl StrataConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StrataConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory searched for ONNX model folders named by `embedder.model`.
    pub model_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            model_dir: "~/.strata/models".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// Where the metadata filter is applied relative to top-k truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterStrategy {
    /// Truncate to top-k first, then filter inside that window.
    #[default]
    RankThenFilter,
    /// Filter every ranked candidate, then truncate to top-k.
    FilterThenRank,
}

/// Query engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper bound on query embedding time for text searches.
    pub embed_timeout_ms: u64,
    pub filter_strategy: FilterStrategy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embed_timeout_ms: 5_000,
            filter_strategy: FilterStrategy::RankThenFilter,
        }
    }
}

// =============================================================================
// Ingestion configuration (JSON or TOML)
// =============================================================================

/// Description of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "default".to_string()
}

/// A place documents are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Files under a directory, selected by name patterns.
    File {
        #[serde(default = "default_source_path")]
        path: String,
        #[serde(default = "default_patterns")]
        patterns: Vec<String>,
        #[serde(default)]
        recursive: bool,
    },
    /// Accepted for compatibility; not crawled.
    Web {
        #[serde(default)]
        url: Option<String>,
    },
}

fn default_source_path() -> String {
    ".".to_string()
}

fn default_patterns() -> Vec<String> {
    vec!["*.txt".to_string()]
}

/// A transformation applied to each document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorConfig {
    TextSplitter {
        #[serde(default)]
        chunk_size: Option<usize>,
        #[serde(default)]
        chunk_overlap: Option<usize>,
    },
    /// No-op placeholder kept so existing configs still parse.
    MetadataExtractor {},
}

/// Embedder selection, persisted verbatim into the store index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(rename = "type", default = "default_embedder_kind")]
    pub kind: String,
    #[serde(default = "default_embedder_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Unrecognised keys, carried through to the index untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: default_embedder_kind(),
            model: default_embedder_model(),
            batch_size: DEFAULT_BATCH_SIZE,
            extra: Map::new(),
        }
    }
}

fn default_embedder_kind() -> String {
    "sentence-transformers".to_string()
}

fn default_embedder_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Resolved splitter budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl IngestConfig {
    /// Load an ingestion config. Files ending in `.toml` are parsed as TOML,
    /// everything else as JSON. The result is validated before returning.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: IngestConfig = if is_toml {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| StrataError::Config(format!("{}: {}", path.display(), e)))?
        };

        config.validate()?;
        info!(
            path = %path.display(),
            sources = config.sources.len(),
            collection = %config.collection,
            "Ingestion config loaded"
        );
        Ok(config)
    }

    /// Reject configurations that would fail part-way through a run.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(StrataError::Config(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.embedder.batch_size == 0 {
            return Err(StrataError::Config(
                "embedder.batch_size must be at least 1".to_string(),
            ));
        }
        for processor in &self.processors {
            if let ProcessorConfig::TextSplitter {
                chunk_size: Some(0),
                ..
            } = processor
            {
                return Err(StrataError::Config(
                    "text_splitter.chunk_size must be at least 1".to_string(),
                ));
            }
        }
        if self.sources.is_empty() {
            warn!("Ingestion config lists no sources");
        }
        Ok(())
    }

    /// Budgets of the first configured text splitter, if any.
    ///
    /// `None` means documents are stored whole.
    pub fn splitter(&self) -> Option<SplitterSettings> {
        self.processors.iter().find_map(|p| match p {
            ProcessorConfig::TextSplitter {
                chunk_size,
                chunk_overlap,
            } => Some(SplitterSettings {
                chunk_size: chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
                chunk_overlap: chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            }),
            ProcessorConfig::MetadataExtractor {} => None,
        })
    }
}
