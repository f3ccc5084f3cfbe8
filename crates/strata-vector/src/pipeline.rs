//! Strata ingestion pipeline.
//!
//! One sequential pass: discover source files, read and chunk each one,
//! embed the chunks in batches, and write the store. A file that cannot be
//! read is logged and skipped; a store write failure aborts the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use strata_core::config::{IngestConfig, ProcessorConfig, SourceConfig};
use strata_core::error::StrataError;
use strata_core::types::Chunk;

use crate::chunker::{chunk_document, TextSplitter};
use crate::embedding::{build_embedder, DynEmbeddingService};
use crate::source::{discover_files, read_source};
use crate::store::{StoreWriter, WriteSummary};

/// Outcome of an ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files read and chunked.
    pub files_processed: usize,
    /// Files that could not be read.
    pub files_skipped: usize,
    /// Chunks produced across all files.
    pub chunks: usize,
    /// Vector width written, if a store was written.
    pub dimensions: Option<usize>,
    /// True when placeholder vectors were written.
    pub degraded: bool,
    /// Orphaned records removed from the output directory.
    pub pruned: usize,
}

/// Runs one ingestion described by an [`IngestConfig`].
pub struct IngestPipeline {
    config: IngestConfig,
    model_dir: PathBuf,
    prune: bool,
    embedder: Option<Arc<dyn DynEmbeddingService>>,
}

impl IngestPipeline {
    /// Create a pipeline. Embedding models named by the config are looked up
    /// under `model_dir`.
    pub fn new(config: IngestConfig, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            model_dir: model_dir.into(),
            prune: false,
            embedder: None,
        }
    }

    /// Remove stale record files after writing.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Use an already-built embedder instead of loading the configured one.
    pub fn with_embedder(mut self, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Collect chunks from every configured source, in source order.
    pub fn collect_chunks(&self) -> Result<(Vec<Chunk>, usize, usize), StrataError> {
        self.config.validate()?;

        let splitter = self.config.splitter().map(TextSplitter::from);
        if self
            .config
            .processors
            .iter()
            .any(|p| matches!(p, ProcessorConfig::MetadataExtractor {}))
        {
            info!("metadata_extractor processor has no effect; base metadata is always attached");
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut chunks = Vec::new();
        let (mut processed, mut skipped) = (0usize, 0usize);

        for source in &self.config.sources {
            match source {
                SourceConfig::File {
                    path,
                    patterns,
                    recursive,
                } => {
                    for file in discover_files(Path::new(path), patterns, *recursive) {
                        if !seen.insert(file.clone()) {
                            continue;
                        }
                        match read_source(&file) {
                            Ok((doc, text)) => {
                                let produced = chunk_document(&doc, &text, splitter.as_ref());
                                debug!(path = %file.display(), chunks = produced.len(), "Processed file");
                                chunks.extend(produced);
                                processed += 1;
                            }
                            Err(e) => {
                                warn!(path = %file.display(), error = %e, "Skipping unreadable source");
                                skipped += 1;
                            }
                        }
                    }
                }
                SourceConfig::Web { url } => {
                    warn!(url = ?url, "Web sources are not supported; skipping");
                }
            }
        }

        Ok((chunks, processed, skipped))
    }

    /// Run the pipeline, writing the store into `output_dir`.
    ///
    /// When no chunks are produced nothing is written.
    pub async fn run(&self, output_dir: &Path) -> Result<IngestReport, StrataError> {
        let (chunks, files_processed, files_skipped) = self.collect_chunks()?;

        let mut report = IngestReport {
            files_processed,
            files_skipped,
            chunks: chunks.len(),
            dimensions: None,
            degraded: false,
            pruned: 0,
        };

        if chunks.is_empty() {
            info!("No documents found to process");
            return Ok(report);
        }

        let embedder = match &self.embedder {
            Some(embedder) => Some(Arc::clone(embedder)),
            None => match build_embedder(&self.config.embedder, &self.model_dir) {
                Ok(embedder) => Some(embedder),
                Err(e) => {
                    warn!(error = %e, "Could not load embedding model");
                    None
                }
            },
        };

        info!(chunks = chunks.len(), "Embedding documents");
        let summary: WriteSummary = StoreWriter::new(output_dir)
            .with_prune(self.prune)
            .write(
                &self.config.collection,
                &self.config.embedder,
                embedder.as_deref(),
                chunks,
            )
            .await?;

        report.chunks = summary.chunks;
        report.dimensions = Some(summary.dimensions);
        report.degraded = summary.degraded;
        report.pruned = summary.pruned;
        Ok(report)
    }
}
