//! On-disk vector store layout.
//!
//! A store is a directory holding one `<chunk id>.json` per chunk plus an
//! `index.json` manifest listing the chunk ids in order. Records are written
//! first and the manifest last, through a temporary file and a rename, so a
//! reader never sees a manifest naming records that were not yet written.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use strata_core::config::EmbedderConfig;
use strata_core::error::StrataError;
use strata_core::types::{Chunk, StoreIndex};

use crate::embedding::{warn_degraded, DynEmbeddingService, PlaceholderEmbedder};
use crate::index::LoadedStore;

/// File name of the store manifest.
pub const INDEX_FILE: &str = "index.json";

const INDEX_TMP_FILE: &str = "index.json.tmp";

/// Outcome of a store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Records written.
    pub chunks: usize,
    /// Vector width recorded in the manifest.
    pub dimensions: usize,
    /// True when placeholder vectors were used.
    pub degraded: bool,
    /// Orphaned records removed.
    pub pruned: usize,
}

/// Chunk ids double as file names, so only a conservative alphabet is allowed.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id != "index"
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn record_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.json", id))
}

/// Fill in `chunk.embedding` for every chunk.
///
/// Texts go to the embedder `batch_size` at a time. If there is no embedder,
/// or any batch fails or returns vectors of the wrong shape, every chunk gets
/// a placeholder vector instead so the store never mixes vector spaces.
/// Returns `(dimensions, degraded)`.
pub async fn attach_embeddings(
    chunks: &mut [Chunk],
    embedder: Option<&dyn DynEmbeddingService>,
    batch_size: usize,
) -> (usize, bool) {
    let Some(embedder) = embedder else {
        return fill_placeholders(chunks, "no embedder configured");
    };

    let dims = embedder.dimensions();
    let batch_size = batch_size.max(1);
    let mut failure = None;
    for (batch_no, batch) in chunks.chunks_mut(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = match embedder.embed_batch_boxed(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                failure = Some(format!("batch {} failed: {}", batch_no, e));
                break;
            }
        };
        if vectors.len() != batch.len() || vectors.iter().any(|v| v.len() != dims) {
            failure = Some(format!("batch {} returned malformed vectors", batch_no));
            break;
        }
        for (chunk, vector) in batch.iter_mut().zip(vectors) {
            chunk.embedding = vector;
        }
        debug!(batch = batch_no, size = texts.len(), "Embedded batch");
    }

    if let Some(reason) = failure {
        return fill_placeholders(chunks, &reason);
    }
    (dims, false)
}

fn fill_placeholders(chunks: &mut [Chunk], reason: &str) -> (usize, bool) {
    warn_degraded(reason, chunks.len());
    let placeholder = PlaceholderEmbedder::new();
    for chunk in chunks.iter_mut() {
        chunk.embedding = placeholder.vector_for(&chunk.content);
    }
    (crate::embedding::DEFAULT_DIMENSIONS, true)
}

/// Writes embedded chunks into a store directory.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    dir: PathBuf,
    prune: bool,
}

impl StoreWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prune: false,
        }
    }

    /// Delete record files the new manifest no longer names.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Embed `chunks` and persist them with a fresh manifest.
    ///
    /// A record that cannot be written aborts the write before the manifest
    /// is replaced, leaving any previous manifest in place.
    pub async fn write(
        &self,
        collection: &str,
        embedder_config: &EmbedderConfig,
        embedder: Option<&dyn DynEmbeddingService>,
        chunks: Vec<Chunk>,
    ) -> Result<WriteSummary, StrataError> {
        fs::create_dir_all(&self.dir)?;

        let mut seen = HashSet::new();
        let mut chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| {
                if !is_safe_id(&c.id) {
                    warn!(id = %c.id, "Skipping chunk with unsafe id");
                    return false;
                }
                if !seen.insert(c.id.clone()) {
                    warn!(id = %c.id, "Skipping duplicate chunk id");
                    return false;
                }
                true
            })
            .collect();

        let (dimensions, degraded) =
            attach_embeddings(&mut chunks, embedder, embedder_config.batch_size).await;

        for chunk in &chunks {
            let path = record_path(&self.dir, &chunk.id);
            let json = serde_json::to_string_pretty(chunk)?;
            fs::write(&path, json).map_err(|e| {
                StrataError::Storage(format!("write {}: {}", path.display(), e))
            })?;
        }

        let index = StoreIndex {
            collection: collection.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            documents: chunks.iter().map(|c| c.id.clone()).collect(),
            dimensions,
            embedder: embedder_config.clone(),
        };
        let tmp = self.dir.join(INDEX_TMP_FILE);
        fs::write(&tmp, serde_json::to_string_pretty(&index)?)?;
        fs::rename(&tmp, self.dir.join(INDEX_FILE))?;

        let pruned = if self.prune {
            self.prune_orphans(&seen)?
        } else {
            0
        };

        info!(
            dir = %self.dir.display(),
            collection,
            chunks = chunks.len(),
            dimensions,
            degraded,
            pruned,
            "Vector store written"
        );

        Ok(WriteSummary {
            chunks: chunks.len(),
            dimensions,
            degraded,
            pruned,
        })
    }

    fn prune_orphans(&self, keep: &HashSet<String>) -> Result<usize, StrataError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == "index" || keep.contains(stem) {
                continue;
            }
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "Pruned orphaned record");
            removed += 1;
        }
        Ok(removed)
    }
}

/// Load a store directory into memory.
///
/// A missing manifest is [`StrataError::StoreNotFound`]. Records that are
/// missing, unreadable, or the wrong width are skipped with a warning. When
/// the manifest declares zero dimensions the first loaded record sets the
/// width.
pub fn load_store(dir: &Path) -> Result<LoadedStore, StrataError> {
    let index_path = dir.join(INDEX_FILE);
    if !index_path.is_file() {
        return Err(StrataError::StoreNotFound(format!(
            "no {} in {}",
            INDEX_FILE,
            dir.display()
        )));
    }

    let index: StoreIndex = serde_json::from_str(&fs::read_to_string(&index_path)?)?;

    let mut expected = (index.dimensions > 0).then_some(index.dimensions);
    let mut chunks = Vec::with_capacity(index.documents.len());
    let mut skipped = 0usize;

    for id in &index.documents {
        if !is_safe_id(id) {
            warn!(id = %id, "Skipping record with unsafe id");
            skipped += 1;
            continue;
        }
        let path = record_path(dir, id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping missing record");
                skipped += 1;
                continue;
            }
        };
        let chunk: Chunk = match serde_json::from_str(&raw) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unparsable record");
                skipped += 1;
                continue;
            }
        };
        if chunk.embedding.iter().any(|v| !v.is_finite()) {
            warn!(id = %id, "Skipping record with non-finite embedding");
            skipped += 1;
            continue;
        }
        let width = chunk.embedding.len();
        match expected {
            _ if width == 0 => {
                warn!(id = %id, "Skipping record without embedding");
                skipped += 1;
                continue;
            }
            Some(d) if d != width => {
                warn!(id = %id, expected = d, actual = width, "Skipping record with wrong dimensions");
                skipped += 1;
                continue;
            }
            Some(_) => {}
            None => expected = Some(width),
        }
        chunks.push(chunk);
    }

    let store = if chunks.is_empty() {
        let mut index = index;
        index.dimensions = expected.unwrap_or(0);
        LoadedStore::empty(index)
    } else {
        LoadedStore::from_chunks(index, chunks)?
    };

    info!(
        dir = %dir.display(),
        collection = %store.index().collection,
        chunks = store.len(),
        dimensions = store.dimensions(),
        skipped,
        "Vector store loaded"
    );

    Ok(store)
}
