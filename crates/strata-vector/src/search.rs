//! Query engine: brute-force ranking of a loaded store plus exact-match
//! filtering.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use strata_core::config::FilterStrategy;
use strata_core::error::StrataError;
use strata_core::types::{Metadata, StoredChunk};

use crate::embedding::DynEmbeddingService;
use crate::index::LoadedStore;

const METADATA_PREFIX: &str = "metadata.";

/// Default text-embedding deadline.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Descending score order with NaN after every number.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if a == b => Ordering::Equal,
        (false, false) => b.total_cmp(&a),
    }
}

/// A single ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// Dot product of the normalised query with the stored vector.
    pub score: f32,
}

/// Where a filter clause looks for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    /// A key inside the chunk's metadata map.
    Metadata,
    /// A top-level chunk field (`id`, `content`, `metadata`).
    Field,
}

/// One exact-match condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub scope: FilterScope,
    pub key: String,
    pub value: Value,
}

impl FilterClause {
    fn matches(&self, chunk: &StoredChunk) -> bool {
        match self.scope {
            FilterScope::Metadata => chunk
                .metadata
                .get(&self.key)
                .is_some_and(|actual| json_eq(actual, &self.value)),
            FilterScope::Field => chunk
                .field(&self.key)
                .is_some_and(|actual| json_eq(&actual, &self.value)),
        }
    }
}

/// A conjunction of exact-match clauses, parsed once from a request mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter(pub Vec<FilterClause>);

impl SearchFilter {
    /// Parse `{"metadata.<key>": value, "<field>": value, ...}`.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, StrataError> {
        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.strip_prefix(METADATA_PREFIX) {
                Some("") => {
                    return Err(StrataError::InvalidQuery(format!(
                        "filter key '{}' names no metadata field",
                        key
                    )))
                }
                Some(meta_key) => FilterClause {
                    scope: FilterScope::Metadata,
                    key: meta_key.to_string(),
                    value: value.clone(),
                },
                None => FilterClause {
                    scope: FilterScope::Field,
                    key: key.clone(),
                    value: value.clone(),
                },
            };
            clauses.push(clause);
        }
        Ok(Self(clauses))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every clause matches.
    pub fn matches(&self, chunk: &StoredChunk) -> bool {
        self.0.iter().all(|clause| clause.matches(chunk))
    }
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Searches one store snapshot.
///
/// Construction is cheap (two `Arc` clones), so the service builds one per
/// request from whatever store is current.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<LoadedStore>,
    embedder: Option<Arc<dyn DynEmbeddingService>>,
    filter_strategy: FilterStrategy,
    embed_timeout: Duration,
}

impl QueryEngine {
    pub fn new(store: Arc<LoadedStore>) -> Self {
        Self {
            store,
            embedder: None,
            filter_strategy: FilterStrategy::default(),
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    pub fn with_embedder(mut self, embedder: Option<Arc<dyn DynEmbeddingService>>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_filter_strategy(mut self, strategy: FilterStrategy) -> Self {
        self.filter_strategy = strategy;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn store(&self) -> &LoadedStore {
        &self.store
    }

    /// Rank stored chunks against `query`.
    ///
    /// Only the query is normalised; stored vectors are taken as they are, so
    /// scores equal cosine similarity only when the stored vectors are unit
    /// length. Under [`FilterStrategy::RankThenFilter`] the filter narrows the
    /// top-`top_k` window and may return fewer than `top_k` hits.
    pub fn search_by_vector(
        &self,
        query: &[f32],
        top_k: i64,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, StrataError> {
        if top_k <= 0 || self.store.is_empty() {
            return Ok(Vec::new());
        }

        let expected = self.store.dimensions();
        if query.len() != expected {
            return Err(StrataError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        // Accumulated in f64 so large finite components do not overflow.
        let norm = query
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(StrataError::InvalidQuery(
                "query vector must have a finite, non-zero norm".to_string(),
            ));
        }
        let normalized: Vec<f32> = query
            .iter()
            .map(|&v| (f64::from(v) / norm) as f32)
            .collect();

        let scores = self.store.scores(&normalized);
        let mut ranked: Vec<usize> = (0..scores.len())
            .filter(|&i| !scores[i].is_nan())
            .collect();
        // sort_by is stable: equal scores keep store order.
        ranked.sort_by(|&a, &b| descending(scores[a], scores[b]));

        let top_k = usize::try_from(top_k).unwrap_or(usize::MAX);
        let chunks = self.store.chunks();
        let keep = |i: &usize| filter.is_none_or(|f| f.matches(&chunks[*i]));

        let selected: Vec<usize> = match self.filter_strategy {
            FilterStrategy::RankThenFilter => ranked.into_iter().take(top_k).filter(keep).collect(),
            FilterStrategy::FilterThenRank => ranked.into_iter().filter(keep).take(top_k).collect(),
        };

        debug!(
            candidates = chunks.len(),
            returned = selected.len(),
            strategy = ?self.filter_strategy,
            "Vector search complete"
        );

        Ok(selected
            .into_iter()
            .map(|i| {
                let chunk = &chunks[i];
                SearchHit {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    score: scores[i],
                }
            })
            .collect())
    }

    /// Embed `query` and rank the store against it.
    pub async fn search_by_text(
        &self,
        query: &str,
        top_k: i64,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, StrataError> {
        if query.trim().is_empty() {
            return Err(StrataError::InvalidQuery("query text is empty".to_string()));
        }
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            StrataError::EmbedderUnavailable("no embedding model loaded".to_string())
        })?;

        let vector = tokio::time::timeout(self.embed_timeout, embedder.embed_boxed(query))
            .await
            .map_err(|_| StrataError::EmbedderTimeout {
                timeout_ms: self.embed_timeout.as_millis() as u64,
            })??;

        self.search_by_vector(&vector, top_k, filter)
    }
}
