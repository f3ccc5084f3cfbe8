//! Application state shared across all route handlers.
//!
//! AppState holds the current store snapshot, the embedder loaded at
//! startup, and the service configuration. It is passed to handlers via
//! axum's State extractor.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use strata_core::config::StrataConfig;
use strata_vector::embedding::DynEmbeddingService;
use strata_vector::index::LoadedStore;
use strata_vector::search::QueryEngine;

/// Swappable pointer to the current store.
///
/// Readers clone the inner `Arc` and release the lock before scoring, so a
/// reload never waits on an in-flight search.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<Arc<LoadedStore>>>,
}

impl StoreHandle {
    pub fn new(store: LoadedStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// The store as of now.
    pub fn snapshot(&self) -> Arc<LoadedStore> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the store; searches already running keep the old snapshot.
    pub fn replace(&self, store: LoadedStore) -> Arc<LoadedStore> {
        let fresh = Arc::new(store);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&fresh);
        fresh
    }
}

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<StrataConfig>,
    /// Directory the store is loaded from, re-read on reload.
    pub vector_dir: PathBuf,
    /// Current store snapshot.
    pub store: StoreHandle,
    /// Embedder for text queries; `None` when the model failed to load.
    pub embedder: Option<Arc<dyn DynEmbeddingService>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        config: StrataConfig,
        vector_dir: impl Into<PathBuf>,
        store: LoadedStore,
        embedder: Option<Arc<dyn DynEmbeddingService>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            vector_dir: vector_dir.into(),
            store: StoreHandle::new(store),
            embedder,
            start_time: Instant::now(),
        }
    }

    /// Query engine over the current store snapshot.
    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.store.snapshot())
            .with_embedder(self.embedder.clone())
            .with_filter_strategy(self.config.search.filter_strategy)
            .with_embed_timeout(Duration::from_millis(self.config.search.embed_timeout_ms))
    }
}
