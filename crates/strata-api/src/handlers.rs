//! Route handlers for the search service.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use strata_core::config::EmbedderConfig;
use strata_vector::index::LoadedStore;
use strata_vector::search::{SearchFilter, SearchHit};
use strata_vector::store::load_store;

use crate::error::ApiError;
use crate::state::AppState;

fn default_top_k() -> i64 {
    5
}

// =============================================================================
// Request / response types
// =============================================================================

/// Request body for POST /search.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
}

/// Request body for POST /search-by-vector.
#[derive(Debug, Deserialize)]
pub struct VectorSearchRequest {
    pub vector: Vec<f32>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
}

/// Response for both search endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Response for GET /info and POST /reload.
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub collection: String,
    pub count: usize,
    pub dimensions: usize,
    pub embedder: EmbedderConfig,
    pub created_at: i64,
}

impl From<&LoadedStore> for InfoResponse {
    fn from(store: &LoadedStore) -> Self {
        let index = store.index();
        Self {
            collection: index.collection.clone(),
            count: store.len(),
            dimensions: store.dimensions(),
            embedder: index.embedder.clone(),
            created_at: index.created_at,
        }
    }
}

/// Response for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// "ready" or "unavailable".
    pub embedder: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn parse_filter(filter: Option<&Map<String, Value>>) -> Result<Option<SearchFilter>, ApiError> {
    filter
        .filter(|map| !map.is_empty())
        .map(SearchFilter::from_map)
        .transpose()
        .map_err(ApiError::from)
}

// =============================================================================
// Search
// =============================================================================

/// POST /search - embed the query text and rank the store against it.
pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let filter = parse_filter(body.filter.as_ref())?;
    let results = state
        .engine()
        .search_by_text(&body.query, body.top_k, filter.as_ref())
        .await?;

    info!(top_k = body.top_k, results = results.len(), "Text search");
    Ok(Json(SearchResponse { results }))
}

/// POST /search-by-vector - rank the store against a caller-supplied vector.
pub async fn search_by_vector(
    State(state): State<AppState>,
    Json(body): Json<VectorSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let filter = parse_filter(body.filter.as_ref())?;
    let results = state
        .engine()
        .search_by_vector(&body.vector, body.top_k, filter.as_ref())?;

    info!(top_k = body.top_k, results = results.len(), "Vector search");
    Ok(Json(SearchResponse { results }))
}

// =============================================================================
// Store info and reload
// =============================================================================

/// GET /info - describe the loaded store.
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let store = state.store.snapshot();
    Json(InfoResponse::from(store.as_ref()))
}

/// POST /reload - re-read the store directory and swap it in.
///
/// On failure the current store stays in place.
pub async fn reload(State(state): State<AppState>) -> Result<Json<InfoResponse>, ApiError> {
    let dir = state.vector_dir.clone();
    let loaded = tokio::task::spawn_blocking(move || load_store(&dir))
        .await
        .map_err(|e| ApiError::Internal(format!("Reload task failed: {}", e)))?;

    let store = match loaded {
        Ok(store) => store,
        Err(e) => {
            warn!(dir = %state.vector_dir.display(), error = %e, "Reload failed; keeping current store");
            return Err(e.into());
        }
    };

    let fresh = state.store.replace(store);
    info!(count = fresh.len(), dimensions = fresh.dimensions(), "Store reloaded");
    Ok(Json(InfoResponse::from(fresh.as_ref())))
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness plus embedder readiness.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let embedder = if state.embedder.is_some() {
        "ready"
    } else {
        "unavailable"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        embedder: embedder.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
