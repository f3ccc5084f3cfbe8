//! Integration tests for the search service.
//!
//! Each test builds its own state around a small in-memory store and drives
//! the router with `oneshot`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use strata_api::create_router;
use strata_api::handlers::{HealthResponse, InfoResponse, SearchResponse};
use strata_api::state::AppState;
use strata_core::config::{EmbedderConfig, StrataConfig};
use strata_core::error::StrataError;
use strata_core::types::{Chunk, Metadata, StoreIndex};
use strata_vector::embedding::{DynEmbeddingService, EmbeddingService, PlaceholderEmbedder};
use strata_vector::index::LoadedStore;
use strata_vector::store::StoreWriter;

// =============================================================================
// Helpers
// =============================================================================

/// Maps any text mentioning "alpha" to `[1, 0]` and everything else to `[0, 1]`.
struct KeywordEmbedder;

impl EmbeddingService for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StrataError> {
        if text.contains("alpha") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn kind(&self) -> &'static str {
        "keyword"
    }
}

struct SlowEmbedder;

impl EmbeddingService for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, StrataError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn kind(&self) -> &'static str {
        "slow"
    }
}

fn chunk(id: &str, vector: Vec<f32>, extension: &str) -> Chunk {
    let mut metadata = Metadata::new();
    metadata.insert("extension".to_string(), json!(extension));
    metadata.insert("source".to_string(), json!(format!("{}{}", id, extension)));
    let mut chunk = Chunk::new(id, format!("content of {}", id), metadata);
    chunk.embedding = vector;
    chunk
}

/// Three chunks: `c1 = [1,0]` (.txt), `c2 = [0,1]` (.txt), `c3 = [0.7,0.7]` (.md).
fn sample_store() -> LoadedStore {
    let index = StoreIndex {
        collection: "sample".to_string(),
        created_at: 1_700_000_000,
        documents: vec!["c1".into(), "c2".into(), "c3".into()],
        dimensions: 2,
        embedder: EmbedderConfig::default(),
    };
    LoadedStore::from_chunks(
        index,
        vec![
            chunk("c1", vec![1.0, 0.0], ".txt"),
            chunk("c2", vec![0.0, 1.0], ".txt"),
            chunk("c3", vec![0.7, 0.7], ".md"),
        ],
    )
    .unwrap()
}

fn make_state_with(
    config: StrataConfig,
    vector_dir: &Path,
    embedder: Option<Arc<dyn DynEmbeddingService>>,
) -> AppState {
    AppState::new(config, vector_dir, sample_store(), embedder)
}

fn make_state() -> AppState {
    make_state_with(
        StrataConfig::default(),
        Path::new("/nonexistent/store"),
        Some(Arc::new(KeywordEmbedder)),
    )
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn ids(results: &SearchResponse) -> Vec<&str> {
    results.results.iter().map(|r| r.id.as_str()).collect()
}

// =============================================================================
// Health and info
// =============================================================================

#[tokio::test]
async fn test_health_reports_ready_embedder() {
    let resp = make_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.embedder, "ready");
}

#[tokio::test]
async fn test_health_reports_unavailable_embedder() {
    let state = make_state_with(StrataConfig::default(), Path::new("/nonexistent"), None);
    let resp = create_router(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.embedder, "unavailable");
}

#[tokio::test]
async fn test_info() {
    let resp = make_app().oneshot(get("/info")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let info: InfoResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(info.collection, "sample");
    assert_eq!(info.count, 3);
    assert_eq!(info.dimensions, 2);
    assert_eq!(info.created_at, 1_700_000_000);
    assert_eq!(info.embedder.model, "all-MiniLM-L6-v2");
}

// =============================================================================
// Vector search
// =============================================================================

#[tokio::test]
async fn test_vector_search_ranking() {
    let resp = make_app()
        .oneshot(post_json(
            "/search-by-vector",
            json!({"vector": [1.0, 0.0], "top_k": 2}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results: SearchResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(ids(&results), vec!["c1", "c3"]);
    assert!((results.results[0].score - 1.0).abs() < 1e-6);
    assert!((results.results[1].score - 0.7).abs() < 1e-6);
    assert_eq!(results.results[0].metadata["extension"], ".txt");
    assert_eq!(results.results[0].content, "content of c1");
}

#[tokio::test]
async fn test_vector_search_default_top_k() {
    let resp = make_app()
        .oneshot(post_json("/search-by-vector", json!({"vector": [0.0, 1.0]})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results: SearchResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(ids(&results), vec!["c2", "c3", "c1"]);
}

#[tokio::test]
async fn test_vector_search_filter_inside_window() {
    let resp = make_app()
        .oneshot(post_json(
            "/search-by-vector",
            json!({
                "vector": [1.0, 0.2],
                "top_k": 3,
                "filter": {"metadata.extension": ".txt"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results: SearchResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(ids(&results), vec!["c1", "c2"]);
}

#[tokio::test]
async fn test_vector_search_top_k_zero() {
    let resp = make_app()
        .oneshot(post_json(
            "/search-by-vector",
            json!({"vector": [1.0, 0.0], "top_k": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results: SearchResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(results.results.is_empty());
}

#[tokio::test]
async fn test_vector_search_dimension_mismatch() {
    let resp = make_app()
        .oneshot(post_json(
            "/search-by-vector",
            json!({"vector": [1.0, 0.0, 0.0]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = body_json(resp).await;
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["details"]["expected"], 2);
    assert_eq!(body["details"]["actual"], 3);
}

#[tokio::test]
async fn test_vector_search_zero_vector() {
    let resp = make_app()
        .oneshot(post_json("/search-by-vector", json!({"vector": [0.0, 0.0]})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_filter_key() {
    let resp = make_app()
        .oneshot(post_json(
            "/search-by-vector",
            json!({"vector": [1.0, 0.0], "filter": {"metadata.": "x"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let resp = make_app()
        .oneshot(post_json("/search-by-vector", json!({"vector": "nope"})))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

// =============================================================================
// Text search
// =============================================================================

#[tokio::test]
async fn test_text_search() {
    let resp = make_app()
        .oneshot(post_json("/search", json!({"query": "alpha", "top_k": 1})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results: SearchResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(ids(&results), vec!["c1"]);
}

#[tokio::test]
async fn test_text_search_with_filter() {
    let resp = make_app()
        .oneshot(post_json(
            "/search",
            json!({"query": "beta", "top_k": 3, "filter": {"id": "c3"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results: SearchResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(ids(&results), vec!["c3"]);
}

#[tokio::test]
async fn test_text_search_without_embedder() {
    let state = make_state_with(StrataConfig::default(), Path::new("/nonexistent"), None);
    let resp = create_router(state)
        .oneshot(post_json("/search", json!({"query": "alpha"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(resp).await;
    assert_eq!(body["message"], "Embedding model not available");
}

#[tokio::test]
async fn test_text_search_blank_query() {
    let resp = make_app()
        .oneshot(post_json("/search", json!({"query": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_search_timeout() {
    let mut config = StrataConfig::default();
    config.search.embed_timeout_ms = 20;
    let state = make_state_with(config, Path::new("/nonexistent"), Some(Arc::new(SlowEmbedder)));
    let resp = create_router(state)
        .oneshot(post_json("/search", json!({"query": "alpha"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
}

// =============================================================================
// Reload
// =============================================================================

#[tokio::test]
async fn test_reload_swaps_store() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = PlaceholderEmbedder::with_dimensions(4);
    let chunks = (0..5)
        .map(|i| Chunk::new(format!("doc-{}", i), format!("text {}", i), Metadata::new()))
        .collect();
    StoreWriter::new(dir.path())
        .write("reloaded", &EmbedderConfig::default(), Some(&embedder), chunks)
        .await
        .unwrap();

    let state = make_state_with(StrataConfig::default(), dir.path(), None);
    let app = create_router(state.clone());

    let resp = app.clone().oneshot(post_empty("/reload")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info: InfoResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(info.collection, "reloaded");
    assert_eq!(info.count, 5);
    assert_eq!(info.dimensions, 4);

    let resp = app.oneshot(get("/info")).await.unwrap();
    let info: InfoResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(info.collection, "reloaded");
    assert_eq!(state.store.snapshot().len(), 5);
}

#[tokio::test]
async fn test_failed_reload_keeps_current_store() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state_with(StrataConfig::default(), dir.path(), None);
    let app = create_router(state);

    let resp = app.clone().oneshot(post_empty("/reload")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "not_found");

    let resp = app.oneshot(get("/info")).await.unwrap();
    let info: InfoResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(info.collection, "sample");
    assert_eq!(info.count, 3);
}

#[tokio::test]
async fn test_unknown_route() {
    let resp = make_app().oneshot(get("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
