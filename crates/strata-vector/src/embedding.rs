//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` loads a sentence-transformer ONNX model (e.g.
//!   all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace tokenizers
//!   crate. This is the production backend.
//! - `PlaceholderEmbedder` produces pseudo-random vectors so ingestion can run
//!   without a model. Scores computed against these vectors are meaningless.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tokenizers::Tokenizer;
use tracing::{info, warn};

use strata_core::config::EmbedderConfig;
use strata_core::error::StrataError;

/// Dimension used by the placeholder embedder and as the fallback when a
/// model does not declare its output width.
pub const DEFAULT_DIMENSIONS: usize = 384;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Service for generating text embeddings.
///
/// Implementations must be deterministic for identical input and must return
/// vectors of length [`dimensions`](EmbeddingService::dimensions).
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, StrataError>> + Send;

    /// Generate embeddings for several texts, in input order.
    ///
    /// The default implementation calls [`embed`](EmbeddingService::embed)
    /// sequentially.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, StrataError>> + Send {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Short backend name used in logs and health output.
    fn kind(&self) -> &'static str;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService` returns `impl Future` and so cannot be boxed. This
/// trait uses boxed futures instead; every `EmbeddingService` gets it through
/// the blanket implementation below.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, StrataError>>;

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, StrataError>>;

    fn dimensions(&self) -> usize;

    fn kind(&self) -> &'static str;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, StrataError>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, StrataError>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn kind(&self) -> &'static str {
        EmbeddingService::kind(self)
    }
}

/// Select and load the embedder named by `config`.
///
/// `sentence-transformers` and `onnx` load an ONNX export from the directory
/// `config.model`, or `model_dir/<model>` when that path is not a directory.
/// Any other type, or a model that fails to load, yields
/// [`StrataError::EmbedderUnavailable`].
pub fn build_embedder(
    config: &EmbedderConfig,
    model_dir: &Path,
) -> Result<Arc<dyn DynEmbeddingService>, StrataError> {
    match config.kind.as_str() {
        "sentence-transformers" | "onnx" => {
            let direct = Path::new(&config.model);
            let dir = if direct.is_dir() {
                direct.to_path_buf()
            } else {
                model_dir.join(&config.model)
            };
            let service = OnnxEmbeddingService::from_directory(&dir)?;
            Ok(Arc::new(service))
        }
        other => Err(StrataError::EmbedderUnavailable(format!(
            "unsupported embedder type '{}'",
            other
        ))),
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// Expects a model directory containing:
/// - `model.onnx`: the sentence-transformer ONNX export
/// - `tokenizer.json`: the HuggingFace fast-tokenizer file
///
/// Token embeddings are mean-pooled under the attention mask and
/// L2-normalized, so stored vectors are unit length.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

// ort::Session is internally reference counted and safe to share; access is
// serialized through the Mutex regardless.
unsafe impl Send for OnnxEmbeddingService {}
unsafe impl Sync for OnnxEmbeddingService {}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> StrataError {
    StrataError::EmbedderUnavailable(format!("{}: {}", context, err))
}

impl OnnxEmbeddingService {
    /// Load a sentence-transformer model from the given directory.
    pub fn from_directory(model_dir: &Path) -> Result<Self, StrataError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, StrataError> {
        if !model_path.exists() {
            return Err(StrataError::EmbedderUnavailable(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(StrataError::EmbedderUnavailable(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| unavailable("ONNX session builder", e))?
            .with_intra_threads(1)
            .map_err(|e| unavailable("ONNX set threads", e))?
            .commit_from_file(model_path)
            .map_err(|e| unavailable("ONNX load model", e))?;

        // Output is [batch, seq_len, hidden_dim]; a dynamic hidden dim reads as -1.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { DEFAULT_DIMENSIONS })
            .unwrap_or(DEFAULT_DIMENSIONS);

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| unavailable("load tokenizer", e))?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    fn shallow_clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            tokenizer: Arc::clone(&self.tokenizer),
            dimensions: self.dimensions,
        }
    }

    /// Tokenize, run inference, and mean-pool the output.
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, StrataError> {
        if text.is_empty() {
            return Err(StrataError::InvalidQuery("cannot embed empty text".to_string()));
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| unavailable("tokenization", e))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| unavailable("input_ids array", e))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| unavailable("attention_mask array", e))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| unavailable("token_type_ids array", e))?;

        let ids_ref =
            TensorRef::from_array_view(&ids_array).map_err(|e| unavailable("input_ids", e))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| unavailable("attention_mask", e))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| unavailable("token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| unavailable("session lock poisoned", e))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| unavailable("ONNX inference", e))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("extract embeddings", e))?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        let hidden_dim = match shape_dims.as_slice() {
            [_, .., last] => *last as usize,
            _ => {
                return Err(StrataError::EmbedderUnavailable(format!(
                    "unexpected output shape: {:?}",
                    shape_dims
                )))
            }
        };

        let mut pooled = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;
        for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
            if mask_val > 0 {
                let offset = tok_idx * hidden_dim;
                for (dim, slot) in pooled.iter_mut().enumerate() {
                    *slot += data[offset + dim];
                }
                count += 1.0;
            }
        }
        if count > 0.0 {
            for val in &mut pooled {
                *val /= count;
            }
        }

        let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut pooled {
                *val /= norm;
            }
        }

        Ok(pooled)
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StrataError> {
        // Inference is CPU-bound; run it on a blocking thread.
        let svc = self.shallow_clone();
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || svc.embed_sync(&text_owned))
            .await
            .map_err(|e| unavailable("embedding task panicked", e))?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StrataError> {
        let svc = self.shallow_clone();
        let texts_owned = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            texts_owned
                .iter()
                .map(|text| svc.embed_sync(text))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| unavailable("embedding task panicked", e))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

// ---------------------------------------------------------------------------
// PlaceholderEmbedder - degraded-mode vectors
// ---------------------------------------------------------------------------

/// Degraded-mode embedder producing pseudo-random vectors in `[0, 1)`.
///
/// Each vector is drawn from an RNG seeded with a hash of the text, so the
/// same text always maps to the same vector. The vectors carry no meaning;
/// they only keep an ingestion pipeline runnable without a model.
#[derive(Debug, Clone)]
pub struct PlaceholderEmbedder {
    dimensions: usize,
}

impl Default for PlaceholderEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderEmbedder {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Vector for `text`, synchronously.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));
        (0..self.dimensions).map(|_| rng.random::<f32>()).collect()
    }
}

impl EmbeddingService for PlaceholderEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StrataError> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn kind(&self) -> &'static str {
        "placeholder"
    }
}

/// Log that placeholder vectors are being used.
pub(crate) fn warn_degraded(reason: &str, chunks: usize) {
    warn!(
        reason,
        chunks,
        dimensions = DEFAULT_DIMENSIONS,
        "Embedder unavailable; assigning placeholder vectors (search scores will be meaningless)"
    );
}
