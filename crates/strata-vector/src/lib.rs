//! Strata vector crate - chunking, embedding, the on-disk store, and search.
//!
//! Provides a line-based text splitter, an embedding service trait with an
//! ONNX backend and a placeholder fallback, the store writer and loader, a
//! brute-force query engine with exact-match filters, and the ingestion
//! pipeline that ties them together.

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod search;
pub mod source;
pub mod store;

pub use chunker::{chunk_document, ChunkSpan, TextSplitter};
pub use embedding::{
    build_embedder, DynEmbeddingService, EmbeddingService, OnnxEmbeddingService,
    PlaceholderEmbedder,
};
pub use index::LoadedStore;
pub use pipeline::{IngestPipeline, IngestReport};
pub use search::{FilterClause, FilterScope, QueryEngine, SearchFilter, SearchHit};
pub use store::{load_store, StoreWriter, WriteSummary, INDEX_FILE};
