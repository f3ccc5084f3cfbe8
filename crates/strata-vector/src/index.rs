//! In-memory vector store: chunk records plus an `n × d` embedding matrix.
//!
//! Scoring is a brute-force dot product of every stored row against the
//! query. O(n·d) per search, which is fine for the moderate collections this
//! store targets.

use ndarray::{Array1, Array2, ArrayView1};

use strata_core::error::StrataError;
use strata_core::types::{Chunk, StoreIndex, StoredChunk};

/// An immutable, fully loaded store.
///
/// Row `i` of `vectors` is the embedding of `chunks[i]`. A loaded store is
/// never mutated; a reload builds a new one and swaps it in.
#[derive(Debug, Clone)]
pub struct LoadedStore {
    index: StoreIndex,
    chunks: Vec<StoredChunk>,
    vectors: Array2<f32>,
}

impl LoadedStore {
    /// Assemble a store from records and a matching matrix.
    pub fn new(
        index: StoreIndex,
        chunks: Vec<StoredChunk>,
        vectors: Array2<f32>,
    ) -> Result<Self, StrataError> {
        if vectors.nrows() != chunks.len() {
            return Err(StrataError::Storage(format!(
                "{} chunks but {} vector rows",
                chunks.len(),
                vectors.nrows()
            )));
        }
        Ok(Self {
            index,
            chunks,
            vectors,
        })
    }

    /// Build a store from embedded chunks. Every chunk must carry a vector of
    /// the same length.
    pub fn from_chunks(index: StoreIndex, chunks: Vec<Chunk>) -> Result<Self, StrataError> {
        let dims = chunks
            .first()
            .map(|c| c.embedding.len())
            .unwrap_or(index.dimensions);

        let mut records = Vec::with_capacity(chunks.len());
        let mut flat = Vec::with_capacity(chunks.len() * dims);
        for chunk in chunks {
            if chunk.embedding.len() != dims {
                return Err(StrataError::DimensionMismatch {
                    expected: dims,
                    actual: chunk.embedding.len(),
                });
            }
            let (record, embedding) = chunk.into_parts();
            flat.extend(embedding);
            records.push(record);
        }

        let vectors = Array2::from_shape_vec((records.len(), dims), flat)
            .map_err(|e| StrataError::Storage(format!("vector matrix: {}", e)))?;
        Self::new(index, records, vectors)
    }

    /// A store with no chunks.
    pub fn empty(index: StoreIndex) -> Self {
        let dims = index.dimensions;
        Self {
            index,
            chunks: Vec::new(),
            vectors: Array2::zeros((0, dims)),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Width of the vector matrix.
    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn index(&self) -> &StoreIndex {
        &self.index
    }

    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    /// Dot product of every stored vector with `query`, in store order.
    ///
    /// The caller guarantees `query.len() == self.dimensions()`.
    pub fn scores(&self, query: &[f32]) -> Array1<f32> {
        self.vectors.dot(&ArrayView1::from(query))
    }
}
