use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::EmbedderConfig;

/// Chunk metadata: string keys mapped to scalar JSON values.
pub type Metadata = BTreeMap<String, Value>;

// =============================================================================
// Sources
// =============================================================================

/// An input file, described at the moment it was read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Path as discovered (not canonicalized).
    pub path: String,
    /// File name component, e.g. `notes.txt`.
    pub file_name: String,
    /// Extension with its leading dot, or empty.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time in seconds since the Unix epoch.
    pub created: f64,
    /// Modification time in seconds since the Unix epoch.
    pub modified: f64,
}

impl DocumentSource {
    /// Build a source description from a path and its filesystem timestamps.
    pub fn new(path: &Path, size: u64, created: f64, modified: f64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            path: path.to_string_lossy().to_string(),
            file_name,
            extension,
            size,
            created,
            modified,
        }
    }

    /// Stable identifier for this source: hex SHA-256 of its path.
    pub fn document_hash(&self) -> String {
        hex::encode(Sha256::digest(self.path.as_bytes()))
    }

    /// Base metadata attached to every chunk cut from this source.
    pub fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), Value::from(self.file_name.clone()));
        meta.insert("path".to_string(), Value::from(self.path.clone()));
        meta.insert("extension".to_string(), Value::from(self.extension.clone()));
        meta.insert("size".to_string(), Value::from(self.size));
        meta.insert("created".to_string(), Value::from(self.created));
        meta.insert("modified".to_string(), Value::from(self.modified));
        meta
    }
}

/// Chunk id for a document hash: the bare hash for an unsplit document,
/// `<hash>-<index>` otherwise.
pub fn chunk_id(document_hash: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}-{}", document_hash, i),
        None => document_hash.to_string(),
    }
}

// =============================================================================
// Chunks
// =============================================================================

/// The atomic retrievable unit, exactly as persisted in `<id>.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Empty until an embedder has run.
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            embedding: Vec::new(),
        }
    }

    /// Split into the searchable record and its vector.
    pub fn into_parts(self) -> (StoredChunk, Vec<f32>) {
        (
            StoredChunk {
                id: self.id,
                content: self.content,
                metadata: self.metadata,
            },
            self.embedding,
        )
    }
}

/// A chunk held by a loaded store; its vector lives in the store matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl StoredChunk {
    /// Look up a top-level field by name, as a JSON value.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id.clone())),
            "content" => Some(Value::from(self.content.clone())),
            "metadata" => Some(Value::Object(
                self.metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            _ => None,
        }
    }
}

// =============================================================================
// Index
// =============================================================================

/// The store manifest persisted as `index.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreIndex {
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
    /// Chunk ids in store order.
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub dimensions: usize,
    #[serde(default)]
    pub embedder: EmbedderConfig,
}

fn default_collection() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> DocumentSource {
        DocumentSource::new(Path::new("/data/docs/notes.txt"), 42, 1.5, 2.5)
    }

    #[test]
    fn test_source_fields() {
        let src = sample_source();
        assert_eq!(src.file_name, "notes.txt");
        assert_eq!(src.extension, ".txt");
        assert_eq!(src.path, "/data/docs/notes.txt");
    }

    #[test]
    fn test_source_without_extension() {
        let src = DocumentSource::new(Path::new("/data/README"), 1, 0.0, 0.0);
        assert_eq!(src.extension, "");
    }

    #[test]
    fn test_document_hash_is_deterministic() {
        let a = sample_source();
        let b = sample_source();
        assert_eq!(a.document_hash(), b.document_hash());
        assert_eq!(a.document_hash().len(), 64);

        let other = DocumentSource::new(Path::new("/data/docs/other.txt"), 42, 1.5, 2.5);
        assert_ne!(a.document_hash(), other.document_hash());
    }

    #[test]
    fn test_source_metadata_keys() {
        let meta = sample_source().metadata();
        assert_eq!(meta["source"], "notes.txt");
        assert_eq!(meta["extension"], ".txt");
        assert_eq!(meta["size"], 42);
        assert_eq!(meta["modified"], 2.5);
        assert!(!meta.contains_key("chunk_index"));
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("abc", None), "abc");
        assert_eq!(chunk_id("abc", Some(0)), "abc-0");
        assert_eq!(chunk_id("abc", Some(12)), "abc-12");
    }

    #[test]
    fn test_chunk_serialization_shape() {
        let mut chunk = Chunk::new("x-0", "hello", sample_source().metadata());
        chunk.embedding = vec![0.5, 0.25];
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["id"], "x-0");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["metadata"]["source"], "notes.txt");
        assert_eq!(json["embedding"], serde_json::json!([0.5, 0.25]));
    }

    #[test]
    fn test_chunk_into_parts() {
        let mut chunk = Chunk::new("x", "body", Metadata::new());
        chunk.embedding = vec![1.0, 0.0];
        let (stored, vector) = chunk.into_parts();
        assert_eq!(stored.id, "x");
        assert_eq!(stored.content, "body");
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[test]
    fn test_stored_chunk_field_lookup() {
        let mut meta = Metadata::new();
        meta.insert("lang".to_string(), Value::from("en"));
        let stored = StoredChunk {
            id: "a".to_string(),
            content: "text".to_string(),
            metadata: meta,
        };
        assert_eq!(stored.field("id"), Some(Value::from("a")));
        assert_eq!(stored.field("content"), Some(Value::from("text")));
        assert_eq!(
            stored.field("metadata"),
            Some(serde_json::json!({"lang": "en"}))
        );
        assert_eq!(stored.field("score"), None);
    }

    #[test]
    fn test_store_index_defaults_for_sparse_manifest() {
        let index: StoreIndex = serde_json::from_str(r#"{"documents": ["a", "b"]}"#).unwrap();
        assert_eq!(index.collection, "default");
        assert_eq!(index.created_at, 0);
        assert_eq!(index.dimensions, 0);
        assert_eq!(index.documents, vec!["a", "b"]);
    }
}
