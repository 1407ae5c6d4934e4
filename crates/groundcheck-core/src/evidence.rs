//! Content-addressed evidence store.
//!
//! Chunks are the atomic unit of evidence: an immutable span of source text
//! with a stable locator. The store is append-only; once ingested, a chunk
//! is never mutated or deleted for the lifetime of a run. Citations are only
//! valid if their chunk id resolves here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

/// How much chunk text participates in the id hash.
const ID_TEXT_PREFIX_CHARS: usize = 256;

/// Marker appended to quotes clipped by [`EvidenceStore::get_quote`].
const ELLIPSIS: char = '…';

/// An immutable, content-addressed span of source text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    /// Stable id: hex of SHA-256 over (source, locator, text prefix).
    pub id: String,
    /// Origin document or dataset.
    pub source: String,
    /// Structured reference into the source (section, page, span).
    pub locator: String,
    /// The evidence text itself.
    pub text: String,
}

/// Compute the content address for a (source, locator, text) tuple.
///
/// Identical tuples always yield identical ids; fields are NUL-separated so
/// `("ab", "c")` and `("a", "bc")` cannot collide.
pub fn chunk_id(source: &str, locator: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(locator.as_bytes());
    hasher.update([0u8]);
    let prefix: String = text.chars().take(ID_TEXT_PREFIX_CHARS).collect();
    hasher.update(prefix.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Append-only registry of evidence chunks.
///
/// Reads are concurrent; writes are serialized behind the write lock.
/// After ingestion completes the map is effectively frozen and subtasks
/// read it without contention.
#[derive(Debug, Default)]
pub struct EvidenceStore {
    chunks: RwLock<HashMap<String, Arc<Chunk>>>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a chunk and return its id.
    ///
    /// Idempotent: re-adding an identical (source, locator, text) tuple
    /// returns the existing id and leaves the stored chunk untouched.
    pub fn add_chunk(&self, source: &str, locator: &str, text: &str) -> String {
        let id = chunk_id(source, locator, text);
        let mut chunks = self.chunks.write();
        chunks.entry(id.clone()).or_insert_with(|| {
            Arc::new(Chunk {
                id: id.clone(),
                source: source.to_string(),
                locator: locator.to_string(),
                text: text.to_string(),
            })
        });
        id
    }

    /// Look up a chunk by id.
    pub fn get_chunk(&self, id: &str) -> Option<Arc<Chunk>> {
        self.chunks.read().get(id).cloned()
    }

    /// Whether a chunk id resolves in the store.
    pub fn has_chunk(&self, id: &str) -> bool {
        self.chunks.read().contains_key(id)
    }

    /// Canonical quote text for a chunk, clipped to `max_len` characters.
    ///
    /// Clipped quotes carry a trailing ellipsis marker. Truncation counts
    /// characters, not bytes, so multi-byte text never splits mid-scalar.
    pub fn get_quote(&self, id: &str, max_len: usize) -> Option<String> {
        let chunk = self.get_chunk(id)?;
        let text = chunk.text.trim();
        if text.chars().count() <= max_len {
            return Some(text.to_string());
        }
        let mut quote: String = text.chars().take(max_len).collect();
        quote.push(ELLIPSIS);
        Some(quote)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}
