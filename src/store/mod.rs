// Vector storage for corpus chunks
// The index talks to any backend through the VectorStore trait; the LanceDB
// implementation embeds text internally, so callers only ever see text in and
// ranked text out.

pub mod lance;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A chunk ready for storage, identified by `"{source}_{index}"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    /// Opaque document identifier (URL, `book://name`, `scripture://name`)
    pub source: String,
    pub chunk_index: u32,
    pub content: String,
}

/// A stored chunk returned from a nearest-neighbor query.
/// Lower distance means more relevant.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub source: String,
    pub content: String,
    pub distance: f32,
}

/// Contract between the knowledge index and a vector database backend.
///
/// Upserts replace records that share an id, so re-ingesting a source is
/// idempotent. Implementations own the embedding step.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace all records in one call.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<()>;

    /// Return up to `k` nearest chunks to the query text, closest first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ChunkMatch>>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<u64>;

    /// Source ids from up to `limit` stored records, duplicates included.
    async fn sample_sources(&self, limit: usize) -> Result<Vec<String>>;

    /// Destroy and recreate the collection.
    async fn reset(&self) -> Result<()>;

    fn collection_name(&self) -> &str;
}
