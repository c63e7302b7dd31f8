
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::chunking::chunk_text;
use crate::store::{ChunkRecord, VectorStore};

/// Chunk texts are joined with this separator when assembling retrieval context.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Sentinel distance meaning "nothing relevant": returned for empty indexes,
/// empty result sets and internal search failures.
const NOT_RELEVANT: f32 = 1.0;

/// How many metadata records `stats` samples when counting distinct sources.
const SOURCE_SAMPLE_LIMIT: usize = 1000;

/// Manages corpus text storage and semantic search over a [`VectorStore`].
pub struct KnowledgeIndex {
    store: Arc<dyn VectorStore>,
    chunk_size: usize,
    chunk_overlap: usize,
    default_results: usize,
}

/// Retrieval output for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchContext {
    /// Matched chunk texts in rank order, separated by `---` dividers
    pub context: String,
    /// De-duplicated source ids in first-seen rank order
    pub sources: Vec<String>,
    /// Minimum distance among the matches; lower is more relevant
    pub best_distance: f32,
}

impl SearchContext {
    fn not_relevant() -> Self {
        Self {
            context: String::new(),
            sources: Vec::new(),
            best_distance: NOT_RELEVANT,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexStats {
    pub total_chunks: u64,
    pub total_sources: usize,
    pub collection_name: String,
}

impl KnowledgeIndex {
    #[inline]
    pub fn new(
        store: Arc<dyn VectorStore>,
        chunk_size: usize,
        chunk_overlap: usize,
        default_results: usize,
    ) -> Self {
        Self {
            store,
            chunk_size,
            chunk_overlap,
            default_results,
        }
    }

    /// Chunk `text` and upsert all chunks for `source` in a single store call.
    ///
    /// Returns the number of chunks added. Ingestion problems are reported as a
    /// zero count, never an error: empty chunking logs a warning, a store
    /// failure logs an error, and in both cases prior state is untouched.
    #[inline]
    pub async fn add(&self, text: &str, source: &str) -> usize {
        let chunks = chunk_text(text, self.chunk_size, self.chunk_overlap);

        if chunks.is_empty() {
            warn!("No chunks generated from {}", source);
            return 0;
        }

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, content)| ChunkRecord {
                id: format!("{}_{}", source, i),
                source: source.to_string(),
                chunk_index: i as u32,
                content,
            })
            .collect();
        let count = records.len();

        if let Err(e) = self.store.upsert(records).await {
            error!("Failed to store chunks from {}: {}", source, e);
            return 0;
        }

        info!("Added {} chunks from {}", count, source);
        count
    }

    /// Search for relevant corpus passages.
    ///
    /// Degrades to the not-relevant sentinel `("", [], 1.0)` when the index is
    /// empty, when the store returns no matches, or when the search itself
    /// fails. Retrieval errors never propagate to the caller; the pipeline
    /// treats the sentinel as an off-topic question.
    #[inline]
    pub async fn search(&self, query: &str, k: Option<usize>) -> SearchContext {
        let k = k.unwrap_or(self.default_results);

        match self.store.count().await {
            Ok(0) => {
                debug!("Knowledge index is empty");
                return SearchContext::not_relevant();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Search error: {}", e);
                return SearchContext::not_relevant();
            }
        }

        let matches = match self.store.query(query, k).await {
            Ok(matches) => matches,
            Err(e) => {
                error!("Search error: {}", e);
                return SearchContext::not_relevant();
            }
        };

        if matches.is_empty() {
            return SearchContext::not_relevant();
        }

        let best_distance = matches
            .iter()
            .map(|m| m.distance)
            .fold(f32::INFINITY, f32::min);

        let context = matches.iter().map(|m| m.content.as_str()).join(CONTEXT_SEPARATOR);

        let sources: Vec<String> = matches
            .iter()
            .map(|m| m.source.clone())
            .filter(|s| !s.is_empty())
            .unique()
            .collect();

        debug!(
            "Found {} chunks from {} sources (best distance: {:.3})",
            matches.len(),
            sources.len(),
            best_distance
        );

        SearchContext {
            context,
            sources,
            best_distance,
        }
    }

    /// Index statistics. The source count is approximated by sampling up to
    /// 1000 stored records, which is informational only.
    #[inline]
    pub async fn stats(&self) -> Result<IndexStats> {
        let total_chunks = self.store.count().await?;

        let total_sources = if total_chunks > 0 {
            match self.store.sample_sources(SOURCE_SAMPLE_LIMIT).await {
                Ok(sources) => sources.into_iter().unique().count(),
                Err(e) => {
                    warn!("Could not fetch sources: {}", e);
                    0
                }
            }
        } else {
            0
        };

        Ok(IndexStats {
            total_chunks,
            total_sources,
            collection_name: self.store.collection_name().to_string(),
        })
    }

    /// Destroy and recreate the underlying collection.
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.store.reset().await?;
        info!("Knowledge index cleared");
        Ok(())
    }

    #[inline]
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.store.count().await? == 0)
    }
}
