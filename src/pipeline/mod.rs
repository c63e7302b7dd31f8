
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::index::KnowledgeIndex;
use crate::providers::{GenerationProvider, create_provider};
use crate::store::lance::LanceStore;
use crate::{CorpusError, Result};

/// Persona prompt for the generation backend. The retrieved corpus context is
/// substituted for `{context}` before each request.
const SYSTEM_PROMPT: &str = "\
You are a scholarly guide to a curated corpus of texts.

STRICT RULES:
1. ONLY answer from the provided reference context below
2. If the context is not relevant to the question, say you cannot help with that topic
3. Do not speculate beyond what the context supports
4. Keep responses focused on the source material

When answering:
- Cite the ideas of the passages rather than inventing new ones
- Present terminology from the texts clearly
- Be humble about the limits of the indexed material

Reference Context:
{context}";

const NO_CONTEXT_PLACEHOLDER: &str = "No specific reference context available for this query.";

/// Canned refusal for questions the corpus cannot support.
const OFF_TOPIC_RESPONSE: &str = "This question falls outside the scope of the indexed corpus. \
     Please ask about the topics covered by the ingested texts.";

/// Maximum characters of retrieved context echoed back in an answer.
const CONTEXT_PREVIEW_CHARS: usize = 200;

const STREAM_CHANNEL_CAPACITY: usize = 32;

/// A complete answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub response: String,
    /// Truncated preview of the retrieved context that informed the answer
    pub context_used: String,
    pub sources: Vec<String>,
}

/// One frame of a streamed answer.
///
/// Serialized untagged so the wire shapes are `{"chunk": ...}`,
/// `{"done": true, "sources": [...]}` and `{"error": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StreamEvent {
    Delta { chunk: String },
    Done { done: bool, sources: Vec<String> },
    Error { error: String },
}

impl StreamEvent {
    #[inline]
    pub fn delta(chunk: impl Into<String>) -> Self {
        Self::Delta {
            chunk: chunk.into(),
        }
    }

    #[inline]
    pub fn done(sources: Vec<String>) -> Self {
        Self::Done {
            done: true,
            sources,
        }
    }

    #[inline]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// Orchestrates one question through cache, retrieval, relevance gating and
/// generation.
pub struct QueryPipeline {
    index: Arc<KnowledgeIndex>,
    cache: Arc<ResponseCache>,
    provider: Arc<dyn GenerationProvider>,
    search_results: usize,
    relevance_threshold: f32,
}

fn build_system_prompt(context: &str) -> String {
    let context = if context.is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    };
    SYSTEM_PROMPT.replace("{context}", context)
}

fn context_preview(context: &str) -> String {
    if context.chars().count() > CONTEXT_PREVIEW_CHARS {
        let mut preview: String = context.chars().take(CONTEXT_PREVIEW_CHARS).collect();
        preview.push_str("...");
        preview
    } else {
        context.to_string()
    }
}

impl QueryPipeline {
    #[inline]
    pub fn new(
        index: Arc<KnowledgeIndex>,
        cache: Arc<ResponseCache>,
        provider: Arc<dyn GenerationProvider>,
        search_results: usize,
        relevance_threshold: f32,
    ) -> Self {
        Self {
            index,
            cache,
            provider,
            search_results,
            relevance_threshold,
        }
    }

    fn off_topic_answer(&self, question: &str, best_distance: f32) -> Answer {
        info!("Off-topic question rejected (distance: {:.3})", best_distance);
        let answer = Answer {
            response: OFF_TOPIC_RESPONSE.to_string(),
            context_used: String::new(),
            sources: Vec::new(),
        };
        self.cache.set(question, answer.clone());
        answer
    }

    /// Answer `question` in one shot.
    ///
    /// Cache hits and off-topic refusals never touch the provider. Generation
    /// failures are logged in full and surfaced as a generic error, and the
    /// failed question is not cached.
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        if let Some(answer) = self.cache.get(question) {
            info!("Returning cached response");
            return Ok(answer);
        }

        let retrieved = self.index.search(question, Some(self.search_results)).await;
        debug!(
            "Best distance score: {:.3} (threshold: {})",
            retrieved.best_distance, self.relevance_threshold
        );

        if retrieved.best_distance > self.relevance_threshold || retrieved.context.is_empty() {
            return Ok(self.off_topic_answer(question, retrieved.best_distance));
        }

        let prompt = build_system_prompt(&retrieved.context);
        let provider = Arc::clone(&self.provider);
        let question_owned = question.to_string();

        let generated =
            match tokio::task::spawn_blocking(move || provider.generate(&prompt, &question_owned))
                .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    error!("Generation failed: {}", e);
                    return Err(CorpusError::Generation(
                        "response generation failed".to_string(),
                    ));
                }
                Err(e) => {
                    error!("Generation task failed: {}", e);
                    return Err(CorpusError::Generation(
                        "response generation failed".to_string(),
                    ));
                }
            };

        let answer = Answer {
            response: generated,
            context_used: context_preview(&retrieved.context),
            sources: retrieved.sources,
        };
        self.cache.set(question, answer.clone());
        Ok(answer)
    }

    /// Answer `question` as a stream of [`StreamEvent`] frames.
    ///
    /// The producer runs on a blocking worker and is abandoned as soon as the
    /// returned receiver is dropped. The answer is cached only after the
    /// stream completes; a mid-stream failure emits an `{error}` frame and
    /// leaves the cache untouched.
    #[inline]
    pub async fn ask_stream(&self, question: &str) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        if let Some(answer) = self.cache.get(question) {
            info!("Returning cached response as stream");
            let _ = tx.send(StreamEvent::delta(answer.response)).await;
            let _ = tx.send(StreamEvent::done(answer.sources)).await;
            return rx;
        }

        let retrieved = self.index.search(question, Some(self.search_results)).await;
        debug!(
            "Best distance score: {:.3} (threshold: {})",
            retrieved.best_distance, self.relevance_threshold
        );

        if retrieved.best_distance > self.relevance_threshold || retrieved.context.is_empty() {
            let answer = self.off_topic_answer(question, retrieved.best_distance);
            let _ = tx.send(StreamEvent::delta(answer.response)).await;
            let _ = tx.send(StreamEvent::done(Vec::new())).await;
            return rx;
        }

        let prompt = build_system_prompt(&retrieved.context);
        let preview = context_preview(&retrieved.context);
        let sources = retrieved.sources;
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let question = question.to_string();

        tokio::task::spawn_blocking(move || {
            let deltas = match provider.generate_stream(&prompt, &question) {
                Ok(deltas) => deltas,
                Err(e) => {
                    error!("Generation failed: {}", e);
                    let _ = tx.blocking_send(StreamEvent::error("response generation failed"));
                    return;
                }
            };

            let mut full_response = String::new();
            for delta in deltas {
                match delta {
                    Ok(chunk) => {
                        full_response.push_str(&chunk);
                        if tx.blocking_send(StreamEvent::delta(chunk)).is_err() {
                            debug!("Stream consumer dropped, abandoning generation");
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Stream generation failed: {}", e);
                        let _ =
                            tx.blocking_send(StreamEvent::error("response generation failed"));
                        return;
                    }
                }
            }

            cache.set(
                &question,
                Answer {
                    response: full_response,
                    context_used: preview,
                    sources: sources.clone(),
                },
            );
            let _ = tx.blocking_send(StreamEvent::done(sources));
        });

        rx
    }
}

/// Long-lived application state, built once at startup and shared by every
/// command instead of hiding components behind lazily-initialized globals.
pub struct AppContext {
    pub config: Config,
    pub index: Arc<KnowledgeIndex>,
    pub cache: Arc<ResponseCache>,
    pub pipeline: QueryPipeline,
}

impl AppContext {
    /// Wire up the embedder, vector store, index, cache and provider from
    /// `config`. Fails fast on invalid configuration or an unreachable store.
    #[inline]
    pub async fn initialize(config: Config) -> Result<Self> {
        let embedder = Arc::new(OllamaClient::new(&config.embedding)?);

        let store = Arc::new(
            LanceStore::new(
                &config.vector_database_path(),
                &config.retrieval.collection_name,
                config.embedding.embedding_dimension as usize,
                embedder,
            )
            .await?,
        );

        let index = Arc::new(KnowledgeIndex::new(
            store,
            config.retrieval.chunk_size,
            config.retrieval.chunk_overlap,
            config.retrieval.search_results,
        ));

        let cache = Arc::new(ResponseCache::new(
            config.cache.max_size,
            Duration::from_secs(config.cache.ttl_seconds),
        ));

        let provider = create_provider(&config.provider)?;
        info!("Query pipeline initialized with {} provider", provider.name());

        let pipeline = QueryPipeline::new(
            Arc::clone(&index),
            Arc::clone(&cache),
            provider,
            config.retrieval.search_results,
            config.retrieval.relevance_threshold,
        );

        Ok(Self {
            config,
            index,
            cache,
            pipeline,
        })
    }
}
