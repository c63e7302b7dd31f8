pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Turns text into vectors for similarity search.
///
/// The LanceDB store embeds chunk and query text through this trait, so tests
/// can substitute a deterministic embedder without a running Ollama server.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
