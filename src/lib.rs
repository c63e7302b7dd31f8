use thiserror::Error;

pub type Result<T> = std::result::Result<T, CorpusError>;

/// Crate-level error type.
///
/// `Store` failures are recoverable at the retrieval boundary (the index degrades
/// them to an off-topic result), while `Generation` failures surface to the caller.
/// Keeping them as distinct variants prevents the relevance gate from ever being
/// conflated with a provider failure.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod cache;
pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod pipeline;
pub mod providers;
pub mod store;
