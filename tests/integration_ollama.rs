#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use corpus_qa::config::EmbeddingConfig;
use corpus_qa::embeddings::{OllamaClient, TextEmbedder};
use std::env;
use std::time::Duration;
use tracing::info;

const TEST_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());

    let config = EmbeddingConfig {
        host,
        port,
        model,
        batch_size: 5,
        ..EmbeddingConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_ping() {
    init_test_tracing();

    let client = create_integration_test_client();

    info!("Testing ping against real Ollama instance");
    let result = client.ping();

    assert!(
        result.is_ok(),
        "Ping should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_single_embedding() {
    init_test_tracing();

    let client = create_integration_test_client();

    let embedding = client
        .embed("The syllable om is held to be the seed of all mantras.")
        .expect("Embedding generation should succeed");

    assert!(!embedding.is_empty(), "Embedding should not be empty");
    assert!(
        embedding.iter().all(|v| v.is_finite()),
        "Embedding values should be finite"
    );
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_batch_embeddings() {
    init_test_tracing();

    let client = create_integration_test_client();

    let texts: Vec<String> = (0..12)
        .map(|i| format!("Passage {} on breath, mantra, and meditative absorption.", i))
        .collect();

    let embeddings = client
        .embed_batch(&texts)
        .expect("Batch embedding generation should succeed");

    assert_eq!(
        embeddings.len(),
        texts.len(),
        "One embedding per input text"
    );

    let dimension = embeddings[0].len();
    assert!(dimension > 0);
    assert!(
        embeddings.iter().all(|e| e.len() == dimension),
        "All embeddings should share a dimension"
    );
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_empty_batch() {
    init_test_tracing();

    let client = create_integration_test_client();

    let embeddings = client
        .embed_batch(&[])
        .expect("Empty batch should succeed trivially");
    assert!(embeddings.is_empty());
}
