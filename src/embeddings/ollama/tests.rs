use super::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server_uri: &str) -> OllamaClient {
    let url = Url::parse(server_uri).expect("mock server URI should parse");
    let config = EmbeddingConfig {
        host: url.host_str().expect("host").to_string(),
        port: url.port().expect("port"),
        batch_size: 2,
        ..EmbeddingConfig::default()
    };
    OllamaClient::new(&config)
        .expect("should create client")
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let config = EmbeddingConfig::default();
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_parses_server_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let embedding = tokio::task::spawn_blocking(move || client.embed("some passage"))
        .await
        .expect("task should not panic")
        .expect("embed should succeed");

    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_splits_by_batch_size() {
    let server = MockServer::start().await;
    // batch_size is 2, so four inputs arrive as two requests
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0], [2.0]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let texts: Vec<String> = (0..4).map(|i| format!("text {i}")).collect();
    let embeddings = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task should not panic")
        .expect("embed_batch should succeed");

    assert_eq!(embeddings.len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0], [2.0], [3.0]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.embed("one text"))
        .await
        .expect("task should not panic");

    assert!(matches!(result, Err(CorpusError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri()).with_retry_attempts(3);
    let result = tokio::task::spawn_blocking(move || client.embed("bad request"))
        .await
        .expect("task should not panic");

    assert!(matches!(result, Err(CorpusError::Embedding(_))));
}
