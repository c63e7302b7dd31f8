use super::*;
use crate::config::ProviderConfig;
use std::io::Cursor;

fn provider_config(provider: &str) -> ProviderConfig {
    ProviderConfig {
        provider: provider.to_string(),
        groq_api_key: "test-groq-key".to_string(),
        google_api_key: "test-google-key".to_string(),
        ..ProviderConfig::default()
    }
}

#[test]
fn provider_kind_from_name() {
    assert_eq!(ProviderKind::from_name("groq"), ProviderKind::Groq);
    assert_eq!(ProviderKind::from_name("gemini"), ProviderKind::Gemini);
    assert_eq!(ProviderKind::from_name("  Gemini  "), ProviderKind::Gemini);
    assert_eq!(ProviderKind::from_name("GROQ"), ProviderKind::Groq);
}

#[test]
fn provider_kind_unknown_defaults_to_groq() {
    assert_eq!(ProviderKind::from_name("openai"), ProviderKind::Groq);
    assert_eq!(ProviderKind::from_name(""), ProviderKind::Groq);
}

#[test]
fn create_provider_groq() {
    let provider = create_provider(&provider_config("groq")).unwrap();
    assert_eq!(provider.name(), "groq");
}

#[test]
fn create_provider_gemini() {
    let provider = create_provider(&provider_config("gemini")).unwrap();
    assert_eq!(provider.name(), "gemini");
}

#[test]
fn create_provider_missing_key_fails() {
    let mut config = provider_config("gemini");
    config.google_api_key = String::new();
    if std::env::var("GOOGLE_API_KEY").is_err() {
        assert!(create_provider(&config).is_err());
    }
}

fn parse_echo(payload: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()?
        .get("text")?
        .as_str()
        .map(ToString::to_string)
}

fn collect_deltas(body: &str) -> Vec<String> {
    SseDeltas::new(Cursor::new(body.to_string()), parse_echo)
        .map(|delta| delta.unwrap())
        .collect()
}

#[test]
fn sse_yields_payload_deltas() {
    let body = "data: {\"text\":\"Hello\"}\n\ndata: {\"text\":\" world\"}\n\n";
    assert_eq!(collect_deltas(body), vec!["Hello", " world"]);
}

#[test]
fn sse_stops_at_done_marker() {
    let body =
        "data: {\"text\":\"one\"}\n\ndata: [DONE]\n\ndata: {\"text\":\"ignored\"}\n\n";
    assert_eq!(collect_deltas(body), vec!["one"]);
}

#[test]
fn sse_skips_non_data_lines_and_empty_payloads() {
    let body = ": keep-alive\n\nevent: ping\n\ndata:\n\ndata: {\"text\":\"only\"}\n\ndata: {\"role\":\"assistant\"}\n\n";
    assert_eq!(collect_deltas(body), vec!["only"]);
}

#[test]
fn sse_handles_missing_space_after_prefix() {
    let body = "data:{\"text\":\"tight\"}\n\n";
    assert_eq!(collect_deltas(body), vec!["tight"]);
}

#[test]
fn sse_empty_body_yields_nothing() {
    assert!(collect_deltas("").is_empty());
}
