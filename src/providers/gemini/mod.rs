
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::time::Duration;
use tracing::debug;

use super::{DeltaStream, GenerationProvider, SseDeltas};
use crate::{CorpusError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Client for Google's Gemini generateContent API.
///
/// Gemini has no separate system role in this endpoint, so the system prompt
/// and question are combined into a single user prompt.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    #[inline]
    pub fn new(api_key: String, model: String, timeout_seconds: u64) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_seconds)))
            .build()
            .into();

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model,
            agent,
        }
    }

    #[inline]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, method: &str, sse: bool) -> String {
        let alt = if sse { "&alt=sse" } else { "" };
        format!(
            "{}/v1beta/models/{}:{}?key={}{}",
            self.base_url, self.model, method, self.api_key, alt
        )
    }

    fn request_json(&self, system_prompt: &str, question: &str) -> Result<String> {
        let full_prompt = format!("{}\n\nUser Query: {}", system_prompt, question);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &full_prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };
        serde_json::to_string(&request).map_err(|e| {
            CorpusError::Generation(format!("Failed to serialize Gemini request: {}", e))
        })
    }

    fn extract_text(response: GenerateResponse) -> Option<String> {
        let candidate = response.candidates.into_iter().next()?;
        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<String>();
        (!text.is_empty()).then_some(text)
    }

    fn parse_stream_payload(payload: &str) -> Option<String> {
        let parsed: GenerateResponse = serde_json::from_str(payload).ok()?;
        Self::extract_text(parsed)
    }
}

impl GenerationProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(&self, system_prompt: &str, question: &str) -> Result<String> {
        debug!("Requesting Gemini completion with model {}", self.model);

        let request_json = self.request_json(system_prompt, question)?;

        let response_text = self
            .agent
            .post(&self.endpoint("generateContent", false))
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| CorpusError::Generation(format!("Gemini request failed: {}", e)))?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            CorpusError::Generation(format!("Failed to parse Gemini response: {}", e))
        })?;

        Self::extract_text(response).ok_or_else(|| {
            CorpusError::Generation("Gemini response contained no candidates".to_string())
        })
    }

    fn generate_stream(&self, system_prompt: &str, question: &str) -> Result<DeltaStream> {
        debug!("Requesting Gemini completion stream with model {}", self.model);

        let request_json = self.request_json(system_prompt, question)?;

        let response = self
            .agent
            .post(&self.endpoint("streamGenerateContent", true))
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| CorpusError::Generation(format!("Gemini request failed: {}", e)))?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(Box::new(SseDeltas::new(reader, Self::parse_stream_payload)))
    }
}
