
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::time::Duration;
use tracing::debug;

use super::{DeltaStream, GenerationProvider, SseDeltas};
use crate::{CorpusError, Result};

const DEFAULT_BASE_URL: &str = "https://api.groq.com";
const CHAT_COMPLETIONS_PATH: &str = "/openai/v1/chat/completions";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1024;

/// Client for Groq's OpenAI-compatible chat completions API.
pub struct GroqClient {
    base_url: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamPayload {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl GroqClient {
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

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }

    fn request_json(&self, system_prompt: &str, question: &str, stream: bool) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream,
        };
        serde_json::to_string(&request)
            .map_err(|e| CorpusError::Generation(format!("Failed to serialize Groq request: {}", e)))
    }

    fn parse_stream_payload(payload: &str) -> Option<String> {
        let parsed: StreamPayload = serde_json::from_str(payload).ok()?;
        parsed.choices.into_iter().next()?.delta.content
    }
}

impl GenerationProvider for GroqClient {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn generate(&self, system_prompt: &str, question: &str) -> Result<String> {
        debug!("Requesting Groq completion with model {}", self.model);

        let request_json = self.request_json(system_prompt, question, false)?;

        let response_text = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| CorpusError::Generation(format!("Groq request failed: {}", e)))?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| CorpusError::Generation(format!("Failed to parse Groq response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CorpusError::Generation("Groq response contained no choices".to_string()))
    }

    fn generate_stream(&self, system_prompt: &str, question: &str) -> Result<DeltaStream> {
        debug!("Requesting Groq completion stream with model {}", self.model);

        let request_json = self.request_json(system_prompt, question, true)?;

        let response = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| CorpusError::Generation(format!("Groq request failed: {}", e)))?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(Box::new(SseDeltas::new(reader, Self::parse_stream_payload)))
    }
}
