#[cfg(test)]
mod tests;

pub mod gemini;
pub mod groq;

use std::io::BufRead;
use std::sync::Arc;
use tracing::warn;

use crate::config::ProviderConfig;
use crate::{CorpusError, Result};
pub use gemini::GeminiClient;
pub use groq::GroqClient;

/// Stream of incremental answer fragments from a generation backend.
pub type DeltaStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// A text-generation backend that can answer one-shot or as a delta stream.
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Generate a complete answer for `question` under `system_prompt`.
    fn generate(&self, system_prompt: &str, question: &str) -> Result<String>;

    /// Generate an answer as a stream of text deltas. The iterator ends after
    /// the final delta; transport or parse failures surface as `Err` items.
    fn generate_stream(&self, system_prompt: &str, question: &str) -> Result<DeltaStream>;
}

/// The set of supported generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    Gemini,
}

impl ProviderKind {
    /// Parse a configured provider name. Unknown names fall back to Groq with
    /// a warning rather than failing startup.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "groq" => Self::Groq,
            "gemini" => Self::Gemini,
            other => {
                warn!("Unknown provider '{}', defaulting to groq", other);
                Self::Groq
            }
        }
    }
}

/// Construct the configured generation provider.
///
/// A missing API key is a configuration error and fails fast here, at startup,
/// rather than on the first query.
#[inline]
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn GenerationProvider>> {
    match ProviderKind::from_name(&config.provider) {
        ProviderKind::Groq => {
            let api_key = config.resolve_groq_api_key().ok_or_else(|| {
                CorpusError::Config(
                    "Groq provider selected but no API key found; set GROQ_API_KEY or \
                     provider.groq_api_key"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(GroqClient::new(
                api_key,
                config.groq_model.clone(),
                config.timeout_seconds,
            )))
        }
        ProviderKind::Gemini => {
            let api_key = config.resolve_google_api_key().ok_or_else(|| {
                CorpusError::Config(
                    "Gemini provider selected but no API key found; set GOOGLE_API_KEY or \
                     provider.google_api_key"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(GeminiClient::new(
                api_key,
                config.gemini_model.clone(),
                config.timeout_seconds,
            )))
        }
    }
}

/// Iterator over the text deltas of a server-sent-events response body.
///
/// Both backends frame streamed completions as `data: <json>` lines; the
/// per-provider `parse` extracts the delta text from one payload. Payloads
/// without delta text (role preludes, finish markers) are skipped, and the
/// literal `[DONE]` payload terminates the stream.
pub(crate) struct SseDeltas<R: BufRead> {
    reader: R,
    parse: fn(&str) -> Option<String>,
    done: bool,
}

impl<R: BufRead> SseDeltas<R> {
    pub(crate) fn new(reader: R, parse: fn(&str) -> Option<String>) -> Self {
        Self {
            reader,
            parse,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for SseDeltas<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(CorpusError::Generation(format!(
                        "Stream read failed: {}",
                        e
                    ))));
                }
            }

            let Some(payload) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim_start();

            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                self.done = true;
                return None;
            }

            if let Some(delta) = (self.parse)(payload) {
                if !delta.is_empty() {
                    return Some(Ok(delta));
                }
            }
        }
        None
    }
}
