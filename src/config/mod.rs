
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Generation backend selection and credentials.
///
/// API keys may be left empty in the TOML file and supplied through the
/// `GROQ_API_KEY` / `GOOGLE_API_KEY` environment variables instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: String,
    pub groq_model: String,
    pub gemini_model: String,
    pub groq_api_key: String,
    pub google_api_key: String,
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            groq_model: "llama-3.1-8b-instant".to_string(),
            gemini_model: "gemini-pro".to_string(),
            groq_api_key: String::new(),
            google_api_key: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// Ollama connection settings for the embedding model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            embedding_dimension: 768,
        }
    }
}

/// Chunking and search parameters for the knowledge index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub collection_name: String,
    /// Target chunk size in bytes of UTF-8 text
    pub chunk_size: usize,
    /// Overlap carried between adjacent chunks
    pub chunk_overlap: usize,
    /// Number of nearest chunks fetched per query
    pub search_results: usize,
    /// Best-match distance above which a question is treated as off-topic
    pub relevance_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection_name: "corpus".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            search_results: 3,
            relevance_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 500,
            ttl_seconds: 86400,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 100 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid search result count: {0} (must be between 1 and 50)")]
    InvalidSearchResults(usize),
    #[error("Invalid relevance threshold: {0} (must be a finite value between 0 and 2)")]
    InvalidRelevanceThreshold(f32),
    #[error("Invalid cache size: {0} (must be between 1 and 100000)")]
    InvalidCacheSize(usize),
    #[error("Invalid cache TTL: {0} (must be at least 1 second)")]
    InvalidCacheTtl(u64),
    #[error("Invalid collection name: {0} (cannot be empty)")]
    InvalidCollectionName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for crate::CorpusError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.validate_retrieval()?;
        self.validate_cache()?;
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if retrieval.collection_name.trim().is_empty() {
            return Err(ConfigError::InvalidCollectionName(
                retrieval.collection_name.clone(),
            ));
        }

        if !(100..=8192).contains(&retrieval.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(retrieval.chunk_size));
        }

        if retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                retrieval.chunk_overlap,
                retrieval.chunk_size,
            ));
        }

        if !(1..=50).contains(&retrieval.search_results) {
            return Err(ConfigError::InvalidSearchResults(retrieval.search_results));
        }

        if !retrieval.relevance_threshold.is_finite()
            || retrieval.relevance_threshold <= 0.0
            || retrieval.relevance_threshold > 2.0
        {
            return Err(ConfigError::InvalidRelevanceThreshold(
                retrieval.relevance_threshold,
            ));
        }

        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.cache.max_size) {
            return Err(ConfigError::InvalidCacheSize(self.cache.max_size));
        }

        if self.cache.ttl_seconds == 0 {
            return Err(ConfigError::InvalidCacheTtl(self.cache.ttl_seconds));
        }

        Ok(())
    }

    /// Directory where the LanceDB collection lives
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl ProviderConfig {
    /// Groq API key from the config file or the `GROQ_API_KEY` environment variable.
    #[inline]
    pub fn resolve_groq_api_key(&self) -> Option<String> {
        if !self.groq_api_key.trim().is_empty() {
            return Some(self.groq_api_key.clone());
        }
        env::var("GROQ_API_KEY").ok().filter(|k| !k.trim().is_empty())
    }

    /// Google API key from the config file or the `GOOGLE_API_KEY` environment variable.
    #[inline]
    pub fn resolve_google_api_key(&self) -> Option<String> {
        if !self.google_api_key.trim().is_empty() {
            return Some(self.google_api_key.clone());
        }
        env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir()
        .ok_or(ConfigError::DirectoryError)?
        .join("corpus-qa");
    fs::create_dir_all(&dir).map_err(|_| ConfigError::DirectoryError)?;
    Ok(dir)
}
