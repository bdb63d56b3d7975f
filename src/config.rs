//! TOML configuration.
//!
//! Every section has defaults so a config file only needs `[db] path`.
//! A handful of environment variables override the file after parsing,
//! matching how the service is usually deployed next to an Ollama container.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documents")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_url")]
    pub url: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Model used for embeddings; falls back to `name`.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            name: default_model_name(),
            embedding_model: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ModelConfig {
    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.name)
    }
}

fn default_model_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model_name() -> String {
    "llama3".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_max_attempts() -> u32 {
    30
}
fn default_interval_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            retrieval_k: default_retrieval_k(),
        }
    }
}

fn default_max_iterations() -> usize {
    5
}
fn default_retrieval_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            file_timeout_secs: default_file_timeout_secs(),
            max_segment_chars: default_max_segment_chars(),
        }
    }
}

impl IngestConfig {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }
}

fn default_file_timeout_secs() -> u64 {
    300
}
fn default_max_segment_chars() -> usize {
    4000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

impl Config {
    /// All-defaults configuration with the database under `./data`.
    pub fn minimal() -> Self {
        Self {
            documents: DocumentsConfig::default(),
            db: DbConfig {
                path: PathBuf::from("./data/docent.sqlite"),
            },
            model: ModelConfig::default(),
            readiness: ReadinessConfig::default(),
            agent: AgentConfig::default(),
            ingest: IngestConfig::default(),
            events: EventsConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Apply `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `PORT` and `DOCUMENTS_DIR`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OLLAMA_BASE_URL").filter(|v| !v.is_empty()) {
            self.model.url = url;
        }
        if let Some(name) = lookup("OLLAMA_MODEL").filter(|v| !v.is_empty()) {
            self.model.name = name;
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{}:{}", host, port);
        }
        if let Some(dir) = lookup("DOCUMENTS_DIR").filter(|v| !v.is_empty()) {
            self.documents.dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.readiness.max_attempts == 0 {
            anyhow::bail!("readiness.max_attempts must be >= 1");
        }
        if self.agent.max_iterations == 0 {
            anyhow::bail!("agent.max_iterations must be >= 1");
        }
        if self.agent.retrieval_k == 0 {
            anyhow::bail!("agent.retrieval_k must be >= 1");
        }
        if self.events.history_capacity == 0 {
            anyhow::bail!("events.history_capacity must be >= 1");
        }
        if self.ingest.max_segment_chars == 0 {
            anyhow::bail!("ingest.max_segment_chars must be > 0");
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            anyhow::bail!("model.temperature must be in [0.0, 2.0]");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.apply_env_overrides();
    config.validate()?;

    Ok(config)
}
