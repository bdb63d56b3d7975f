//! HTTP client for the Ollama model service.
//!
//! One [`OllamaClient`] serves all three model-facing seams:
//!
//! - [`ModelCatalog`] via `GET /api/tags`, polled by the readiness gate
//! - [`Embedder`] via `POST /api/embed`
//! - [`ReasoningEngine`] via `POST /api/generate` (non-streaming)
//!
//! Transient failures (connection errors, HTTP 429, 5xx) on embed and
//! generate are retried with exponential backoff: 1s, 2s, 4s, … capped at
//! 32s, up to `model.max_retries` retries. Other HTTP errors fail at once.
//! The tags call is never retried here; the readiness gate owns that loop.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::agent::ReasoningEngine;
use crate::config::ModelConfig;
use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use crate::readiness::ModelCatalog;

/// Generation stops before the model starts inventing an observation.
const STOP_SEQUENCE: &str = "\nObservation";

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f64,
    max_retries: u32,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocentError::Model(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            embedding_model: config.embedding_model().to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path`, retrying transient failures with backoff.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(path, attempt, delay_secs = delay.as_secs(), "retrying model call");
                tokio::time::sleep(delay).await;
            }

            match self.http.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            DocentError::Model(format!("invalid response from {}: {}", path, e))
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = DocentError::Model(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    ));
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(path, %status, attempt, "transient model service error");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    warn!(path, attempt, error = %e, "model service connection error");
                    last_err = Some(DocentError::Model(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.base_url, e
                    )));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| DocentError::Model(format!("{} failed after retries", path))))
    }
}

#[async_trait]
impl ModelCatalog for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DocentError::Model(format!("Ollama connection error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocentError::Model(format!(
                "Ollama API error {} listing models",
                status
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| DocentError::Model(format!("invalid /api/tags response: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": [text],
        });
        let json = self.post_json("/api/embed", &body).await?;
        parse_embed_response(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| DocentError::Model("Ollama returned no embeddings".to_string()))
    }
}

#[async_trait]
impl ReasoningEngine for OllamaClient {
    async fn reason(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "stop": [STOP_SEQUENCE],
            },
        });
        let json = self.post_json("/api/generate", &body).await?;
        let parsed: GenerateResponse = serde_json::from_value(json)
            .map_err(|e| DocentError::Model(format!("invalid /api/generate response: {}", e)))?;
        Ok(parsed.response)
    }
}

fn parse_embed_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            DocentError::Model("invalid Ollama response: missing embeddings array".to_string())
        })?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect()
                })
                .ok_or_else(|| {
                    DocentError::Model(
                        "invalid Ollama response: embedding is not an array".to_string(),
                    )
                })
        })
        .collect()
}
