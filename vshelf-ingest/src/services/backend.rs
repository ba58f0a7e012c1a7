//! Generation endpoint abstraction
//!
//! `GenerationBackend` is the seam between the pipeline and the hosted model
//! service. `HttpGenerationBackend` talks to a Gemini-style REST API;
//! tests substitute scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("vshelf/", env!("CARGO_PKG_VERSION"));

/// Pipeline stage issuing a call (used for traces and by test fakes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTask {
    Segmentation,
    Classification,
    Embedding,
    Other,
}

/// Shape of the expected response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Text,
    Json,
    Embedding,
}

/// One text/JSON generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task: CallTask,
    pub kind: ResponseKind,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn json(task: CallTask, prompt: impl Into<String>) -> Self {
        Self {
            task,
            kind: ResponseKind::Json,
            prompt: prompt.into(),
        }
    }

    pub fn text(task: CallTask, prompt: impl Into<String>) -> Self {
        Self {
            task,
            kind: ResponseKind::Text,
            prompt: prompt.into(),
        }
    }
}

/// Raw backend failure, before classification
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response")]
    Empty,
}

/// Hosted generation service
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text (or JSON text) with one credential and one model
    async fn generate(
        &self,
        credential: &str,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<String, BackendError>;

    /// Embed a text with one credential and one embedding model
    async fn embed(&self, credential: &str, model: &str, text: &str)
        -> Result<Vec<f32>, BackendError>;

    /// Model names visible to a credential (diagnostics only)
    async fn list_models(&self, credential: &str) -> Result<Vec<String>, BackendError>;
}

/// reqwest client for a Gemini-style REST API
pub struct HttpGenerationBackend {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpGenerationBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json(
        &self,
        url: &str,
        credential: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", credential)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        read_json(response).await
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(
        &self,
        credential: &str,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        });
        if request.kind == ResponseKind::Json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        tracing::debug!(model = %model, task = ?request.task, "Calling generateContent");

        let value = self
            .post_json(&self.model_url(model, "generateContent"), credential, &body)
            .await?;
        let parsed: GenerateResponse =
            serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::Empty);
        }
        Ok(text)
    }

    async fn embed(
        &self,
        credential: &str,
        model: &str,
        text: &str,
    ) -> Result<Vec<f32>, BackendError> {
        let name = model.strip_prefix("models/").unwrap_or(model);
        let body = json!({
            "model": format!("models/{}", name),
            "content": { "parts": [{ "text": text }] },
        });

        let value = self
            .post_json(&self.model_url(model, "embedContent"), credential, &body)
            .await?;
        let parsed: EmbedResponse =
            serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;

        if parsed.embedding.values.is_empty() {
            return Err(BackendError::Empty);
        }
        Ok(parsed.embedding.values)
    }

    async fn list_models(&self, credential: &str) -> Result<Vec<String>, BackendError> {
        let response = self
            .http_client
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", credential)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let value = read_json(response).await?;
        let parsed: ListModelsResponse =
            serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Turn a response into JSON, mapping non-2xx to `BackendError::Status`
async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| BackendError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(BackendError::Status {
            code: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| BackendError::Parse(e.to_string()))
}

/// `{"error":{"message":..,"status":..}}` → "STATUS: message"; raw body otherwise
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{}: {}", status, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.chars().take(500).collect(),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}
