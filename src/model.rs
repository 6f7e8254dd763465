//! Client for the local model server (Ollama-compatible HTTP API).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AssistantConfig;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request timed out; the model may be slow on this hardware")]
    Timeout,

    #[error("could not reach the model server at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("model server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response from model server: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Body of `POST /api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response from `GET /api/tags`.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<InstalledModel>,
}

#[derive(Debug, Deserialize)]
struct InstalledModel {
    name: String,
}

pub struct ModelClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
    num_predict: u32,
}

impl ModelClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ModelError::Client)?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            num_predict: config.num_predict,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Make sure the server answers, switching to an installed model when the
    /// configured one is missing.
    pub async fn check_connection(&mut self) -> Result<(), ModelError> {
        let url = format!("{}/api/tags", self.api_url);
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        let resp = check_status(resp).await?;
        let tags: TagsResponse = resp.json().await.map_err(ModelError::Decode)?;

        let installed: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        if let Some(fallback) = pick_model(&self.model, &installed) {
            warn!(configured = %self.model, using = %fallback, "model not installed, falling back");
            self.model = fallback;
        }
        info!(model = %self.model, "connected to model server");
        Ok(())
    }

    /// Send a fully formatted prompt and return the trimmed reply.
    pub async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/api/generate", self.api_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        let resp = check_status(resp).await?;
        let reply: GenerateResponse = resp.json().await.map_err(ModelError::Decode)?;
        Ok(reply.response.trim().to_string())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(ModelError::Status { status, body })
    }
}

fn classify(error: reqwest::Error, url: &str) -> ModelError {
    if error.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Connection {
            url: url.to_string(),
            source: error,
        }
    }
}

/// The model to use instead of `configured`, if it is not installed.
fn pick_model(configured: &str, installed: &[String]) -> Option<String> {
    if installed.iter().any(|name| name == configured) {
        None
    } else {
        installed.first().cloned()
    }
}
