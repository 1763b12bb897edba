//! Zero-shot image classification over the Hugging Face inference API.

use crate::error::AppError;
use crate::models::classify_types::ClassificationResult;
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Anything that can label an image against a caller-supplied label set.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(
        &self,
        image: &[u8],
        model_id: &str,
        labels: &[String],
    ) -> Result<ClassificationResult, AppError>;
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL; the model id is appended as a path segment.
    pub endpoint: String,
    /// API token. Checked on the first request, not at construction.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ZeroShotRequest<'a> {
    inputs: String,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: serde_json::Value,
}

#[derive(Clone)]
pub struct InferenceClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl InferenceClient {
    pub fn new(config: ClientConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn model_url(&self, model_id: &str) -> String {
        format!("{}/{}", self.endpoint, model_id)
    }
}

#[async_trait]
impl Classify for InferenceClient {
    async fn classify(
        &self,
        image: &[u8],
        model_id: &str,
        labels: &[String],
    ) -> Result<ClassificationResult, AppError> {
        if labels.is_empty() {
            return Err(AppError::Validation("candidate label set is empty".into()));
        }
        if image.is_empty() || image::guess_format(image).is_err() {
            return Err(AppError::Validation("image payload is not a readable image".into()));
        }
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(AppError::Configuration("model id is empty".into()));
        }
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AppError::Configuration("no API token configured (set HF_TOKEN)".into()))?;

        let url = self.model_url(model_id);
        let body = ZeroShotRequest {
            inputs: base64::engine::general_purpose::STANDARD.encode(image),
            parameters: ZeroShotParameters {
                candidate_labels: labels,
            },
        };

        debug!(url = %url, labels = labels.len(), bytes = image.len(), "sending classification request");
        let resp = self.client.post(&url).bearer_auth(token).json(&body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Configuration(format!(
                "API token rejected (HTTP {}): {}",
                status.as_u16(),
                error_message(&bytes)
            )));
        }
        if !status.is_success() {
            return Err(AppError::Remote {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }

        serde_json::from_slice::<ClassificationResult>(&bytes).map_err(|e| AppError::Remote {
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })
    }
}

/// Pull a readable message out of an error body, `{"error": ...}` or raw text.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorPayload>(body) {
        Ok(ErrorPayload {
            error: serde_json::Value::String(msg),
        }) => msg,
        Ok(payload) => payload.error.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                "empty response body".to_string()
            } else {
                text
            }
        }
    }
}
