//! External Call Adapter
//!
//! One remote operation per work item: a generate-content call for the text
//! stages and a synthesize-speech call for the audio stage. Adapters never
//! retry; every failure is returned as a typed [`ProviderError`] for the retry
//! controller to classify.

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod gemini;
pub mod speech;

pub use gemini::GeminiClient;
pub use speech::GoogleSpeechClient;

/// Sampling options for a generate-content call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub seed: Option<i64>,
    pub max_output_tokens: Option<u32>,
    /// `-1` lets the model pick its own reasoning budget
    pub thinking_budget: Option<i32>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: Some(1.0),
            top_p: None,
            seed: None,
            max_output_tokens: None,
            thinking_budget: None,
        }
    }
}

/// Content-filter threshold for one harm category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    pub fn off(category: &str) -> Self {
        Self {
            category: category.to_string(),
            threshold: "OFF".to_string(),
        }
    }
}

/// One generate-content request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: SamplingOptions,
    pub response_mime_type: Option<String>,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: SamplingOptions::default(),
            response_mime_type: None,
            safety_settings: Vec::new(),
        }
    }
}

/// One synthesize-speech request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub language_code: String,
    pub audio_encoding: String,
}

/// Generative text service
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one call and return the concatenated response text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Speech-synthesis service
#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Synthesize one clip and return the decoded audio bytes.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ProviderError>;

    fn provider_name(&self) -> &str;
}

// Helper function to map HTTP errors to ProviderError
fn map_http_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        map_status(status, &error.to_string())
    } else if error.is_timeout() {
        ProviderError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ProviderError::RequestFailed(format!("Connection error: {}", error))
    } else {
        ProviderError::RequestFailed(format!("HTTP error: {}", error))
    }
}

/// Map a non-success status and its body to a provider error.
fn map_status(status: StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => {
            ProviderError::AuthFailed(format!("Authentication failed ({}): {}", status, body))
        }
        429 => ProviderError::RateLimit(format!("Rate limit exceeded ({}): {}", status, body)),
        _ => ProviderError::RequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

/// Turn a non-success response into an error that carries its body.
async fn error_for_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    map_status(status, &body)
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

fn build_provider_http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::RequestFailed(format!("Failed to create HTTP client: {}", e)))
}

// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, ProviderError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl GenerationClient for MockProvider {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::RequestFailed("no scripted response".into())))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
