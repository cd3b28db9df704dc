//! Gemini generate-content adapter (streamed over server-sent events).

use super::{
    build_provider_http_client, error_for_response, map_http_error, GenerationClient,
    GenerationRequest, SafetySetting,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(model: String, api_key: String, endpoint: Option<String>) -> Result<Self, ProviderError> {
        let client = build_provider_http_client()?;
        let endpoint = endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.endpoint, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content>,
    generation_config: GenerationConfig<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Reasoning summaries are not part of the payload
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

#[derive(Deserialize, Default)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

fn build_body(request: &GenerationRequest) -> GenerateContentBody<'_> {
    GenerateContentBody {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(request.prompt.clone()),
                thought: false,
            }],
        }],
        generation_config: GenerationConfig {
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            seed: request.options.seed,
            max_output_tokens: request.options.max_output_tokens,
            response_mime_type: request.response_mime_type.as_deref(),
            thinking_config: request
                .options
                .thinking_budget
                .map(|thinking_budget| ThinkingConfig { thinking_budget }),
        },
        safety_settings: request.safety_settings.clone(),
    }
}

/// Accumulates response text from a server-sent event stream.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere (including inside a multi-byte character).
#[derive(Debug, Default)]
pub struct SseTextCollector {
    pending: Vec<u8>,
    text: String,
    events: usize,
}

impl SseTextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.handle_line(&line);
        }
    }

    /// Flush a trailing line without newline and return the concatenated text.
    pub fn finish(mut self) -> (String, usize) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.handle_line(&line);
        }
        (self.text, self.events)
    }

    fn handle_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let Some(data) = line.trim_end().strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return;
        }
        self.events += 1;

        // Chunks that fail to parse or carry no candidates/parts are skipped.
        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable stream chunk");
                return;
            }
        };
        let Some(content) = chunk.candidates.into_iter().next().and_then(|c| c.content) else {
            return;
        };
        for part in content.parts {
            if part.thought {
                continue;
            }
            if let Some(text) = part.text {
                self.text.push_str(&text);
            }
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&build_body(request))
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let mut collector = SseTextCollector::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(map_http_error)?;
            collector.push(&bytes);
        }

        let (text, events) = collector.finish();
        debug!(model = %self.model, events, characters = text.len(), "Stream complete");
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse(format!(
                "no text in {} stream event(s)",
                events
            )));
        }
        Ok(text)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
