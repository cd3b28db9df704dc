//! Google Text-to-Speech adapter.

use super::{
    build_provider_http_client, error_for_response, map_http_error, SpeechClient, SpeechRequest,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

pub struct GoogleSpeechClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    project: Option<String>,
}

impl GoogleSpeechClient {
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        project: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_provider_http_client()?,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            project,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

fn build_body(request: &SpeechRequest) -> SynthesizeBody<'_> {
    SynthesizeBody {
        input: SynthesisInput {
            text: &request.text,
        },
        voice: VoiceSelection {
            language_code: &request.language_code,
            name: &request.voice,
        },
        audio_config: AudioConfig {
            audio_encoding: &request.audio_encoding,
        },
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Pull the base64 `audioContent` out of a synthesize response.
fn decode_audio(body: &Value) -> Result<Vec<u8>, ProviderError> {
    let response: SynthesizeResponse = serde_json::from_value(body.clone())
        .map_err(|e| ProviderError::MalformedResponse(format!("unexpected response shape: {}", e)))?;
    let encoded = response
        .audio_content
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::MalformedResponse("response has no audioContent".into()))?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ProviderError::MalformedResponse(format!("audioContent is not base64: {}", e)))
}

#[async_trait]
impl SpeechClient for GoogleSpeechClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ProviderError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&build_body(request));
        if let Some(project) = &self.project {
            builder = builder.header("X-Goog-User-Project", project);
        }
        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {}", e)))?;
        decode_audio(&body)
    }

    fn provider_name(&self) -> &str {
        "google-tts"
    }
}
