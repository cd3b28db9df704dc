//! Configuration System
//!
//! Hierarchical configuration: built-in defaults, the user's global file, the
//! workspace files, then `LEXIS__SECTION__KEY` environment variables. Tests
//! included.

use crate::audio::{AudioSettings, DEFAULT_VOICES};
use crate::error::LexisError;
use crate::logging::LoggingConfig;
use crate::provider::{gemini, speech};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexisConfig {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generative text service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Inline key; prefer `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the key
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
}

fn default_generation_endpoint() -> String {
    gemini::DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    gemini::DEFAULT_MODEL.to_string()
}

fn default_generation_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_env: default_generation_key_env(),
        }
    }
}

impl GenerationConfig {
    /// The API key from config, or from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String, LexisError> {
        resolve_secret(self.api_key.as_deref(), Some(&self.api_key_env)).ok_or_else(|| {
            LexisError::ConfigError(format!(
                "No generation API key: set generation.api_key or the {} environment variable",
                self.api_key_env
            ))
        })
    }
}

/// Speech-synthesis service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    #[serde(default = "default_audio_encoding")]
    pub audio_encoding: String,

    #[serde(default = "default_voices")]
    pub voices: Vec<String>,

    /// Billing project sent as `X-Goog-User-Project`
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default = "default_project_env")]
    pub project_env: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_speech_key_env")]
    pub api_key_env: String,
}

fn default_speech_endpoint() -> String {
    speech::DEFAULT_ENDPOINT.to_string()
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_audio_encoding() -> String {
    "MP3".to_string()
}

fn default_voices() -> Vec<String> {
    DEFAULT_VOICES.iter().map(|v| v.to_string()).collect()
}

fn default_project_env() -> String {
    "GOOGLE_CLOUD_PROJECT".to_string()
}

fn default_speech_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: default_speech_endpoint(),
            language_code: default_language_code(),
            audio_encoding: default_audio_encoding(),
            voices: default_voices(),
            project: None,
            project_env: default_project_env(),
            api_key: None,
            api_key_env: default_speech_key_env(),
        }
    }
}

impl SpeechConfig {
    pub fn resolve_project(&self) -> Option<String> {
        resolve_secret(self.project.as_deref(), Some(&self.project_env))
    }

    /// Optional: the service may also accept project credentials alone.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(self.api_key.as_deref(), Some(&self.api_key_env))
    }
}

fn resolve_secret(inline: Option<&str>, env_name: Option<&str>) -> Option<String> {
    inline
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_name
                .filter(|name| !name.is_empty())
                .and_then(|name| std::env::var(name).ok())
                .filter(|v| !v.is_empty())
        })
}

pub const AUDIO_ENCODINGS: [&str; 5] = ["MP3", "LINEAR16", "OGG_OPUS", "MULAW", "ALAW"];

/// Retry and pacing for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTuning {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    /// Pause between consecutive items
    pub item_delay_ms: u64,
}

impl StageTuning {
    pub const WORDS: StageTuning = StageTuning {
        max_retries: 3,
        base_delay_ms: 2_000,
        jitter_ms: 0,
        item_delay_ms: 2_000,
    };

    pub const DETAILS: StageTuning = StageTuning {
        max_retries: 3,
        base_delay_ms: 5_000,
        jitter_ms: 1_000,
        item_delay_ms: 1_000,
    };

    pub const AUDIO: StageTuning = StageTuning {
        max_retries: 3,
        base_delay_ms: 2_000,
        jitter_ms: 1_000,
        item_delay_ms: 1_000,
    };

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.jitter_ms),
        )
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

fn default_words_tuning() -> StageTuning {
    StageTuning::WORDS
}

fn default_details_tuning() -> StageTuning {
    StageTuning::DETAILS
}

fn default_audio_tuning() -> StageTuning {
    StageTuning::AUDIO
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_words_tuning")]
    pub words: StageTuning,

    #[serde(default = "default_details_tuning")]
    pub details: StageTuning,

    #[serde(default = "default_audio_tuning")]
    pub audio: StageTuning,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            words: StageTuning::WORDS,
            details: StageTuning::DETAILS,
            audio: StageTuning::AUDIO,
        }
    }
}

/// Output locations, relative to the workspace unless absolute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_word_list")]
    pub word_list: PathBuf,

    #[serde(default = "default_dictionary")]
    pub dictionary: PathBuf,

    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

fn default_word_list() -> PathBuf {
    PathBuf::from("data/word_list.json")
}

fn default_dictionary() -> PathBuf {
    PathBuf::from("data/dictionary.json")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            word_list: default_word_list(),
            dictionary: default_dictionary(),
            audio_dir: default_audio_dir(),
        }
    }
}

impl StorageConfig {
    fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    pub fn word_list_path(&self, root: &Path) -> PathBuf {
        Self::resolve(root, &self.word_list)
    }

    pub fn dictionary_path(&self, root: &Path) -> PathBuf {
        Self::resolve(root, &self.dictionary)
    }

    pub fn audio_dir_path(&self, root: &Path) -> PathBuf {
        Self::resolve(root, &self.audio_dir)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Generation(String),
    Speech(String),
    Pipeline(String, String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Speech(msg) => write!(f, "Speech: {}", msg),
            ValidationError::Pipeline(stage, msg) => {
                write!(f, "Pipeline stage '{}': {}", stage, msg)
            }
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

const MAX_RETRIES_LIMIT: u32 = 10;

impl LexisConfig {
    /// Validate the entire configuration, reporting every problem at once
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.generation.model.trim().is_empty() {
            errors.push(ValidationError::Generation("model cannot be empty".into()));
        }
        if !is_http_url(&self.generation.endpoint) {
            errors.push(ValidationError::Generation(format!(
                "endpoint '{}' is not an http(s) URL",
                self.generation.endpoint
            )));
        }

        if !is_http_url(&self.speech.endpoint) {
            errors.push(ValidationError::Speech(format!(
                "endpoint '{}' is not an http(s) URL",
                self.speech.endpoint
            )));
        }
        if self.speech.voices.is_empty() {
            errors.push(ValidationError::Speech("at least one voice is required".into()));
        }
        if self.speech.language_code.trim().is_empty() {
            errors.push(ValidationError::Speech("language_code cannot be empty".into()));
        }
        if !AUDIO_ENCODINGS.contains(&self.speech.audio_encoding.to_ascii_uppercase().as_str()) {
            errors.push(ValidationError::Speech(format!(
                "unsupported audio_encoding '{}' (expected one of {})",
                self.speech.audio_encoding,
                AUDIO_ENCODINGS.join(", ")
            )));
        }

        for (stage, tuning) in [
            ("words", &self.pipeline.words),
            ("details", &self.pipeline.details),
            ("audio", &self.pipeline.audio),
        ] {
            if tuning.max_retries > MAX_RETRIES_LIMIT {
                errors.push(ValidationError::Pipeline(
                    stage.to_string(),
                    format!(
                        "max_retries {} exceeds the limit of {}",
                        tuning.max_retries, MAX_RETRIES_LIMIT
                    ),
                ));
            }
        }

        for (name, path) in [
            ("word_list", &self.storage.word_list),
            ("dictionary", &self.storage.dictionary),
            ("audio_dir", &self.storage.audio_dir),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::Storage(format!("{} cannot be empty", name)));
            }
        }
        if self.storage.word_list == self.storage.dictionary {
            errors.push(ValidationError::Storage(
                "word_list and dictionary must be different files".into(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Audio stage settings with paths resolved against `root`.
    pub fn audio_settings(&self, root: &Path) -> AudioSettings {
        AudioSettings {
            voices: self.speech.voices.clone(),
            language_code: self.speech.language_code.clone(),
            audio_encoding: self.speech.audio_encoding.to_ascii_uppercase(),
            audio_dir: self.storage.audio_dir_path(root),
        }
    }
}

/// Join validation errors into one configuration error.
pub fn validation_failure(errors: Vec<ValidationError>) -> LexisError {
    let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    LexisError::ConfigError(format!(
        "Configuration validation failed:\n{}",
        error_msgs.join("\n")
    ))
}
