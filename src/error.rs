//! Error types for the Lexis enrichment pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Classification of a failed adapter call, as seen by the retry controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network, authentication or rate-limit failure
    Transport,
    /// Empty, undecodable or structurally wrong payload
    MalformedResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

/// Provider-related errors. All of them are retryable.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::MalformedResponse(_) => FailureKind::MalformedResponse,
            ProviderError::RequestFailed(_)
            | ProviderError::AuthFailed(_)
            | ProviderError::RateLimit(_) => FailureKind::Transport,
        }
    }
}

/// A work item whose retry budget is exhausted. The key stays pending.
#[derive(Debug, Clone, Error)]
#[error("'{key}' failed after {attempts} attempt(s) ({kind}): {last_error}")]
pub struct TerminalFailure {
    pub key: String,
    pub kind: FailureKind,
    pub attempts: u32,
    pub last_error: ProviderError,
}

/// Checkpoint and artifact persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level errors surfaced to the CLI
#[derive(Debug, Error)]
pub enum LexisError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Run aborted at '{key}': {source}. Stopped to prevent data loss.")]
    Aborted {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Statistics drift detected in {0} bucket(s)")]
    StatisticsDrift(usize),
}

impl From<config::ConfigError> for LexisError {
    fn from(err: config::ConfigError) -> Self {
        LexisError::ConfigError(err.to_string())
    }
}
