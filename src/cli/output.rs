//! CLI output: error mapping for the binary.

use crate::error::LexisError;

/// Map a LexisError to a user-facing message.
pub fn map_error(e: &LexisError) -> String {
    match e {
        LexisError::ConfigError(msg) => format!(
            "Configuration error: {}\nSee config/config.toml or the LEXIS__* environment variables.",
            msg
        ),
        LexisError::Aborted { key, .. } => format!(
            "{}\nThe checkpoint holds every item saved before '{}'; rerun to resume.",
            e, key
        ),
        other => other.to_string(),
    }
}
