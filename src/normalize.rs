//! Response Normalization
//!
//! Turns the raw text returned by a generation provider into JSON records.
//! Decoding can fail (and is retried as a malformed response); default-filling
//! never fails, it repairs the record and reports what it substituted.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One enrichment record: field name to value.
pub type Record = Map<String, Value>;

const CODE_FENCE: &str = "```";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Complexity tier assigned to every word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    /// Baseline tier, used whenever the upstream value is missing or unknown
    #[default]
    Intermediate,
    Advanced,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Intermediate => "Intermediate",
            Complexity::Advanced => "Advanced",
        }
    }

    /// Parse an exact tier name. Anything else is not a recognized tier.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "Intermediate" => Some(Complexity::Intermediate),
            "Advanced" => Some(Complexity::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a default was written into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionReason {
    Missing,
    Invalid(String),
}

/// A default filled in for a required field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub key: String,
    pub field: &'static str,
    pub reason: SubstitutionReason,
    pub default: String,
}

impl std::fmt::Display for Substitution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            SubstitutionReason::Missing => write!(
                f,
                "'{}': missing {}, defaulted to '{}'",
                self.key, self.field, self.default
            ),
            SubstitutionReason::Invalid(found) => write!(
                f,
                "'{}': invalid {} {}, defaulted to '{}'",
                self.key, self.field, found, self.default
            ),
        }
    }
}

/// Records produced from one payload, plus the substitutions made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub entries: Vec<(String, Record)>,
    pub substitutions: Vec<Substitution>,
}

/// Remove wrapping artifacts around a JSON payload.
///
/// Rules, in order:
/// 1. strip a leading byte-order mark and trim surrounding whitespace;
/// 2. when the text opens with a Markdown code fence, drop the whole opening
///    line (the fence and its optional language tag, e.g. ```` ```json ````);
/// 3. when the text then closes with a code fence, drop it;
/// 4. trim again.
///
/// Text without fences is returned trimmed and otherwise untouched.
pub fn strip_wrapping(raw: &str) -> &str {
    let mut text = raw.trim_start_matches(BYTE_ORDER_MARK).trim();

    if text.starts_with(CODE_FENCE) {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            // Single line such as ```{"a":1}```
            None => text[CODE_FENCE.len()..].trim_start_matches("json"),
        };
        text = text.trim_end();
        if let Some(stripped) = text.strip_suffix(CODE_FENCE) {
            text = stripped;
        }
    }

    text.trim()
}

/// Strip wrapping artifacts and parse the payload as a JSON object.
pub fn decode_object(raw: &str) -> Result<Record, ProviderError> {
    let text = strip_wrapping(raw);
    if text.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "empty response payload".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(text).map_err(|e| {
        ProviderError::MalformedResponse(format!(
            "payload is not valid JSON ({} characters): {}",
            text.len(),
            e
        ))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ProviderError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Make sure `record.complexity` is a recognized tier.
pub fn fill_complexity(key: &str, record: &mut Record) -> Option<Substitution> {
    let reason = match record.get("complexity") {
        Some(value) if Complexity::from_value(value).is_some() => return None,
        Some(value) => SubstitutionReason::Invalid(value.to_string()),
        None => SubstitutionReason::Missing,
    };
    let default = Complexity::default();
    record.insert(
        "complexity".to_string(),
        Value::String(default.as_str().to_string()),
    );
    Some(Substitution {
        key: key.to_string(),
        field: "complexity",
        reason,
        default: default.as_str().to_string(),
    })
}

/// Make sure `record[field]` is a non-empty string, defaulting to `""`.
pub fn fill_text(key: &str, record: &mut Record, field: &'static str) -> Option<Substitution> {
    let reason = match record.get(field) {
        Some(Value::String(s)) if !s.is_empty() => return None,
        Some(Value::String(_)) | Some(Value::Null) | None => SubstitutionReason::Missing,
        Some(other) => SubstitutionReason::Invalid(other.to_string()),
    };
    record.insert(field.to_string(), Value::String(String::new()));
    Some(Substitution {
        key: key.to_string(),
        field,
        reason,
        default: String::new(),
    })
}

/// Log each substitution at warn level.
pub fn log_substitutions(substitutions: &[Substitution]) {
    for substitution in substitutions {
        warn!(
            key = %substitution.key,
            field = substitution.field,
            default = %substitution.default,
            "{}",
            substitution
        );
    }
}

/// Python-style truthiness used by presence statistics.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
