//! Shared test utilities for integration tests
//!
//! Scripted providers keyed by work item, a store that fails on demand, and a
//! mutex for tests that touch process environment variables.

use async_trait::async_trait;
use lexis::checkpoint::{CheckpointDocument, CheckpointStore, JsonCheckpointStore};
use lexis::error::{ProviderError, StorageError};
use lexis::pipeline::Driver;
use lexis::provider::{GenerationClient, GenerationRequest, SpeechClient, SpeechRequest};
use lexis::retry::RetryPolicy;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Serializes tests that set or remove environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Driver with no backoff and no pacing.
pub fn fast_driver(max_retries: u32) -> Driver {
    Driver::new(
        RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO),
        Duration::ZERO,
    )
}

/// Work-item key carried by a generation prompt: the word for detail
/// prompts, the letter for word-list prompts.
pub fn prompt_key(prompt: &str) -> String {
    if let Some(rest) = prompt.split("English word '").nth(1) {
        if let Some((word, _)) = rest.split_once("' starting") {
            return word.to_string();
        }
    }
    if let Some((head, _)) = prompt.split_once("', suitable") {
        if let Some(letter) = head.chars().last() {
            return letter.to_string();
        }
    }
    String::new()
}

/// Word-list payload with two words for `letter`.
pub fn letter_payload(letter: &str) -> String {
    json!({
        format!("{}rcane", letter): {
            "complexity": "Advanced",
            "definition": format!("A word starting with {}", letter),
            "example": "It appears in a sentence."
        },
        format!("{}mple", letter): {
            "complexity": "Intermediate",
            "definition": "Enough or more than enough.",
            "example": "There was ample time."
        }
    })
    .to_string()
}

/// Full dictionary entry for `word`.
pub fn detail_payload(word: &str) -> String {
    json!({
        "complexity": "Advanced",
        "pronunciation": {"General_American_GA_pronunciation_us": "/x/"},
        "phonetic_respelling": "ex",
        "ssml_phoneme": "ph=\"x\"",
        "meanings": [{
            "part_of_speech": "Noun",
            "definitions": [{
                "definition": format!("Meaning of {}", word),
                "example": format!("A sentence with {}.", word),
                "synonyms": ["s"],
                "antonyms": ["a"]
            }]
        }],
        "word_origin": "Latin",
        "word_roots": [{"root": "x", "meaning": "y"}]
    })
    .to_string()
}

type Fallback = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// Generation client answering from per-key scripts, then a fallback.
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, ProviderError>>>>,
    fallback: Fallback,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(fallback: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Box::new(fallback),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every letter with [`letter_payload`].
    pub fn letters() -> Self {
        Self::new(|key| Ok(letter_payload(key)))
    }

    /// Answers every word with [`detail_payload`].
    pub fn details() -> Self {
        Self::new(|key| Ok(detail_payload(key)))
    }

    pub fn script(self, key: &str, responses: Vec<Result<String, ProviderError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), responses.into());
        self
    }

    /// Keys in call order, one entry per invocation.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let key = prompt_key(&request.prompt);
        self.calls.lock().unwrap().push(key.clone());
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(response) => response,
            None => (self.fallback)(&key),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Speech client returning fixed bytes, optionally failing for texts that
/// contain a marker.
pub struct ScriptedSpeech {
    fail_marker: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedSpeech {
    pub fn new() -> Self {
        Self {
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechClient for ScriptedSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if request.text.contains(marker.as_str()) {
                return Err(ProviderError::RequestFailed("synthesis unavailable".into()));
            }
        }
        Ok(format!("{}|{}", request.voice, request.text).into_bytes())
    }

    fn provider_name(&self) -> &str {
        "scripted-speech"
    }
}

/// JSON store whose `fail_on`-th save (1-based) fails without touching disk.
pub struct FailingStore {
    inner: JsonCheckpointStore,
    fail_on: usize,
    saves: AtomicUsize,
}

impl FailingStore {
    pub fn new(path: impl Into<PathBuf>, fail_on: usize) -> Self {
        Self {
            inner: JsonCheckpointStore::new(path),
            fail_on,
            saves: AtomicUsize::new(0),
        }
    }
}

impl CheckpointStore for FailingStore {
    fn load(&self) -> Result<CheckpointDocument, StorageError> {
        self.inner.load()
    }

    fn save(&self, document: &CheckpointDocument) -> Result<(), StorageError> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(StorageError::Write {
                path: self.inner.path().to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.save(document)
    }

    fn backup(&self) -> Result<Option<PathBuf>, StorageError> {
        self.inner.backup()
    }

    fn exists(&self) -> bool {
        self.inner.exists()
    }
}
