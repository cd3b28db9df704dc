//! Checkpoint Store
//!
//! The durable JSON document a stage loads at start and saves after every
//! successful item. Layout: letter -> bucket, buckets ordered alphabetically,
//! words within a bucket kept in insertion order.

use crate::error::StorageError;
use crate::normalize::Record;
use crate::stats::{Statistics, StatisticsProfile};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// All records for one letter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LetterBucket {
    pub letter: String,
    pub description: String,
    pub words: Map<String, Value>,
    pub statistics: Statistics,
}

impl LetterBucket {
    pub fn new(letter: &str) -> Self {
        Self {
            letter: letter.to_string(),
            description: format!("Words starting with letter {}", letter),
            words: Map::new(),
            statistics: Statistics::default(),
        }
    }
}

/// Letter -> bucket mapping persisted as one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointDocument {
    buckets: BTreeMap<String, LetterBucket>,
}

impl CheckpointDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, letter: &str) -> Option<&LetterBucket> {
        self.buckets.get(letter)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&String, &LetterBucket)> {
        self.buckets.iter()
    }

    /// Get the bucket for `letter`, creating an empty one if needed.
    pub fn ensure_bucket(&mut self, letter: &str) -> &mut LetterBucket {
        self.buckets
            .entry(letter.to_string())
            .or_insert_with(|| LetterBucket::new(letter))
    }

    /// Does the target already hold a record for `word` under `letter`?
    pub fn contains_word(&self, letter: &str, word: &str) -> bool {
        self.buckets
            .get(letter)
            .map(|b| b.words.contains_key(word))
            .unwrap_or(false)
    }

    /// Insert or overwrite records, then recompute the bucket statistics.
    pub fn merge(
        &mut self,
        letter: &str,
        entries: Vec<(String, Record)>,
        profile: StatisticsProfile,
    ) {
        let bucket = self.ensure_bucket(letter);
        for (word, record) in entries {
            bucket.words.insert(word, Value::Object(record));
        }
        bucket.statistics = Statistics::compute(&bucket.words, profile);
    }

    /// Recompute the statistics of every bucket from its records.
    pub fn refresh_statistics(&mut self, profile: StatisticsProfile) {
        for bucket in self.buckets.values_mut() {
            bucket.statistics = Statistics::compute(&bucket.words, profile);
        }
    }

    /// Letters whose stored statistics differ from their records.
    pub fn statistics_drift(&self, profile: StatisticsProfile) -> Vec<String> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| bucket.statistics != Statistics::compute(&bucket.words, profile))
            .map(|(letter, _)| letter.clone())
            .collect()
    }

    pub fn total_words(&self) -> usize {
        self.buckets.values().map(|b| b.words.len()).sum()
    }

    /// Letters with at least one stored word.
    pub fn completed_letters(&self) -> usize {
        self.buckets.values().filter(|b| !b.words.is_empty()).count()
    }
}

/// Durable storage for a checkpoint document.
pub trait CheckpointStore: Send + Sync {
    /// Load prior state. A missing or malformed document yields an empty one.
    fn load(&self) -> Result<CheckpointDocument, StorageError>;

    /// Persist the full document atomically.
    fn save(&self, document: &CheckpointDocument) -> Result<(), StorageError>;

    /// Copy the existing checkpoint aside before a fresh start.
    fn backup(&self) -> Result<Option<PathBuf>, StorageError>;

    /// Whether a checkpoint already exists.
    fn exists(&self) -> bool;
}

/// Checkpoint kept as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<stem>_backup.json` next to the checkpoint.
    pub fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".to_string());
        self.path.with_file_name(format!("{}_backup.json", stem))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> Result<CheckpointDocument, StorageError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No checkpoint found, starting empty");
            return Ok(CheckpointDocument::new());
        }

        let text = fs::read_to_string(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;

        match serde_json::from_str::<CheckpointDocument>(&text) {
            Ok(document) => {
                info!(
                    path = ?self.path,
                    words = document.total_words(),
                    letters = document.completed_letters(),
                    "Loaded checkpoint"
                );
                Ok(document)
            }
            Err(e) => {
                error!(
                    path = ?self.path,
                    error = %e,
                    "Checkpoint is not valid JSON, starting empty"
                );
                Ok(CheckpointDocument::new())
            }
        }
    }

    fn save(&self, document: &CheckpointDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let serialized = serde_json::to_string_pretty(document)?;

        // Write to temp file first, then rename (atomic operation)
        let temp_path = self.temp_path();
        fs::write(&temp_path, serialized).map_err(|source| StorageError::Write {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = ?self.path, words = document.total_words(), "Saved checkpoint");
        Ok(())
    }

    fn backup(&self) -> Result<Option<PathBuf>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.backup_path();
        fs::copy(&self.path, &backup).map_err(|source| StorageError::Write {
            path: backup.clone(),
            source,
        })?;
        info!(from = ?self.path, to = ?backup, "Backed up existing checkpoint");
        Ok(Some(backup))
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}
