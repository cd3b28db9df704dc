//! Work-Item Catalog
//!
//! Enumerates the key space of a stage and derives the pending subset from the
//! target checkpoint. Restarting a run means calling [`Catalog::pending`] again
//! on whatever is on disk.

use crate::checkpoint::CheckpointDocument;
use tracing::{debug, info};

/// Identifier of one unit of work.
pub trait WorkKey {
    fn key(&self) -> &str;
}

/// A letter or a word, plus the letter bucket it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub letter: String,
    pub key: String,
}

impl WorkItem {
    pub fn letter(letter: char) -> Self {
        let letter = letter.to_string();
        Self {
            key: letter.clone(),
            letter,
        }
    }

    pub fn word(letter: &str, word: &str) -> Self {
        Self {
            letter: letter.to_string(),
            key: word.to_string(),
        }
    }
}

impl WorkKey for WorkItem {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Letters A to Z.
pub fn letters() -> impl Iterator<Item = char> {
    'A'..='Z'
}

/// Key space of a text stage.
#[derive(Debug, Clone)]
pub enum Catalog {
    /// One item per letter; satisfied once its bucket holds any words
    Letters,
    /// One item per word of a prior stage's document
    Words { source: CheckpointDocument },
}

impl Catalog {
    /// Items with no usable record in `target`, in processing order.
    pub fn pending(&self, target: &CheckpointDocument) -> Vec<WorkItem> {
        let mut pending = Vec::new();
        let mut satisfied = 0usize;

        match self {
            Catalog::Letters => {
                for letter in letters() {
                    let item = WorkItem::letter(letter);
                    let done = target
                        .bucket(&item.letter)
                        .map(|b| b.statistics.total_words > 0)
                        .unwrap_or(false);
                    if done {
                        debug!(key = %item.key, "Skipping letter, already has words");
                        satisfied += 1;
                    } else {
                        pending.push(item);
                    }
                }
            }
            Catalog::Words { source } => {
                for (letter, bucket) in source.buckets() {
                    for word in bucket.words.keys() {
                        if target.contains_word(letter, word) {
                            debug!(key = %word, letter = %letter, "Skipping word, already processed");
                            satisfied += 1;
                        } else {
                            pending.push(WorkItem::word(letter, word));
                        }
                    }
                }
            }
        }

        info!(
            pending = pending.len(),
            satisfied,
            "Derived pending work items"
        );
        pending
    }

    /// Letters whose buckets the target should carry, even when empty.
    pub fn letters(&self) -> Vec<String> {
        match self {
            Catalog::Letters => letters().map(String::from).collect(),
            Catalog::Words { source } => source.buckets().map(|(l, _)| l.clone()).collect(),
        }
    }
}
