//! Statistics Aggregation
//!
//! Read-side counts derived from checkpoint records. Nothing here is
//! authoritative: bucket statistics are always recomputed from the full record
//! set, and summaries are rebuilt from the document on demand.

use crate::checkpoint::CheckpointDocument;
use crate::normalize::{is_present, Complexity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Which statistics a stage keeps per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsProfile {
    /// Counts, complexity, word lengths and parts of speech
    Basic,
    /// Basic plus presence counts for pronunciation, origin, respelling and SSML
    Detailed,
}

/// Per-bucket statistics as stored in the checkpoint document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub total_words: usize,
    pub complexity_distribution: BTreeMap<String, usize>,
    pub word_length_stats: BTreeMap<usize, usize>,
    pub part_of_speech_distribution: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation_stats: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_stats: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonetic_stats: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssml_stats: Option<BTreeMap<String, usize>>,
}

/// Presence counters: (stats name, record field, label used in the keys)
const PRESENCE_FIELDS: [(&str, &str, &str); 4] = [
    ("pronunciation", "pronunciation", "pronunciation"),
    ("origin", "word_origin", "origin"),
    ("phonetic", "phonetic_respelling", "phonetic_respelling"),
    ("ssml", "ssml_phoneme", "ssml_phoneme"),
];

impl Statistics {
    /// Compute statistics from a bucket's words.
    pub fn compute(words: &Map<String, Value>, profile: StatisticsProfile) -> Self {
        let mut stats = Statistics {
            total_words: words.len(),
            ..Default::default()
        };

        let mut presence: [BTreeMap<String, usize>; 4] = Default::default();
        if profile == StatisticsProfile::Detailed {
            for ((_, _, label), counts) in PRESENCE_FIELDS.iter().zip(presence.iter_mut()) {
                counts.insert(format!("has_{}", label), 0);
                counts.insert(format!("no_{}", label), 0);
            }
        }

        for (word, value) in words {
            let record = value.as_object();

            let complexity = record
                .and_then(|r| r.get("complexity"))
                .and_then(Complexity::from_value)
                .unwrap_or_default();
            *stats
                .complexity_distribution
                .entry(complexity.as_str().to_string())
                .or_default() += 1;

            *stats
                .word_length_stats
                .entry(word.chars().count())
                .or_default() += 1;

            for meaning in meanings(record) {
                let pos = meaning
                    .get("part_of_speech")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown");
                *stats
                    .part_of_speech_distribution
                    .entry(pos.to_string())
                    .or_default() += 1;
            }

            if profile == StatisticsProfile::Detailed {
                for ((_, field, label), counts) in PRESENCE_FIELDS.iter().zip(presence.iter_mut())
                {
                    let key = if is_present(record.and_then(|r| r.get(*field))) {
                        format!("has_{}", label)
                    } else {
                        format!("no_{}", label)
                    };
                    *counts.entry(key).or_default() += 1;
                }
            }
        }

        if profile == StatisticsProfile::Detailed {
            let [pronunciation, origin, phonetic, ssml] = presence;
            stats.pronunciation_stats = Some(pronunciation);
            stats.origin_stats = Some(origin);
            stats.phonetic_stats = Some(phonetic);
            stats.ssml_stats = Some(ssml);
        }

        stats
    }
}

fn meanings(record: Option<&Map<String, Value>>) -> impl Iterator<Item = &Map<String, Value>> {
    record
        .and_then(|r| r.get("meanings"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn definitions(record: Option<&Map<String, Value>>) -> impl Iterator<Item = &Map<String, Value>> {
    meanings(record)
        .filter_map(|m| m.get("definitions").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
}

/// Fields checked by the completeness report, in display order.
pub const COMPLETENESS_FIELDS: [&str; 13] = [
    "complexity",
    "definition",
    "example",
    "pronunciation",
    "phonetic_respelling",
    "ssml_phoneme",
    "meanings",
    "part_of_speech",
    "synonyms",
    "antonyms",
    "word_origin",
    "word_roots",
    "verb_forms",
];

/// Fields a word-list record carries at its top level.
pub const WORD_LIST_FIELDS: [&str; 3] = ["complexity", "definition", "example"];

impl StatisticsProfile {
    /// Completeness fields checked for documents kept with this profile.
    pub fn completeness_fields(self) -> &'static [&'static str] {
        match self {
            StatisticsProfile::Basic => &WORD_LIST_FIELDS,
            StatisticsProfile::Detailed => &COMPLETENESS_FIELDS,
        }
    }

    /// Which of [`Self::completeness_fields`] `record` is missing.
    pub fn missing_fields(self, record: &Map<String, Value>) -> Vec<&'static str> {
        match self {
            StatisticsProfile::Basic => WORD_LIST_FIELDS
                .iter()
                .copied()
                .filter(|field| !is_present(record.get(*field)))
                .collect(),
            StatisticsProfile::Detailed => missing_fields(record),
        }
    }
}

/// Which completeness fields a single dictionary record is missing.
///
/// `verb_forms` only counts for words with at least one verb meaning.
pub fn missing_fields(record: &Map<String, Value>) -> Vec<&'static str> {
    let record = Some(record);
    let has_definition_field = |field: &str| definitions(record).any(|d| is_present(d.get(field)));
    let is_verb = meanings(record)
        .any(|m| m.get("part_of_speech").and_then(Value::as_str) == Some("Verb"));
    let has_verb_forms = meanings(record).any(|m| {
        m.get("verb_forms")
            .and_then(Value::as_object)
            .map(|forms| forms.values().any(|v| is_present(Some(v))))
            .unwrap_or(false)
    });

    COMPLETENESS_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            let present = match *field {
                "definition" | "example" | "synonyms" | "antonyms" => has_definition_field(field),
                "meanings" => meanings(record).next().is_some(),
                "part_of_speech" => meanings(record).any(|m| is_present(m.get("part_of_speech"))),
                "verb_forms" => !is_verb || has_verb_forms,
                other => is_present(record.and_then(|r| r.get(other))),
            };
            !present
        })
        .collect()
}

/// One row of a document summary.
#[derive(Debug, Clone, Serialize)]
pub struct LetterSummary {
    pub letter: String,
    pub words: usize,
    pub complexity_distribution: BTreeMap<String, usize>,
    pub complete_words: usize,
}

/// Whole-document view used by the `stats` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentSummary {
    pub letters: Vec<LetterSummary>,
    pub total_words: usize,
    pub completed_letters: usize,
    pub complexity_distribution: BTreeMap<String, usize>,
    pub word_length_stats: BTreeMap<usize, usize>,
    pub part_of_speech_distribution: BTreeMap<String, usize>,
    /// Number of records that have each completeness field
    pub field_coverage: BTreeMap<&'static str, usize>,
    /// (word, missing fields) for every record with gaps
    pub incomplete_words: Vec<(String, Vec<&'static str>)>,
}

impl DocumentSummary {
    /// Summarize `document`, judging completeness by the fields `profile` keeps.
    pub fn from_document(document: &CheckpointDocument, profile: StatisticsProfile) -> Self {
        let fields = profile.completeness_fields();
        let mut summary = DocumentSummary::default();
        for &field in fields {
            summary.field_coverage.insert(field, 0);
        }

        for (letter, bucket) in document.buckets() {
            let stats = Statistics::compute(&bucket.words, StatisticsProfile::Basic);
            let mut complete_words = 0;

            for (word, value) in &bucket.words {
                let empty = Map::new();
                let record = value.as_object().unwrap_or(&empty);
                let missing = profile.missing_fields(record);
                for &field in fields {
                    if !missing.contains(&field) {
                        *summary.field_coverage.entry(field).or_default() += 1;
                    }
                }
                if missing.is_empty() {
                    complete_words += 1;
                } else {
                    summary.incomplete_words.push((word.clone(), missing));
                }
            }

            merge_counts(&mut summary.complexity_distribution, &stats.complexity_distribution);
            merge_counts(&mut summary.word_length_stats, &stats.word_length_stats);
            merge_counts(
                &mut summary.part_of_speech_distribution,
                &stats.part_of_speech_distribution,
            );
            summary.total_words += stats.total_words;
            if stats.total_words > 0 {
                summary.completed_letters += 1;
            }
            summary.letters.push(LetterSummary {
                letter: letter.clone(),
                words: stats.total_words,
                complexity_distribution: stats.complexity_distribution,
                complete_words,
            });
        }

        summary
    }

    /// Share of records that have `field`, in percent.
    pub fn coverage_percent(&self, field: &str) -> f64 {
        let count = self.field_coverage.get(field).copied().unwrap_or(0);
        percent(count, self.total_words)
    }
}

/// Progress of one letter against the source word list.
#[derive(Debug, Clone, Serialize)]
pub struct LetterProgress {
    pub letter: String,
    pub processed: usize,
    pub available: usize,
}

/// Progress of the dictionary against the word list it is built from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSummary {
    pub letters: Vec<LetterProgress>,
    pub processed: usize,
    pub available: usize,
}

impl ProgressSummary {
    pub fn compute(source: &CheckpointDocument, target: &CheckpointDocument) -> Self {
        let mut summary = ProgressSummary::default();
        for (letter, bucket) in source.buckets() {
            let available = bucket.words.len();
            if available == 0 {
                continue;
            }
            let processed = target
                .bucket(letter)
                .map(|b| b.words.keys().filter(|w| bucket.words.contains_key(*w)).count())
                .unwrap_or(0);
            summary.processed += processed;
            summary.available += available;
            summary.letters.push(LetterProgress {
                letter: letter.clone(),
                processed,
                available,
            });
        }
        summary
    }

    pub fn percent(&self) -> f64 {
        percent(self.processed, self.available)
    }
}

pub fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn merge_counts<K: Ord + Clone>(into: &mut BTreeMap<K, usize>, from: &BTreeMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key.clone()).or_default() += count;
    }
}
