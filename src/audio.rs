//! Audio stage
//!
//! Synthesizes an example clip and a pronunciation clip per word and voice.
//! There is no JSON checkpoint here: a clip is done when its file exists.

use crate::catalog::{WorkItem, WorkKey};
use crate::checkpoint::{CheckpointDocument, CheckpointStore};
use crate::error::{ProviderError, StorageError};
use crate::pipeline::Stage;
use crate::provider::{SpeechClient, SpeechRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_VOICES: [&str; 3] = [
    "en-US-Chirp3-HD-Umbriel",
    "en-US-Chirp3-HD-Iapetus",
    "en-US-Chirp3-HD-Puck",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    ExampleAndSample,
    Pronunciation,
}

impl ClipKind {
    pub const ALL: [ClipKind; 2] = [ClipKind::ExampleAndSample, ClipKind::Pronunciation];

    pub fn as_str(self) -> &'static str {
        match self {
            ClipKind::ExampleAndSample => "example_and_sample",
            ClipKind::Pronunciation => "pronunciation",
        }
    }
}

/// Voice and output format for a run.
#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub voices: Vec<String>,
    pub language_code: String,
    pub audio_encoding: String,
    pub audio_dir: PathBuf,
}

/// One clip to synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipItem {
    /// File name, unique per word, kind and voice
    pub name: String,
    pub item: WorkItem,
    pub voice: String,
    pub kind: ClipKind,
    pub text: String,
    pub path: PathBuf,
}

impl WorkKey for ClipItem {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Last `-`-separated segment of a voice id (`en-US-Chirp3-HD-Puck` -> `Puck`).
pub fn voice_short_name(voice: &str) -> &str {
    voice.rsplit('-').next().unwrap_or(voice)
}

/// File extension for a synthesize audio encoding.
pub fn extension_for(encoding: &str) -> &'static str {
    match encoding.to_ascii_uppercase().as_str() {
        "LINEAR16" => "wav",
        "OGG_OPUS" => "ogg",
        "MULAW" | "ALAW" => "wav",
        _ => "mp3",
    }
}

/// `<word>-<kind>-<voice short name>.<ext>`
pub fn clip_file_name(word: &str, kind: ClipKind, voice: &str, encoding: &str) -> String {
    let word: String = word
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!(
        "{}-{}-{}.{}",
        word,
        kind.as_str(),
        voice_short_name(voice),
        extension_for(encoding)
    )
}

/// Definition and example of the first definition of the first meaning,
/// falling back to top-level fields (word-list records).
fn definition_and_example(record: &Value) -> (Option<&str>, Option<&str>) {
    let first = record
        .get("meanings")
        .and_then(|m| m.get(0))
        .and_then(|m| m.get("definitions"))
        .and_then(|d| d.get(0));
    let field = |name: &str| {
        first
            .and_then(|d| d.get(name))
            .or_else(|| record.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    };
    (field("definition"), field("example"))
}

pub fn example_text(word: &str, definition: &str, example: &str) -> String {
    format!("{word}...{word} means: {definition} Example: {example}")
}

pub fn pronunciation_text(word: &str) -> String {
    format!("..{}..", word)
}

/// Every clip still missing on disk, plus the number of words skipped for
/// lack of a definition or example.
pub fn pending_clips(document: &CheckpointDocument, settings: &AudioSettings) -> (Vec<ClipItem>, usize) {
    let mut clips = Vec::new();
    let mut skipped = 0usize;
    let mut existing = 0usize;

    for (letter, bucket) in document.buckets() {
        for (word, record) in &bucket.words {
            let (Some(definition), Some(example)) = definition_and_example(record) else {
                warn!(word = %word, "Skipping word without definition or example");
                skipped += 1;
                continue;
            };

            for voice in &settings.voices {
                for kind in ClipKind::ALL {
                    let name = clip_file_name(word, kind, voice, &settings.audio_encoding);
                    let path = settings.audio_dir.join(&name);
                    if path.exists() {
                        debug!(path = ?path, "Audio file already exists");
                        existing += 1;
                        continue;
                    }
                    let text = match kind {
                        ClipKind::ExampleAndSample => example_text(word, definition, example),
                        ClipKind::Pronunciation => pronunciation_text(word),
                    };
                    clips.push(ClipItem {
                        name,
                        item: WorkItem::word(letter, word),
                        voice: voice.clone(),
                        kind,
                        text,
                        path,
                    });
                }
            }
        }
    }

    info!(pending = clips.len(), existing, skipped, "Derived pending audio clips");
    (clips, skipped)
}

/// Write bytes next to `path` and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    let temp_path = path.with_file_name(name);
    fs::write(&temp_path, bytes).map_err(|source| StorageError::Write {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, path).map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub struct AudioStage<C, K> {
    client: C,
    dictionary: K,
    settings: AudioSettings,
    clips: Vec<ClipItem>,
    skipped: usize,
}

impl<C: SpeechClient, K: CheckpointStore> AudioStage<C, K> {
    pub fn new(client: C, dictionary: K, settings: AudioSettings) -> Self {
        Self {
            client,
            dictionary,
            settings,
            clips: Vec::new(),
            skipped: 0,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: SpeechClient, K: CheckpointStore> Stage for AudioStage<C, K> {
    type Item = ClipItem;
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "audio"
    }

    fn load(&mut self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.settings.audio_dir).map_err(|source| StorageError::Write {
            path: self.settings.audio_dir.clone(),
            source,
        })?;
        let document = self.dictionary.load()?;
        let (clips, skipped) = pending_clips(&document, &self.settings);
        self.clips = clips;
        self.skipped = skipped;
        Ok(())
    }

    fn pending(&self) -> Vec<ClipItem> {
        self.clips.clone()
    }

    fn skipped(&self) -> usize {
        self.skipped
    }

    async fn attempt(&self, clip: &ClipItem) -> Result<Vec<u8>, ProviderError> {
        let request = SpeechRequest {
            text: clip.text.clone(),
            voice: clip.voice.clone(),
            language_code: self.settings.language_code.clone(),
            audio_encoding: self.settings.audio_encoding.clone(),
        };
        let audio = self.client.synthesize(&request).await?;
        if audio.is_empty() {
            return Err(ProviderError::MalformedResponse("empty audio content".into()));
        }
        Ok(audio)
    }

    fn commit(&mut self, clip: &ClipItem, audio: Vec<u8>) -> Result<usize, StorageError> {
        write_atomic(&clip.path, &audio)?;
        info!(
            path = ?clip.path,
            voice = voice_short_name(&clip.voice),
            kind = clip.kind.as_str(),
            bytes = audio.len(),
            "Wrote audio clip"
        );
        Ok(0)
    }
}
