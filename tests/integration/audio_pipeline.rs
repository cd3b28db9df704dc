//! Audio stage runs against a scripted speech client.

use super::test_utils::{detail_payload, fast_driver, ScriptedSpeech};
use lexis::audio::{AudioSettings, AudioStage};
use lexis::checkpoint::{CheckpointDocument, CheckpointStore, JsonCheckpointStore};
use lexis::normalize::Record;
use lexis::pipeline::RunState;
use lexis::stats::StatisticsProfile;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn settings(audio_dir: &Path, voices: &[&str]) -> AudioSettings {
    AudioSettings {
        voices: voices.iter().map(|v| v.to_string()).collect(),
        language_code: "en-US".to_string(),
        audio_encoding: "MP3".to_string(),
        audio_dir: audio_dir.to_path_buf(),
    }
}

fn dictionary(path: &Path, words: &[&str]) -> JsonCheckpointStore {
    let mut document = CheckpointDocument::new();
    for word in words {
        let record: Record = serde_json::from_str(&detail_payload(word)).unwrap();
        let letter = word[..1].to_uppercase();
        document.merge(&letter, vec![(word.to_string(), record)], StatisticsProfile::Detailed);
    }
    let store = JsonCheckpointStore::new(path);
    store.save(&document).unwrap();
    store
}

#[tokio::test]
async fn test_audio_run_writes_clips_then_resumes_with_nothing_to_do() {
    let temp_dir = TempDir::new().unwrap();
    let audio_dir = temp_dir.path().join("audio");
    let voices = ["en-US-Chirp3-HD-Puck", "en-US-Chirp3-HD-Umbriel"];
    let store = dictionary(&temp_dir.path().join("dictionary.json"), &["abate", "bane"]);

    let mut stage = AudioStage::new(ScriptedSpeech::new(), store.clone(), settings(&audio_dir, &voices));
    let report = fast_driver(1).run(&mut stage).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.succeeded.len(), 8);
    assert_eq!(stage.client().calls(), 8);

    let clip = audio_dir.join("abate-example_and_sample-Puck.mp3");
    let bytes = fs::read_to_string(&clip).unwrap();
    assert!(bytes.starts_with("en-US-Chirp3-HD-Puck|abate...abate means: Meaning of abate"));
    let pronunciation = fs::read_to_string(audio_dir.join("bane-pronunciation-Umbriel.mp3")).unwrap();
    assert_eq!(pronunciation, "en-US-Chirp3-HD-Umbriel|..bane..");

    let mut again = AudioStage::new(ScriptedSpeech::new(), store, settings(&audio_dir, &voices));
    let report = fast_driver(1).run(&mut again).await.unwrap();
    assert_eq!(report.pending, 0);
    assert_eq!(again.client().calls(), 0);
}

#[tokio::test]
async fn test_failed_clip_stays_pending() {
    let temp_dir = TempDir::new().unwrap();
    let audio_dir = temp_dir.path().join("audio");
    let voices = ["en-US-Chirp3-HD-Puck"];
    let store = dictionary(&temp_dir.path().join("dictionary.json"), &["abate", "bane"]);

    let mut stage = AudioStage::new(
        ScriptedSpeech::failing_on("..bane.."),
        store.clone(),
        settings(&audio_dir, &voices),
    );
    let report = fast_driver(2).run(&mut stage).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, "bane-pronunciation-Puck.mp3");
    assert_eq!(report.failed[0].attempts, 3);
    assert_eq!(report.succeeded.len(), 3);
    assert!(!audio_dir.join("bane-pronunciation-Puck.mp3").exists());

    let document = store.load().unwrap();
    let (pending, _) = lexis::audio::pending_clips(&document, &settings(&audio_dir, &voices));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "bane-pronunciation-Puck.mp3");
}
