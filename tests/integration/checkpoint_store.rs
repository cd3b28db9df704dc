//! Checkpoint files written by one run and read by the next.

use lexis::checkpoint::{CheckpointStore, JsonCheckpointStore};
use lexis::stats::StatisticsProfile;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_legacy_document_without_statistics_loads_and_refreshes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dictionary.json");
    let legacy = json!({
        "A": {
            "letter": "A",
            "description": "Words starting with letter A",
            "words": {
                "Abate": {"complexity": "Advanced", "meanings": [{"part_of_speech": "Verb"}]},
                "Abode": {"meanings": [{"part_of_speech": "Noun"}], "custom_note": "kept"}
            }
        }
    });
    fs::write(&path, serde_json::to_string_pretty(&legacy).unwrap()).unwrap();

    let store = JsonCheckpointStore::new(&path);
    let mut document = store.load().unwrap();
    assert_eq!(document.total_words(), 2);
    assert_eq!(
        document.statistics_drift(StatisticsProfile::Detailed),
        vec!["A".to_string()]
    );

    document.refresh_statistics(StatisticsProfile::Detailed);
    store.save(&document).unwrap();

    let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let stats = &on_disk["A"]["statistics"];
    assert_eq!(stats["total_words"], 2);
    assert_eq!(stats["part_of_speech_distribution"]["Verb"], 1);
    assert_eq!(stats["part_of_speech_distribution"]["Noun"], 1);
    assert_eq!(on_disk["A"]["words"]["Abode"]["custom_note"], "kept");
}

#[test]
fn test_truncated_file_is_treated_as_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");
    fs::write(&path, "{\"A\": {\"letter\": \"A\", \"words\": {\"Ab").unwrap();

    let store = JsonCheckpointStore::new(&path);
    assert!(store.exists());
    assert_eq!(store.load().unwrap().total_words(), 0);
}

#[test]
fn test_save_replaces_file_in_one_step() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data").join("word_list.json");
    let store = JsonCheckpointStore::new(&path);

    let mut document = store.load().unwrap();
    document.ensure_bucket("A");
    store.save(&document).unwrap();
    document.ensure_bucket("B");
    store.save(&document).unwrap();

    let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["word_list.json".to_string()]);
    assert_eq!(store.load().unwrap().buckets().count(), 2);
}
