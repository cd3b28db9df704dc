//! End-to-end runs of the text stages: resume, retry budget, crash safety.

use super::test_utils::{fast_driver, letter_payload, FailingStore, ScriptedGenerator};
use lexis::catalog::Catalog;
use lexis::checkpoint::{CheckpointDocument, CheckpointStore, JsonCheckpointStore};
use lexis::error::{FailureKind, ProviderError, StorageError};
use lexis::normalize::Record;
use lexis::pipeline::{DictionaryStage, RunState, StartMode};
use lexis::schema::{DetailSchema, WordListSchema};
use lexis::stats::StatisticsProfile;
use serde_json::json;
use tempfile::TempDir;

fn word_list_stage<K: CheckpointStore>(
    client: ScriptedGenerator,
    store: K,
    mode: StartMode,
) -> DictionaryStage<ScriptedGenerator, WordListSchema, K> {
    DictionaryStage::new(client, WordListSchema::default(), store, Catalog::Letters, mode)
}

fn transport_error() -> ProviderError {
    ProviderError::RequestFailed("connection reset".into())
}

#[tokio::test]
async fn test_resume_after_complete_run_makes_no_calls() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");

    let mut stage = word_list_stage(
        ScriptedGenerator::letters(),
        JsonCheckpointStore::new(&path),
        StartMode::Resume,
    );
    let report = fast_driver(3).run(&mut stage).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.succeeded.len(), 26);
    assert_eq!(stage.client().calls().len(), 26);

    let saved = JsonCheckpointStore::new(&path).load().unwrap();
    assert_eq!(saved.total_words(), 52);

    let mut again = word_list_stage(
        ScriptedGenerator::letters(),
        JsonCheckpointStore::new(&path),
        StartMode::Resume,
    );
    let report = fast_driver(3).run(&mut again).await.unwrap();
    assert_eq!(report.pending, 0);
    assert!(again.client().calls().is_empty());
    assert_eq!(JsonCheckpointStore::new(&path).load().unwrap(), saved);
}

#[tokio::test]
async fn test_item_failing_every_attempt_is_called_max_retries_plus_one_times() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");

    let client = ScriptedGenerator::new(|key| {
        if key == "C" {
            Err(ProviderError::RequestFailed("upstream down".into()))
        } else {
            Ok(letter_payload(key))
        }
    });
    let mut stage = word_list_stage(client, JsonCheckpointStore::new(&path), StartMode::Resume);
    let report = fast_driver(3).run(&mut stage).await.unwrap();

    assert_eq!(stage.client().calls_for("C"), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, "C");
    assert_eq!(report.failed[0].attempts, 4);
    assert_eq!(report.failed[0].kind, FailureKind::Transport);
    assert_eq!(report.succeeded.len(), 25);
    assert_eq!(report.state, RunState::Completed);

    // The failed letter stays pending for the next run.
    let saved = JsonCheckpointStore::new(&path).load().unwrap();
    assert!(saved.bucket("C").unwrap().words.is_empty());
    assert_eq!(Catalog::Letters.pending(&saved).len(), 1);
}

#[tokio::test]
async fn test_transient_failures_then_next_item() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");

    let client = ScriptedGenerator::letters().script(
        "A",
        vec![Err(transport_error()), Err(transport_error())],
    );
    let mut stage = word_list_stage(client, JsonCheckpointStore::new(&path), StartMode::Resume);
    let report = fast_driver(3).run(&mut stage).await.unwrap();

    let calls = stage.client().calls();
    assert_eq!(&calls[..4], &["A", "A", "A", "B"]);
    assert_eq!(report.succeeded[0], "A");
    assert_eq!(report.attempts, 28);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_retried() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");

    let client = ScriptedGenerator::letters().script(
        "A",
        vec![Ok("not json at all".to_string()), Ok("{}".to_string())],
    );
    let mut stage = word_list_stage(client, JsonCheckpointStore::new(&path), StartMode::Resume);
    let report = fast_driver(3).run(&mut stage).await.unwrap();

    assert_eq!(stage.client().calls_for("A"), 3);
    assert!(report.failed.is_empty());
    assert_eq!(stage.document().bucket("A").unwrap().words.len(), 2);
}

#[tokio::test]
async fn test_save_failure_aborts_and_keeps_prior_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");

    let mut stage = word_list_stage(
        ScriptedGenerator::letters(),
        FailingStore::new(&path, 2),
        StartMode::Resume,
    );
    let report = fast_driver(3).run(&mut stage).await.unwrap();

    assert!(report.is_aborted());
    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.succeeded, vec!["A".to_string()]);
    assert_eq!(report.aborted.as_ref().unwrap().key, "B");
    assert_eq!(report.not_attempted(), 24);
    assert_eq!(stage.client().calls(), vec!["A".to_string(), "B".to_string()]);

    // The file still holds exactly what the last successful save wrote.
    let saved = JsonCheckpointStore::new(&path).load().unwrap();
    assert_eq!(saved.bucket("A").unwrap().words.len(), 2);
    assert!(saved.bucket("B").unwrap().words.is_empty());
    assert!(!temp_dir.path().join("word_list.json.tmp").exists());

    // Resuming picks up at B.
    let mut resumed = word_list_stage(
        ScriptedGenerator::letters(),
        JsonCheckpointStore::new(&path),
        StartMode::Resume,
    );
    let report = fast_driver(3).run(&mut resumed).await.unwrap();
    assert_eq!(report.pending, 25);
    assert_eq!(resumed.client().calls()[0], "B");
}

#[tokio::test]
async fn test_missing_complexity_is_defaulted_and_counted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");

    let client = ScriptedGenerator::letters().script(
        "A",
        vec![Ok(json!({
            "Abate": {"definition": "to lessen", "example": "The storm abated."},
            "Abjure": {"complexity": "Advanced", "definition": "to renounce", "example": "He abjured."}
        })
        .to_string())],
    );
    let mut stage = word_list_stage(client, JsonCheckpointStore::new(&path), StartMode::Resume);
    let report = fast_driver(0).run(&mut stage).await.unwrap();

    assert_eq!(report.substitutions, 1);
    let saved = JsonCheckpointStore::new(&path).load().unwrap();
    let bucket = saved.bucket("A").unwrap();
    assert_eq!(bucket.words["Abate"]["complexity"], "Intermediate");
    assert_eq!(bucket.words["Abjure"]["complexity"], "Advanced");
    assert_eq!(bucket.statistics.complexity_distribution["Intermediate"], 1);
    assert_eq!(bucket.statistics.complexity_distribution["Advanced"], 1);
}

#[tokio::test]
async fn test_fresh_start_backs_up_existing_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");
    let store = JsonCheckpointStore::new(&path);

    let mut old = CheckpointDocument::new();
    let record: Record = json!({"complexity": "Advanced"}).as_object().cloned().unwrap();
    old.merge("Z", vec![("Zephyr".to_string(), record)], StatisticsProfile::Basic);
    store.save(&old).unwrap();

    let mut stage = word_list_stage(
        ScriptedGenerator::letters(),
        JsonCheckpointStore::new(&path),
        StartMode::Fresh,
    );
    let report = fast_driver(0).run(&mut stage).await.unwrap();
    assert_eq!(report.pending, 26);

    let backup = JsonCheckpointStore::new(temp_dir.path().join("word_list_backup.json"))
        .load()
        .unwrap();
    assert_eq!(backup, old);
    let fresh = store.load().unwrap();
    assert!(!fresh.contains_word("Z", "Zephyr"));
    assert!(fresh.contains_word("Z", "Zrcane"));
}

#[tokio::test]
async fn test_fresh_start_stops_when_backup_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("word_list.json");
    let store = JsonCheckpointStore::new(&path);

    let mut old = CheckpointDocument::new();
    let record: Record = json!({"complexity": "Advanced"}).as_object().cloned().unwrap();
    old.merge("Z", vec![("Zephyr".to_string(), record)], StatisticsProfile::Basic);
    store.save(&old).unwrap();
    // A directory in the backup's place makes the copy fail.
    std::fs::create_dir(temp_dir.path().join("word_list_backup.json")).unwrap();

    let mut stage = word_list_stage(
        ScriptedGenerator::letters(),
        JsonCheckpointStore::new(&path),
        StartMode::Fresh,
    );
    let result = fast_driver(0).run(&mut stage).await;

    assert!(matches!(result, Err(StorageError::Write { .. })));
    assert!(stage.client().calls().is_empty());
    assert_eq!(store.load().unwrap(), old);
}

#[tokio::test]
async fn test_details_resume_skips_processed_words() {
    let temp_dir = TempDir::new().unwrap();
    let mut word_list = CheckpointDocument::new();
    for (letter, word) in [("A", "Abate"), ("A", "Abjure"), ("B", "Bane")] {
        word_list.merge(
            letter,
            vec![(word.to_string(), Record::new())],
            StatisticsProfile::Basic,
        );
    }

    let dictionary_path = temp_dir.path().join("dictionary.json");
    let mut partial = CheckpointDocument::new();
    let record: Record = serde_json::from_str(&super::test_utils::detail_payload("Abate")).unwrap();
    partial.merge("A", vec![("Abate".to_string(), record)], StatisticsProfile::Detailed);
    JsonCheckpointStore::new(&dictionary_path).save(&partial).unwrap();

    let mut stage = DictionaryStage::new(
        ScriptedGenerator::details(),
        DetailSchema,
        JsonCheckpointStore::new(&dictionary_path),
        Catalog::Words { source: word_list },
        StartMode::Resume,
    );
    let report = fast_driver(1).run(&mut stage).await.unwrap();

    assert_eq!(report.pending, 2);
    assert_eq!(stage.client().calls(), vec!["Abjure".to_string(), "Bane".to_string()]);
    let saved = JsonCheckpointStore::new(&dictionary_path).load().unwrap();
    assert_eq!(saved.total_words(), 3);
    let stats = &saved.bucket("A").unwrap().statistics;
    assert_eq!(stats.part_of_speech_distribution["Noun"], 2);
    assert!(stats.ssml_stats.is_some());
}
