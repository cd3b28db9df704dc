//! Configuration precedence: defaults, workspace files, environment.

use super::test_utils::env_lock;
use lexis::cli::RunContext;
use lexis::config::{ConfigLoader, StageTuning};
use lexis::error::LexisError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ENV_VARS: [&str; 5] = [
    "LEXIS__PIPELINE__WORDS__MAX_RETRIES",
    "LEXIS__SPEECH__VOICES",
    "LEXIS__GENERATION__MODEL",
    "LEXIS_ENV",
    "XDG_CONFIG_HOME",
];

/// Clears the variables this module sets and points the user config
/// directory at an empty temp dir.
struct IsolatedEnv {
    saved: Vec<(&'static str, Option<String>)>,
    _xdg: TempDir,
}

impl IsolatedEnv {
    fn new() -> Self {
        let saved = ENV_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
        let xdg = TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", xdg.path());
        Self { saved, _xdg: xdg }
    }
}

impl Drop for IsolatedEnv {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(name, v),
                None => std::env::remove_var(name),
            }
        }
    }
}

fn write_workspace_config(root: &Path, name: &str, contents: &str) {
    let dir = root.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let _lock = env_lock();
    let _env = IsolatedEnv::new();
    let workspace = TempDir::new().unwrap();

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.pipeline.words, StageTuning::WORDS);
    assert_eq!(config.pipeline.details, StageTuning::DETAILS);
    assert_eq!(config.speech.voices.len(), 3);
    assert_eq!(config.storage.word_list_path(workspace.path()), workspace.path().join("data/word_list.json"));
}

#[test]
fn test_workspace_file_then_environment() {
    let _lock = env_lock();
    let _env = IsolatedEnv::new();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(
        workspace.path(),
        "config.toml",
        "[pipeline.words]\nmax_retries = 5\nitem_delay_ms = 0\n\n[generation]\nmodel = \"gemini-2.5-flash\"\n",
    );

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.pipeline.words.max_retries, 5);
    assert_eq!(config.pipeline.words.item_delay_ms, 0);
    assert_eq!(config.pipeline.words.base_delay_ms, StageTuning::WORDS.base_delay_ms);
    assert_eq!(config.generation.model, "gemini-2.5-flash");

    std::env::set_var("LEXIS__PIPELINE__WORDS__MAX_RETRIES", "7");
    std::env::set_var("LEXIS__SPEECH__VOICES", "en-US-Chirp3-HD-Puck,en-US-Chirp3-HD-Iapetus");
    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.pipeline.words.max_retries, 7);
    assert_eq!(
        config.speech.voices,
        vec!["en-US-Chirp3-HD-Puck".to_string(), "en-US-Chirp3-HD-Iapetus".to_string()]
    );
}

#[test]
fn test_environment_specific_file_overrides_base() {
    let _lock = env_lock();
    let _env = IsolatedEnv::new();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(workspace.path(), "config.toml", "[generation]\nmodel = \"base-model\"\n");
    write_workspace_config(workspace.path(), "production.toml", "[generation]\nmodel = \"prod-model\"\n");

    assert_eq!(ConfigLoader::load(workspace.path()).unwrap().generation.model, "base-model");
    std::env::set_var("LEXIS_ENV", "production");
    assert_eq!(ConfigLoader::load(workspace.path()).unwrap().generation.model, "prod-model");
}

#[test]
fn test_load_from_file_skips_workspace_discovery() {
    let _lock = env_lock();
    let _env = IsolatedEnv::new();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(workspace.path(), "config.toml", "[generation]\nmodel = \"workspace-model\"\n");
    let explicit = workspace.path().join("other.toml");
    fs::write(&explicit, "[storage]\ndictionary = \"out/dict.json\"\n").unwrap();

    let config = ConfigLoader::load_from_file(&explicit).unwrap();
    assert_eq!(config.generation.model, "gemini-2.5-pro");
    assert_eq!(config.storage.dictionary_path(Path::new("/ws")), Path::new("/ws/out/dict.json"));

    assert!(ConfigLoader::load_from_file(&workspace.path().join("missing.toml")).is_err());
}

#[test]
fn test_run_context_rejects_invalid_config() {
    let _lock = env_lock();
    let _env = IsolatedEnv::new();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(
        workspace.path(),
        "config.toml",
        "[pipeline.details]\nmax_retries = 50\n\n[storage]\nword_list = \"data/same.json\"\ndictionary = \"data/same.json\"\n",
    );

    let result = RunContext::new(workspace.path().to_path_buf(), None);
    match result {
        Err(LexisError::ConfigError(msg)) => {
            assert!(msg.contains("details"), "message: {}", msg);
            assert!(msg.lines().count() >= 3, "both problems reported: {}", msg);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("invalid config accepted"),
    }
}
