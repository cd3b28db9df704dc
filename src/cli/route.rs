//! CLI route: single route table and run context. Dispatches to stages and presentation.

use crate::audio::AudioStage;
use crate::catalog::Catalog;
use crate::checkpoint::{CheckpointStore, JsonCheckpointStore};
use crate::cli::parse::{Commands, StartArgs, Target};
use crate::cli::presentation::{format_document_summary, format_drift_report, format_run_report};
use crate::config::{validation_failure, ConfigLoader, LexisConfig, StageTuning};
use crate::error::LexisError;
use crate::pipeline::{DictionaryStage, Driver, RunReport, Stage, StartMode};
use crate::provider::{GeminiClient, GoogleSpeechClient};
use crate::schema::{DetailSchema, WordListSchema};
use crate::stats::{DocumentSummary, ProgressSummary, StatisticsProfile};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

/// Runtime context for CLI execution: workspace root plus validated configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: LexisConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, LexisError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.validate().map_err(validation_failure)?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    /// Build from an already-loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: LexisConfig) -> Result<Self, LexisError> {
        config.validate().map_err(validation_failure)?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &LexisConfig {
        &self.config
    }

    /// Execute a command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, LexisError> {
        match command {
            Commands::Words { start } => self.handle_words(*start),
            Commands::Details { start } => self.handle_details(*start),
            Commands::Audio => self.handle_audio(),
            Commands::Stats {
                target,
                format,
                incomplete,
            } => self.handle_stats(*target, format, *incomplete),
            Commands::Verify { target, fix } => self.handle_verify(*target, *fix),
        }
    }

    fn store_for(&self, target: Target) -> JsonCheckpointStore {
        let storage = &self.config.storage;
        match target {
            Target::WordList => JsonCheckpointStore::new(storage.word_list_path(&self.workspace_root)),
            Target::Dictionary => {
                JsonCheckpointStore::new(storage.dictionary_path(&self.workspace_root))
            }
        }
    }

    fn generation_client(&self) -> Result<GeminiClient, LexisError> {
        let generation = &self.config.generation;
        let api_key = generation.resolve_api_key()?;
        Ok(GeminiClient::new(
            generation.model.clone(),
            api_key,
            Some(generation.endpoint.clone()),
        )?)
    }

    fn handle_words(&self, start: StartArgs) -> Result<String, LexisError> {
        let store = self.store_for(Target::WordList);
        let mode = resolve_start_mode(start, &store, Target::WordList)?;
        let client = self.generation_client()?;
        let mut stage = DictionaryStage::new(
            client,
            WordListSchema::default(),
            store,
            Catalog::Letters,
            mode,
        );
        self.run_stage(&mut stage, &self.config.pipeline.words)
    }

    fn handle_details(&self, start: StartArgs) -> Result<String, LexisError> {
        let word_list = self.store_for(Target::WordList).load()?;
        if word_list.total_words() == 0 {
            return Err(LexisError::InvalidInput(
                "Word list is empty; run `lexis words` first".to_string(),
            ));
        }

        let store = self.store_for(Target::Dictionary);
        let mode = resolve_start_mode(start, &store, Target::Dictionary)?;
        let client = self.generation_client()?;
        let mut stage = DictionaryStage::new(
            client,
            DetailSchema,
            store,
            Catalog::Words { source: word_list },
            mode,
        );
        self.run_stage(&mut stage, &self.config.pipeline.details)
    }

    fn handle_audio(&self) -> Result<String, LexisError> {
        let speech = &self.config.speech;
        let client = GoogleSpeechClient::new(
            Some(speech.endpoint.clone()),
            speech.resolve_api_key(),
            speech.resolve_project(),
        )?;
        let settings = self.config.audio_settings(&self.workspace_root);
        let mut stage = AudioStage::new(client, self.store_for(Target::Dictionary), settings);
        self.run_stage(&mut stage, &self.config.pipeline.audio)
    }

    fn run_stage<S: Stage>(&self, stage: &mut S, tuning: &StageTuning) -> Result<String, LexisError> {
        let driver = Driver::new(tuning.retry_policy(), tuning.item_delay());
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| LexisError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        let report = rt.block_on(driver.run(stage))?;
        finish_run(report)
    }

    fn handle_stats(
        &self,
        target: Target,
        format: &str,
        incomplete: bool,
    ) -> Result<String, LexisError> {
        let document = self.store_for(target).load()?;
        let summary = DocumentSummary::from_document(&document, profile_for(target));
        let progress = match target {
            Target::Dictionary => {
                let word_list = self.store_for(Target::WordList).load()?;
                Some(ProgressSummary::compute(&word_list, &document))
            }
            Target::WordList => None,
        };
        format_document_summary(target.label(), &summary, progress.as_ref(), incomplete, format)
    }

    fn handle_verify(&self, target: Option<Target>, fix: bool) -> Result<String, LexisError> {
        let targets: Vec<Target> = match target {
            Some(t) => vec![t],
            None => Target::ALL.to_vec(),
        };

        let mut lines = Vec::new();
        let mut drifted_total = 0;
        for target in targets {
            let store = self.store_for(target);
            if !store.exists() {
                lines.push(format!("{}: no checkpoint at {}", target.label(), store.path().display()));
                continue;
            }
            let mut document = store.load()?;
            let profile = profile_for(target);
            let drifted = document.statistics_drift(profile);
            if fix && !drifted.is_empty() {
                document.refresh_statistics(profile);
                store.save(&document)?;
                info!(target = target.label(), buckets = drifted.len(), "Recomputed statistics");
            } else {
                drifted_total += drifted.len();
            }
            lines.push(format_drift_report(target.label(), &drifted, fix));
        }

        if drifted_total > 0 {
            eprintln!("{}", lines.join("\n"));
            return Err(LexisError::StatisticsDrift(drifted_total));
        }
        Ok(lines.join("\n"))
    }
}

/// Statistics profile stored in each document.
fn profile_for(target: Target) -> StatisticsProfile {
    match target {
        Target::WordList => StatisticsProfile::Basic,
        Target::Dictionary => StatisticsProfile::Detailed,
    }
}

/// Turn a finished run into command output; an aborted run becomes an error.
fn finish_run(report: RunReport) -> Result<String, LexisError> {
    let text = format_run_report(&report);
    match report.aborted {
        Some(abort) => {
            eprintln!("{}", text);
            Err(LexisError::Aborted {
                key: abort.key,
                source: abort.error,
            })
        }
        None => Ok(text),
    }
}

/// Decide between resuming and starting over.
///
/// Flags win. Without flags an existing checkpoint is resumed, after asking
/// when attached to a terminal.
fn resolve_start_mode(
    start: StartArgs,
    store: &JsonCheckpointStore,
    target: Target,
) -> Result<StartMode, LexisError> {
    if start.fresh {
        return Ok(StartMode::Fresh);
    }
    if start.resume || !store.exists() || !std::io::stdin().is_terminal() {
        return Ok(StartMode::Resume);
    }

    use dialoguer::Select;

    let selection = Select::new()
        .with_prompt(format!(
            "Found existing {} at {}",
            target.label(),
            store.path().display()
        ))
        .items(&[
            "Resume from checkpoint",
            "Start fresh (existing file is backed up)",
        ])
        .default(0)
        .interact()
        .map_err(|e| LexisError::ConfigError(format!("Failed to get user input: {}", e)))?;

    Ok(match selection {
        0 => StartMode::Resume,
        _ => StartMode::Fresh,
    })
}
