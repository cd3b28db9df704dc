//! Driver Loop
//!
//! Runs one stage over its pending work items, strictly in order:
//! retry controller, normalizer, merge, save. A terminal call failure leaves
//! the key pending and the loop moves on; a save failure aborts the run.

use crate::catalog::{Catalog, WorkItem, WorkKey};
use crate::checkpoint::{CheckpointDocument, CheckpointStore};
use crate::error::{ProviderError, StorageError, TerminalFailure};
use crate::normalize::{decode_object, log_substitutions, Record};
use crate::provider::GenerationClient;
use crate::retry::RetryPolicy;
use crate::schema::RecordSchema;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// One enrichment pass over a key space.
#[async_trait]
pub trait Stage: Send + Sync {
    type Item: WorkKey + Send + Sync;
    type Output: Send;

    fn name(&self) -> &'static str;

    /// Read prior state. Failure means the run does not start.
    fn load(&mut self) -> Result<(), StorageError>;

    /// Items still to do, in processing order.
    fn pending(&self) -> Vec<Self::Item>;

    /// One adapter call plus payload decoding. Retried by the driver.
    async fn attempt(&self, item: &Self::Item) -> Result<Self::Output, ProviderError>;

    /// Normalize, merge and persist. Returns the number of substitutions.
    fn commit(&mut self, item: &Self::Item, output: Self::Output) -> Result<usize, StorageError>;

    /// Items the catalog could not turn into work.
    fn skipped(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loading,
    Processing,
    Saving,
    Completed,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Loading => "loading",
            RunState::Processing => "processing",
            RunState::Saving => "saving",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// The save failure that stopped a run.
#[derive(Debug)]
pub struct Abort {
    pub key: String,
    pub error: StorageError,
}

/// Outcome of one driver run.
#[derive(Debug)]
pub struct RunReport {
    pub stage: &'static str,
    pub state: RunState,
    /// Items pending when the run started
    pub pending: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<TerminalFailure>,
    pub substitutions: usize,
    /// Adapter invocations across all items
    pub attempts: u32,
    pub skipped: usize,
    pub aborted: Option<Abort>,
    pub elapsed: Duration,
}

impl RunReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            state: RunState::Idle,
            pending: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            substitutions: 0,
            attempts: 0,
            skipped: 0,
            aborted: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.state == RunState::Aborted
    }

    /// Items never called, left behind by an abort. The aborted item itself
    /// was called; only its save failed.
    pub fn not_attempted(&self) -> usize {
        let attempted = self.succeeded.len() + self.failed.len() + self.aborted.is_some() as usize;
        self.pending.saturating_sub(attempted)
    }
}

/// Retry policy and pacing shared by every item of a run.
#[derive(Debug, Clone, Copy)]
pub struct Driver {
    pub retry: RetryPolicy,
    pub item_delay: Duration,
}

impl Driver {
    pub fn new(retry: RetryPolicy, item_delay: Duration) -> Self {
        Self { retry, item_delay }
    }

    fn transition(&self, report: &mut RunReport, state: RunState) {
        debug!(stage = report.stage, from = %report.state, to = %state, "Run state");
        report.state = state;
    }

    /// Run `stage` to completion or abort.
    pub async fn run<S: Stage>(&self, stage: &mut S) -> Result<RunReport, StorageError> {
        let started = Instant::now();
        let mut report = RunReport::new(stage.name());

        self.transition(&mut report, RunState::Loading);
        stage.load()?;
        let items = stage.pending();
        report.pending = items.len();
        report.skipped = stage.skipped();
        info!(stage = report.stage, pending = report.pending, "Starting run");

        let total = items.len();
        for (index, item) in items.iter().enumerate() {
            let key = item.key().to_string();
            self.transition(&mut report, RunState::Processing);
            info!(stage = report.stage, key = %key, item = index + 1, total, "Processing");

            let attempted = {
                let stage_ref: &S = stage;
                self.retry.run(&key, || stage_ref.attempt(item)).await
            };

            match attempted {
                Ok(attempted) => {
                    report.attempts += attempted.attempts;
                    self.transition(&mut report, RunState::Saving);
                    match stage.commit(item, attempted.value) {
                        Ok(substitutions) => {
                            report.substitutions += substitutions;
                            report.succeeded.push(key.clone());
                            info!(
                                stage = report.stage,
                                key = %key,
                                attempts = attempted.attempts,
                                "Saved"
                            );
                        }
                        Err(e) => {
                            error!(
                                stage = report.stage,
                                key = %key,
                                error = %e,
                                "Failed to save checkpoint, stopping to prevent data loss"
                            );
                            self.transition(&mut report, RunState::Aborted);
                            report.aborted = Some(Abort { key, error: e });
                            report.elapsed = started.elapsed();
                            return Ok(report);
                        }
                    }
                }
                Err(failure) => {
                    report.attempts += failure.attempts;
                    warn!(
                        stage = report.stage,
                        key = %failure.key,
                        attempts = failure.attempts,
                        kind = %failure.kind,
                        error = %failure.last_error,
                        "Giving up on item, it stays pending"
                    );
                    report.failed.push(failure);
                }
            }

            if index + 1 < total && !self.item_delay.is_zero() {
                sleep(self.item_delay).await;
            }
        }

        self.transition(&mut report, RunState::Completed);
        report.elapsed = started.elapsed();
        info!(
            stage = report.stage,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            substitutions = report.substitutions,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run completed"
        );
        Ok(report)
    }
}

/// Whether a run continues from the existing checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Resume,
    /// Back up the old checkpoint and start from an empty document
    Fresh,
}

/// A text stage: generation client, record schema and checkpoint store.
pub struct DictionaryStage<C, S, K> {
    client: C,
    schema: S,
    store: K,
    catalog: Catalog,
    mode: StartMode,
    document: CheckpointDocument,
}

impl<C, S, K> DictionaryStage<C, S, K>
where
    C: GenerationClient,
    S: RecordSchema,
    K: CheckpointStore,
{
    pub fn new(client: C, schema: S, store: K, catalog: Catalog, mode: StartMode) -> Self {
        Self {
            client,
            schema,
            store,
            catalog,
            mode,
            document: CheckpointDocument::new(),
        }
    }

    pub fn document(&self) -> &CheckpointDocument {
        &self.document
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C, S, K> Stage for DictionaryStage<C, S, K>
where
    C: GenerationClient,
    S: RecordSchema,
    K: CheckpointStore,
{
    type Item = WorkItem;
    type Output = Record;

    fn name(&self) -> &'static str {
        self.schema.name()
    }

    fn load(&mut self) -> Result<(), StorageError> {
        self.document = match self.mode {
            StartMode::Resume => self.store.load()?,
            StartMode::Fresh => {
                self.store.backup()?;
                CheckpointDocument::new()
            }
        };
        for letter in self.catalog.letters() {
            self.document.ensure_bucket(&letter);
        }
        self.document.refresh_statistics(self.schema.profile());
        Ok(())
    }

    fn pending(&self) -> Vec<WorkItem> {
        self.catalog.pending(&self.document)
    }

    async fn attempt(&self, item: &WorkItem) -> Result<Record, ProviderError> {
        let request = self.schema.build_request(item);
        let raw = self.client.generate(&request).await?;
        let payload = decode_object(&raw)?;
        self.schema.check(item, &payload)?;
        Ok(payload)
    }

    fn commit(&mut self, item: &WorkItem, output: Record) -> Result<usize, StorageError> {
        let normalized = self.schema.normalize(item, output);
        log_substitutions(&normalized.substitutions);
        let substitutions = normalized.substitutions.len();
        self.document
            .merge(&item.letter, normalized.entries, self.schema.profile());
        self.store.save(&self.document)?;
        Ok(substitutions)
    }
}
