//! Pipeline orchestrator
//!
//! upload → primary enrichment (bounded batches) → secondary matching
//! (sequential rows) → calculation → done. One run is active at a time;
//! starting a new run or calling `cancel` stops the previous one at its
//! next checkpoint, and a cancelled run publishes nothing.

use crate::cache::RegistryCache;
use crate::calculator::{self, CalculationOptions};
use crate::cancel::{CancellationToken, Cancelled};
use crate::config::Settings;
use crate::error::{DrugMatchError, Result};
use crate::progress::{ProgressSink, ProgressUpdate, Stage};
use crate::registry::{MfdsClient, OpenFdaClient, Transport};
use chrono::Local;
use drugmatch_common::{
    CompactSummaryRecord, CountMode, EnrichmentRecord, GenericItemRecord, LocalNameDictionary,
    ResultRecord, SourceRecord, SummaryMetrics,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Uploading,
    Enriching,
    Matching,
    Calculating,
    Done,
    Error,
    Cancelled,
}

/// Snapshot of the current run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: String,
    pub status: RunStatus,
    pub progress: u8,
    pub message: String,
    pub errors: Vec<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            run_id: new_run_id(),
            status: RunStatus::Idle,
            progress: 0,
            message: String::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    pub count_mode: CountMode,
    pub include_revoked: bool,
}

/// Everything a completed run publishes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub options: RunOptions,
    pub enrichment: Vec<EnrichmentRecord>,
    pub results: Vec<ResultRecord>,
    pub generic_items: Vec<GenericItemRecord>,
    pub compact_summaries: Vec<CompactSummaryRecord>,
    pub summary: SummaryMetrics,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    Cancelled,
}

fn new_run_id() -> String {
    Local::now().format("%Y%m%d-%H%M%S%.3f").to_string()
}

pub struct Pipeline {
    settings: Settings,
    cache: Arc<RegistryCache>,
    enricher: OpenFdaClient,
    products: MfdsClient,
    active: Mutex<CancellationToken>,
    state: Mutex<RunState>,
    runs: AtomicU64,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        transport: Arc<dyn Transport>,
        dictionary: Arc<LocalNameDictionary>,
        cache: Arc<RegistryCache>,
    ) -> Self {
        let enricher = OpenFdaClient::new(
            transport.clone(),
            dictionary,
            cache.enrichment.clone(),
            &settings,
        );
        let products = MfdsClient::new(transport, cache.products.clone(), &settings);

        Self {
            settings,
            cache,
            enricher,
            products,
            active: Mutex::new(CancellationToken::new()),
            state: Mutex::new(RunState::default()),
            runs: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &RegistryCache {
        &self.cache
    }

    pub fn status(&self) -> RunState {
        self.lock_state().clone()
    }

    /// Cancel the active run, if any.
    pub fn cancel(&self) {
        self.lock_active().cancel();
    }

    /// Cancel the active run and return to idle with a fresh run id.
    pub fn reset(&self) {
        self.cancel();
        *self.lock_state() = RunState::default();
    }

    /// Full pipeline over uploaded rows.
    pub async fn run(
        &self,
        rows: Vec<SourceRecord>,
        options: RunOptions,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome> {
        let (run_id, cancel) = self.begin_run();
        self.report(&run_id, progress, Stage::Uploading, 0, rows.len(), format!("{} source rows", rows.len()));

        if rows.is_empty() {
            return Err(self.fail(&run_id, DrugMatchError::NoSourceRows("upload is empty".into())));
        }

        let enrichment = match self.enrich_all(&run_id, &rows, &cancel, progress).await {
            Ok(enrichment) => enrichment,
            Err(Cancelled) => return Ok(self.abandon(&run_id)),
        };

        self.match_and_calculate(run_id, enrichment, options, &cancel, progress)
            .await
    }

    /// Enrichment stage only (for manual mapping before matching).
    pub async fn enrich(
        &self,
        rows: Vec<SourceRecord>,
        progress: &dyn ProgressSink,
    ) -> Result<Option<Vec<EnrichmentRecord>>> {
        let (run_id, cancel) = self.begin_run();
        if rows.is_empty() {
            return Err(self.fail(&run_id, DrugMatchError::NoSourceRows("upload is empty".into())));
        }

        match self.enrich_all(&run_id, &rows, &cancel, progress).await {
            Ok(enrichment) => {
                self.report(&run_id, progress, Stage::Done, 0, 0, "Enrichment complete");
                self.set_status(&run_id, RunStatus::Done);
                Ok(Some(enrichment))
            }
            Err(Cancelled) => {
                self.abandon(&run_id);
                Ok(None)
            }
        }
    }

    /// Re-run matching and calculation on existing (possibly edited) enrichment.
    /// The secondary cache is cleared first so edited terms are looked up again.
    pub async fn rematch(
        &self,
        enrichment: Vec<EnrichmentRecord>,
        options: RunOptions,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome> {
        let (run_id, cancel) = self.begin_run();
        if enrichment.is_empty() {
            return Err(self.fail(&run_id, DrugMatchError::NoSourceRows("no enrichment rows".into())));
        }

        self.cache.products.clear();
        self.match_and_calculate(run_id, enrichment, options, &cancel, progress)
            .await
    }

    async fn enrich_all(
        &self,
        run_id: &str,
        rows: &[SourceRecord],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<Vec<EnrichmentRecord>, Cancelled> {
        self.set_status(run_id, RunStatus::Enriching);
        let total = rows.len();
        let batch_size = self.settings.enrich_batch_size.max(1);
        let mut enrichment = Vec::with_capacity(total);

        for (batch_index, batch) in rows.chunks(batch_size).enumerate() {
            cancel.check()?;
            if batch_index > 0 {
                tokio::time::sleep(self.settings.enrich_batch_delay).await;
                cancel.check()?;
            }

            let done = batch_index * batch_size;
            self.report(
                run_id,
                progress,
                Stage::Enriching,
                done,
                total,
                format!("Primary registry: rows {}-{} of {}", done + 1, done + batch.len(), total),
            );

            let enriched = join_all(batch.iter().map(|row| self.enricher.enrich(row, cancel))).await;
            for record in enriched {
                enrichment.push(record?);
            }
        }

        self.report(run_id, progress, Stage::Enriching, total, total, "Primary registry complete");
        Ok(enrichment)
    }

    async fn match_and_calculate(
        &self,
        run_id: String,
        enrichment: Vec<EnrichmentRecord>,
        options: RunOptions,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome> {
        self.set_status(&run_id, RunStatus::Matching);
        self.report(&run_id, progress, Stage::Matching, 0, enrichment.len(), "Secondary registry lookups");

        let calculation_options = CalculationOptions {
            count_mode: options.count_mode,
            include_revoked: options.include_revoked,
            row_delay: self.settings.row_delay,
        };
        let sink = StateSink {
            pipeline: self,
            run_id: &run_id,
            inner: progress,
        };
        let output = match calculator::compute(
            &enrichment,
            calculation_options,
            &self.products,
            cancel,
            &sink,
        )
        .await
        {
            Ok(output) => output,
            Err(Cancelled) => return Ok(self.abandon(&run_id)),
        };

        // Last checkpoint before anything is published.
        if cancel.is_cancelled() {
            return Ok(self.abandon(&run_id));
        }

        self.set_status(&run_id, RunStatus::Calculating);
        self.report(&run_id, progress, Stage::Calculating, 0, 0, "Building summary");
        let summary = calculator::summarize(
            &enrichment,
            &output.results,
            &output.generic_items,
            &output.validation_errors,
        );

        self.update_state(&run_id, |state| state.errors = output.validation_errors.clone());
        self.set_status(&run_id, RunStatus::Done);
        self.report(&run_id, progress, Stage::Done, 0, 0, "Done");
        info!(
            run_id = %run_id,
            rows = summary.total_rows,
            not_found = summary.not_found_count,
            generic_items = summary.total_generic_item_rows,
            "run complete"
        );

        Ok(RunOutcome::Completed(RunReport {
            run_id,
            options,
            enrichment,
            results: output.results,
            generic_items: output.generic_items,
            compact_summaries: output.compact_summaries,
            summary,
        }))
    }

    /// Cancel any previous run and install a fresh token.
    /// Run ids carry a sequence number so overlapping runs never share one.
    fn begin_run(&self) -> (String, CancellationToken) {
        let run_id = format!("{}-{}", new_run_id(), self.runs.fetch_add(1, Ordering::SeqCst) + 1);
        let token = CancellationToken::new();
        {
            let mut active = self.lock_active();
            active.cancel();
            *active = token.clone();
        }

        let mut state = self.lock_state();
        *state = RunState {
            run_id,
            status: RunStatus::Uploading,
            ..RunState::default()
        };
        (state.run_id.clone(), token)
    }

    /// Apply `f` only while `run_id` is still the current run.
    /// A superseded run never touches its successor's state.
    fn update_state(&self, run_id: &str, f: impl FnOnce(&mut RunState)) {
        let mut state = self.lock_state();
        if state.run_id == run_id {
            f(&mut state);
        }
    }

    fn abandon(&self, run_id: &str) -> RunOutcome {
        warn!(run_id, "run cancelled");
        self.update_state(run_id, |state| {
            state.status = RunStatus::Cancelled;
            state.message = "Cancelled".into();
        });
        RunOutcome::Cancelled
    }

    fn fail(&self, run_id: &str, error: DrugMatchError) -> DrugMatchError {
        self.update_state(run_id, |state| {
            state.status = RunStatus::Error;
            state.errors.push(error.to_string());
        });
        error
    }

    fn set_status(&self, run_id: &str, status: RunStatus) {
        self.update_state(run_id, |state| state.status = status);
    }

    fn report(
        &self,
        run_id: &str,
        progress: &dyn ProgressSink,
        stage: Stage,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        let update = ProgressUpdate::new(stage, current, total, message);
        self.record(run_id, &update);
        progress.report(&update);
    }

    fn record(&self, run_id: &str, update: &ProgressUpdate) {
        self.update_state(run_id, |state| {
            state.progress = update.percent;
            state.message = update.message.clone();
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_active(&self) -> MutexGuard<'_, CancellationToken> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Mirrors calculator progress into the run state
struct StateSink<'a> {
    pipeline: &'a Pipeline,
    run_id: &'a str,
    inner: &'a dyn ProgressSink,
}

impl ProgressSink for StateSink<'_> {
    fn report(&self, update: &ProgressUpdate) {
        self.pipeline.record(self.run_id, update);
        self.inner.report(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_id_format() {
        let id = new_run_id();
        assert_eq!(id.len(), "20260101-120000.000".len());
        assert_eq!(&id[8..9], "-");
    }

    #[test]
    fn test_run_state_default_is_idle() {
        let state = RunState::default();
        assert_eq!(state.status, RunStatus::Idle);
        assert_eq!(state.progress, 0);
        assert!(state.errors.is_empty());
    }
}
