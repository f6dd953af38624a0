//! The result recorder: single authority over a run's counters, running-task
//! table, summary, and record stream.
//!
//! # Locking
//!
//! Three mutexes, always taken in the same order when nested: the summary
//! file, then the record stream, then the aggregate state. `record` holds
//! the stream and state locks so counting can never race `finalize`. The
//! state lock only covers state changes: summary writes, catalog walks and
//! forwarding all work on clones taken under it.

pub mod stream;

use crate::catalog::catalog_tree;
use crate::config::{CatalogOptions, RenderInfo, RunConfig};
use crate::error::{RecorderError, RecorderResult};
use crate::model::{
    ProgressInfo, Recordable, ResultCode, ResultType, RunId, RunOutcome, RunSummary,
    SummaryDetail,
};
use crate::progress::{ProgressTable, TableChange};
use chrono::Utc;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use stream::{to_pretty_json, RecordStream};

pub use stream::{read_record_stream, RECORD_SEPARATOR};

/// Environment variable whose value is appended to the summary banner.
pub const SUMMARY_URL_ENV: &str = "RUNTALLY_SUMMARY_URL";

/// Receives rate-gated summary snapshots from [`ResultRecorder::post_task_progress`].
///
/// Called after the state lock is released, with a clone the implementor owns.
pub trait SummaryForwarder: Send + Sync {
    fn forward_summary_update(&self, summary: RunSummary);
}

/// Per-result counters over recorded `Test` leaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultCounters {
    pub errors: u64,
    pub failures: u64,
    pub passed: u64,
    pub skipped: u64,
    pub unknown: u64,
    pub total: u64,
}

impl ResultCounters {
    fn count(&mut self, code: ResultCode) {
        self.total += 1;
        match code {
            ResultCode::Passed => self.passed += 1,
            ResultCode::Errored => self.errors += 1,
            ResultCode::Failed => self.failures += 1,
            ResultCode::Skipped => self.skipped += 1,
            ResultCode::Unset | ResultCode::Cancelled | ResultCode::Unknown => self.unknown += 1,
        }
    }

    pub fn detail(&self) -> SummaryDetail {
        SummaryDetail {
            errors: self.errors,
            failed: self.failures,
            skipped: self.skipped,
            passed: self.passed,
            total: self.total,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.errors > 0 || self.failures > 0 {
            RunOutcome::Failed
        } else {
            RunOutcome::Passed
        }
    }
}

struct RecorderState {
    summary: RunSummary,
    counters: ResultCounters,
    next_forward_at: Option<Instant>,
    /// Counters frozen and `stop` stamped; progress is ignored from here on.
    stopped: bool,
    /// Final summary persisted.
    finalized: bool,
}

pub struct ResultRecorder {
    render: RenderInfo,
    catalog: CatalogOptions,
    forward_interval: Option<Duration>,
    forwarder: Option<Arc<dyn SummaryForwarder>>,
    summary_file: Mutex<()>,
    stream: Mutex<Option<RecordStream>>,
    state: Mutex<RecorderState>,
    catalog_lock: Mutex<()>,
}

impl ResultRecorder {
    /// Open a recorder for a run: create the output directory, write the
    /// initial summary, and open the record stream.
    pub fn open(config: &RunConfig) -> RecorderResult<Self> {
        config.validate()?;
        let render = config.render_info();
        fs::create_dir_all(render.output_dir()).map_err(|err| {
            RecorderError::io(
                format!("failed to create {}", render.output_dir().display()),
                err,
            )
        })?;

        let forward_interval = config
            .forwarding
            .as_ref()
            .map(|forwarding| forwarding.interval())
            .transpose()?;

        let summary = RunSummary {
            title: config.title.clone(),
            runid: config.runid.clone().unwrap_or_else(RunId::new),
            build: config.build.clone(),
            pipeline: config.pipeline.clone(),
            job: config.job.clone(),
            start: Utc::now(),
            stop: None,
            result: RunOutcome::Running,
            apod: config.apod.clone(),
            detail: None,
            running: ProgressTable::new(),
        };

        let recorder = Self {
            render,
            catalog: config.catalog.clone(),
            forward_interval,
            forwarder: None,
            summary_file: Mutex::new(()),
            stream: Mutex::new(None),
            state: Mutex::new(RecorderState {
                summary,
                counters: ResultCounters::default(),
                next_forward_at: None,
                stopped: false,
                finalized: false,
            }),
            catalog_lock: Mutex::new(()),
        };

        if let Err(err) = recorder.begin() {
            let mut state = recorder.lock_state();
            state.stopped = true;
            state.finalized = true;
            drop(state);
            return Err(err);
        }

        tracing::info!(
            runid = %recorder.runid(),
            output = %recorder.render.output_dir().display(),
            "result recorder opened"
        );
        Ok(recorder)
    }

    fn begin(&self) -> RecorderResult<()> {
        self.update_summary()?;
        let stream = RecordStream::create(&self.render.result_filename)?;
        *self.lock_stream() = Some(stream);
        Ok(())
    }

    /// Install the hook that receives rate-gated snapshots.
    #[must_use]
    pub fn with_forwarder(mut self, forwarder: Arc<dyn SummaryForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn render_info(&self) -> &RenderInfo {
        &self.render
    }

    pub fn runid(&self) -> RunId {
        self.lock_state().summary.runid.clone()
    }

    /// Deep copy of the run summary taken under the state lock.
    pub fn summary(&self) -> RunSummary {
        self.lock_state().summary.clone()
    }

    pub fn counters(&self) -> ResultCounters {
        self.lock_state().counters
    }

    pub fn is_finalized(&self) -> bool {
        self.lock_state().finalized
    }

    /// Append the full record for `node`, then count it if it is a test.
    ///
    /// Only `Test` leaves move the counters; every other kind is written to
    /// the stream but left out of the totals.
    pub fn record<R: Recordable>(&self, node: &R) -> RecorderResult<()> {
        {
            let mut stream = self.lock_stream();
            let writer = stream.as_mut().ok_or(RecorderError::StreamClosed)?;
            writer.append(&node.to_record(false))?;

            if node.result_type() == ResultType::Test {
                let code = node.result_code().unwrap_or_default();
                let mut state = self.lock_state();
                state.counters.count(code);
                tracing::debug!(result = %code, total = state.counters.total, "test recorded");
            }
        }
        self.refresh_catalog();
        Ok(())
    }

    /// Append a preview record for `node`. Counters are untouched.
    pub fn preview<R: Recordable>(&self, node: &R) -> RecorderResult<()> {
        {
            let mut stream = self.lock_stream();
            let writer = stream.as_mut().ok_or(RecorderError::StreamClosed)?;
            writer.append(&node.to_record(true))?;
        }
        self.refresh_catalog();
        Ok(())
    }

    /// Merge a batch of progress updates into the running table.
    ///
    /// When forwarding is configured and the rate gate is open, a snapshot
    /// of the summary is taken after the whole batch is merged and the gate
    /// closes for one interval. The snapshot is handed to the installed
    /// [`SummaryForwarder`] (outside the lock) and also returned.
    pub fn post_task_progress<I>(&self, batch: I) -> Option<RunSummary>
    where
        I: IntoIterator<Item = ProgressInfo>,
    {
        let snapshot = {
            let mut state = self.lock_state();
            if state.stopped {
                tracing::debug!("progress ignored: run already finalized");
                return None;
            }
            for progress in batch {
                let id = progress.id.clone();
                let status = progress.status;
                let change = state.summary.running.apply(progress);
                if change == TableChange::Ignored {
                    tracing::debug!(task = %id, ?status, "terminal progress for a task that was not running");
                }
            }
            self.take_gated_snapshot(&mut state)
        };

        if let (Some(summary), Some(forwarder)) = (snapshot.as_ref(), self.forwarder.as_ref()) {
            forwarder.forward_summary_update(summary.clone());
        }
        snapshot
    }

    fn take_gated_snapshot(&self, state: &mut RecorderState) -> Option<RunSummary> {
        let interval = self.forward_interval?;
        let now = Instant::now();
        if state.next_forward_at.is_some_and(|next| now < next) {
            return None;
        }
        state.next_forward_at = Some(now + interval);
        Some(state.summary.clone())
    }

    /// Remove tasks from the running table, e.g. after a worker disconnects.
    /// Returns how many were present.
    pub fn clear_task_progress<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.lock_state();
        if state.stopped {
            return 0;
        }
        state.summary.running.clear(ids)
    }

    /// Rewrite the summary file from the current state.
    pub fn update_summary(&self) -> RecorderResult<()> {
        {
            let _file = self.lock_summary_file();
            let summary = self.summary();
            self.write_summary(&summary)?;
        }
        self.refresh_catalog();
        Ok(())
    }

    /// Close out the run: stamp `stop`, fill in the detail counters and the
    /// outcome, close the record stream, and persist the final summary.
    ///
    /// The summary is written even when closing the stream fails. The run
    /// only counts as finalized once the summary is on disk, so a call that
    /// failed to write it can be retried; after that, calls return `Ok(())`.
    pub fn finalize(&self) -> RecorderResult<()> {
        let file = self.lock_summary_file();
        let (summary, detail, closed) = {
            let mut stream = self.lock_stream();
            let mut state = self.lock_state();
            if state.finalized {
                return Ok(());
            }
            let detail = state.counters.detail();
            if !state.stopped {
                state.stopped = true;
                state.summary.stop = Some(Utc::now());
                state.summary.detail = Some(detail);
                state.summary.result = state.counters.outcome();
            }
            let closed = stream.take().map_or(Ok(()), RecordStream::close);
            (state.summary.clone(), detail, closed)
        };

        let written = self.write_summary(&summary);
        if written.is_ok() {
            self.lock_state().finalized = true;
        }
        drop(file);
        self.refresh_catalog();
        closed?;
        written?;

        tracing::info!(
            runid = %summary.runid,
            result = %summary.result,
            total = detail.total,
            failed = detail.failed,
            errors = detail.errors,
            "result recorder finalized"
        );
        Ok(())
    }

    /// Plain-text summary banner for terminals and logs.
    pub fn format_lines(&self) -> Vec<String> {
        let state = self.lock_state();
        let summary = &state.summary;
        let counters = &state.counters;

        let mut lines = vec![" ============== Test Summary ============== ".to_string()];
        if !summary.title.is_empty() {
            lines.push(format!("   Title: {}", summary.title));
        }
        let build = &summary.build;
        for (label, value) in [
            ("  Release", &build.release),
            ("  Branch", &build.branch),
            ("   Build", &build.build),
            ("  Flavor", &build.flavor),
        ] {
            if !value.is_empty() {
                lines.push(format!("{label}: {value}"));
            }
        }
        if let Some(owner) = summary.job.owner.as_deref().filter(|owner| !owner.is_empty()) {
            lines.push(format!("   Owner: {owner}"));
        }
        let stop = summary
            .stop
            .map_or_else(|| "-".to_string(), |stop| stop.to_rfc3339());
        lines.extend([
            format!("   RunId: {}", summary.runid),
            format!("   Start: {}", summary.start.to_rfc3339()),
            format!("    Stop: {stop}"),
            " ----------------- Detail ----------------- ".to_string(),
            format!("       Errors: {}", counters.errors),
            format!("       Failed: {}", counters.failures),
            format!("      Skipped: {}", counters.skipped),
            format!("       Passed: {}", counters.passed),
            format!("        Total: {}", counters.total),
            " ========================================== ".to_string(),
            format!("   {}", summary.result),
            " ========================================== ".to_string(),
            String::new(),
            format!("OUTPUT PATH: {}", self.render.output_dir().display()),
        ]);
        if let Ok(url) = std::env::var(SUMMARY_URL_ENV) {
            lines.push(format!("SUMMARY URL: {url}"));
        }
        lines
    }

    fn write_summary(&self, summary: &RunSummary) -> RecorderResult<()> {
        let data = to_pretty_json(summary)
            .map_err(|err| RecorderError::serialize("failed to serialize summary", err))?;
        let path = &self.render.summary_filename;
        fs::write(path, data)
            .map_err(|err| RecorderError::io(format!("failed to write {}", path.display()), err))
    }

    fn refresh_catalog(&self) {
        if !self.catalog.enabled {
            return;
        }
        let _guard = self.catalog_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = catalog_tree(self.render.output_dir(), &self.catalog) {
            tracing::warn!(error = %err, "catalog refresh failed");
        }
    }

    fn lock_summary_file(&self) -> MutexGuard<'_, ()> {
        self.summary_file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stream(&self) -> MutexGuard<'_, Option<RecordStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ResultRecorder {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            tracing::error!(error = %err, "failed to finalize result recorder on drop");
        }
    }
}
