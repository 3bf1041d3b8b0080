//! # Run Controller
//! Owns the lifecycle of analysis runs: validation, last-search persistence,
//! cache lookup, aggregation, supersession and error presentation.
//!
//! Only one run is current at a time. Starting a run cancels the previous token
//! and bumps `latest_run_id`; a run whose id is no longer the latest never writes
//! the cache and never delivers a result. The id check and the cache write happen
//! under the same state lock.
//!
//! State machine: Idle → Running → {Completed, Failed, Cancelled}; `acknowledge`
//! returns a terminal state to Idle and a new run may start from any state.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{AnalysisInput, Aggregator};
use crate::cache::{fingerprint, ReportCache, CACHE_PREFIX};
use crate::clock::{Clock, SystemClock};
use crate::error::{ErrorKind, RadarError};
use crate::last_search::{LastSearch, LastSearchStore};
use crate::query::{self, PicoQuery, QueryMode};
use crate::report::ReportModel;

pub const DEFAULT_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub query: PicoQuery,
    /// Falls back to the controller's configured window when absent.
    #[serde(default)]
    pub window_days: Option<u32>,
    #[serde(default)]
    pub mode: QueryMode,
}

impl RunRequest {
    pub fn new(query: PicoQuery, window_days: u32, mode: QueryMode) -> Self {
        Self {
            query,
            window_days: Some(window_days),
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

/// What a caller of `start_run` gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        report: Box<ReportModel>,
        #[serde(rename = "fromCache")]
        from_cache: bool,
    },
    /// Nothing found in any source; no classification.
    Empty {
        report: Box<ReportModel>,
        #[serde(rename = "fromCache")]
        from_cache: bool,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
    /// Cancelled explicitly or superseded by a newer run.
    Cancelled,
}

impl RunOutcome {
    fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::Empty { .. } => "empty",
            RunOutcome::Failed { .. } => "failed",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub state: RunState,
    pub run_id: u64,
    pub last_error: Option<String>,
}

struct Inner {
    latest_run_id: u64,
    current: Option<CancellationToken>,
    state: RunState,
    last_error: Option<String>,
}

pub struct RunController {
    aggregator: Arc<Aggregator>,
    cache: Arc<ReportCache>,
    last_search: LastSearchStore,
    clock: Arc<dyn Clock>,
    default_window_days: u32,
    inner: Mutex<Inner>,
}

/// Settles a run whose `start_run` future is dropped before it returns, so the
/// controller never stays `Running` with nobody driving the run.
struct RunGuard<'a> {
    controller: &'a RunController,
    run_id: u64,
    token: CancellationToken,
    armed: bool,
}

impl RunGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.token.cancel();
        let mut g = self.controller.inner.lock();
        if g.latest_run_id == self.run_id && g.state == RunState::Running {
            g.state = RunState::Cancelled;
            g.current = None;
            debug!(run_id = self.run_id, "run abandoned by caller");
        }
    }
}

impl RunController {
    pub fn new(
        aggregator: Arc<Aggregator>,
        cache: Arc<ReportCache>,
        last_search: LastSearchStore,
    ) -> Self {
        Self {
            aggregator,
            cache,
            last_search,
            clock: Arc::new(SystemClock),
            default_window_days: DEFAULT_WINDOW_DAYS,
            inner: Mutex::new(Inner {
                latest_run_id: 0,
                current: None,
                state: RunState::Idle,
                last_error: None,
            }),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Window used for requests that do not carry one.
    pub fn with_default_window_days(mut self, days: u32) -> Self {
        self.default_window_days = days;
        self
    }

    pub async fn start_run(&self, req: RunRequest) -> RunOutcome {
        let started = Instant::now();
        let (run_id, token) = self.begin();
        let guard = RunGuard {
            controller: self,
            run_id,
            token: token.clone(),
            armed: true,
        };
        let outcome = self.execute(run_id, &token, req).await;
        guard.disarm();

        counter!("radar_runs_total", "outcome" => outcome.label()).increment(1);
        histogram!("radar_run_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut g = self.inner.lock();
        if let Some(prev) = g.current.take() {
            prev.cancel();
            debug!(superseded = g.latest_run_id, "previous run cancelled");
        }
        g.latest_run_id += 1;
        let token = CancellationToken::new();
        g.current = Some(token.clone());
        g.state = RunState::Running;
        g.last_error = None;
        (g.latest_run_id, token)
    }

    async fn execute(
        &self,
        run_id: u64,
        token: &CancellationToken,
        req: RunRequest,
    ) -> RunOutcome {
        let window_days = req.window_days.unwrap_or(self.default_window_days);
        if window_days == 0 {
            return self.fail(
                run_id,
                RadarError::Validation("window must be at least one day".to_string()),
            );
        }
        let expression = query::build(&req.query, req.mode);
        if expression.is_empty() {
            return self.fail(run_id, RadarError::empty_query());
        }

        self.last_search.save(&LastSearch {
            query: req.query.clone(),
            window_days,
            mode: req.mode,
            saved_at: self.clock.now(),
        });

        let fp = fingerprint(expression.as_str(), window_days, req.mode);
        let short = short_hash(&fp);

        if let Some(report) = self.cache.get(&fp) {
            debug!(run_id, fp = short, "cache hit");
            return self.succeed(run_id, short, report, true, None);
        }
        debug!(run_id, fp = short, "cache miss");

        let input = AnalysisInput {
            query: &req.query,
            mode: req.mode,
            expression: &expression,
            window_days,
        };
        match self.aggregator.analyze(input, token).await {
            Ok(report) => self.succeed(run_id, short, report, false, Some(fp.as_str())),
            Err(e) if e.is_cancelled() => self.cancelled(run_id),
            Err(e) => self.fail(run_id, e),
        }
    }

    /// Deliver a report if `run_id` is still current; write the cache first when
    /// `cache_key` is given.
    fn succeed(
        &self,
        run_id: u64,
        short: &str,
        report: ReportModel,
        from_cache: bool,
        cache_key: Option<&str>,
    ) -> RunOutcome {
        let entry = cache_key.and_then(|key| self.cache.encode(key, &report));

        let mut g = self.inner.lock();
        if g.latest_run_id != run_id {
            debug!(run_id, "stale result dropped");
            return RunOutcome::Cancelled;
        }
        // only the store write sits inside the critical section
        if let Some(entry) = &entry {
            self.cache.commit(entry);
        }
        g.state = RunState::Completed;
        g.current = None;
        drop(g);

        let label = report.classification.as_ref().map(|c| c.label);
        info!(run_id, fp = short, from_cache, ?label, "run completed");

        let report = Box::new(report);
        if label.is_none() {
            RunOutcome::Empty { report, from_cache }
        } else {
            RunOutcome::Completed { report, from_cache }
        }
    }

    fn fail(&self, run_id: u64, err: RadarError) -> RunOutcome {
        let mut g = self.inner.lock();
        if g.latest_run_id != run_id {
            return RunOutcome::Cancelled;
        }
        let message = err.user_message();
        g.state = RunState::Failed;
        g.current = None;
        g.last_error = Some(message.clone());
        drop(g);

        warn!(run_id, kind = ?err.kind(), error = %err, "run failed");
        RunOutcome::Failed {
            kind: err.kind(),
            message,
        }
    }

    fn cancelled(&self, run_id: u64) -> RunOutcome {
        let mut g = self.inner.lock();
        if g.latest_run_id == run_id {
            g.state = RunState::Cancelled;
            g.current = None;
        }
        debug!(run_id, "run cancelled");
        RunOutcome::Cancelled
    }

    /// Cancel the current run, if any, and invalidate its effects.
    /// Returns whether a run was in flight.
    pub fn cancel_run(&self) -> bool {
        let mut g = self.inner.lock();
        let Some(token) = g.current.take() else {
            return false;
        };
        token.cancel();
        g.latest_run_id += 1;
        g.state = RunState::Cancelled;
        debug!("current run cancelled");
        true
    }

    /// Terminal state → Idle. No-op while a run is in flight.
    pub fn acknowledge(&self) {
        let mut g = self.inner.lock();
        if g.state.is_terminal() {
            g.state = RunState::Idle;
        }
    }

    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        info!(removed, "cache cleared");
        removed
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.count()
    }

    pub fn last_search(&self) -> Option<LastSearch> {
        self.last_search.load()
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let g = self.inner.lock();
        RunSnapshot {
            state: g.state,
            run_id: g.latest_run_id,
            last_error: g.last_error.clone(),
        }
    }
}

/// First 8 hex chars of the fingerprint, for log correlation.
fn short_hash(fp: &str) -> &str {
    let hex = fp.strip_prefix(CACHE_PREFIX).unwrap_or(fp);
    hex.get(..8).unwrap_or(hex)
}
