// tests/common/mod.rs
//
// Shared test doubles: scripted transport, recording sleeper, manual clock and
// in-memory evidence sources.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use evidence_gap_radar::aggregate::Aggregator;
use evidence_gap_radar::cache::{MemoryStore, ReportCache};
use evidence_gap_radar::clock::{Clock, Sleeper};
use evidence_gap_radar::controller::{RunController, DEFAULT_WINDOW_DAYS};
use evidence_gap_radar::error::{RadarError, Result};
use evidence_gap_radar::fetch::{RawResponse, Transport};
use evidence_gap_radar::last_search::LastSearchStore;
use evidence_gap_radar::sources::{
    LiteratureSource, PublicationRecord, TrialsPage, TrialsSource, WindowCount,
};

// ------------------------------------------------------------
// Transport / sleeper / clock
// ------------------------------------------------------------

/// Replies from a fixed script, in order. Panics if the script runs dry.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse>>>,
    pub calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<RawResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<RawResponse> {
        self.calls.lock().push((
            path.to_string(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
        self.script
            .lock()
            .pop_front()
            .expect("scripted transport ran out of responses")
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}

/// Never wakes up; only cancellation ends the wait.
#[derive(Default)]
pub struct StuckSleeper {
    pub entered: AtomicUsize,
}

#[async_trait]
impl Sleeper for StuckSleeper {
    async fn sleep(&self, _delay: Duration) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        futures::future::pending::<()>().await;
    }
}

pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicI64::new(start_ms),
        })
    }

    pub fn advance(&self, d: Duration) {
        self.now_ms
            .fetch_add(d.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// 2026-01-15T00:00:00Z
pub const T0_MS: i64 = 1_768_435_200_000;

// ------------------------------------------------------------
// Evidence sources
// ------------------------------------------------------------

/// Literature index answering from a window → count table.
pub struct FakeLiterature {
    pub counts: HashMap<u32, u64>,
    pub sample_ids: Vec<String>,
    pub review: Option<std::result::Result<u64, RadarError>>,
    /// Error returned for every non-review search when set.
    pub fail_with: Option<RadarError>,
    /// Searches whose term contains this marker wait on `gate`, ignoring cancellation.
    pub slow_marker: Option<String>,
    pub gate: Arc<Semaphore>,
    pub waiting: AtomicUsize,
    pub calls: AtomicUsize,
}

impl Default for FakeLiterature {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
            sample_ids: Vec::new(),
            review: None,
            fail_with: None,
            slow_marker: None,
            gate: Arc::new(Semaphore::new(0)),
            waiting: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeLiterature {
    pub fn with_counts(recent: u64, historical: u64) -> Self {
        let mut counts = HashMap::new();
        counts.insert(365, recent);
        counts.insert(730, recent);
        counts.insert(1095, recent);
        counts.insert(1460, recent);
        counts.insert(1825, recent);
        counts.insert(3650, historical);
        Self {
            counts,
            ..Default::default()
        }
    }

    pub fn sample(mut self, ids: &[&str]) -> Self {
        self.sample_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn review(mut self, r: std::result::Result<u64, RadarError>) -> Self {
        self.review = Some(r);
        self
    }

    pub fn failing(mut self, e: RadarError) -> Self {
        self.fail_with = Some(e);
        self
    }

    pub fn slow_on(mut self, marker: &str) -> Self {
        self.slow_marker = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiteratureSource for FakeLiterature {
    async fn search_window(
        &self,
        term: &str,
        window_days: u32,
        sample_size: u32,
        cancel: &CancellationToken,
    ) -> Result<WindowCount> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.slow_marker {
            if term.contains(marker.as_str()) {
                self.waiting.fetch_add(1, Ordering::SeqCst);
                let _permit = self.gate.acquire().await;
            }
        } else if cancel.is_cancelled() {
            return Err(RadarError::Cancelled);
        }

        if term.contains("[pt]") {
            return match &self.review {
                Some(Ok(n)) => Ok(WindowCount {
                    total_count: *n,
                    sample_ids: Vec::new(),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Ok(WindowCount::default()),
            };
        }
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let total_count = self.counts.get(&window_days).copied().unwrap_or(0);
        let mut sample_ids = self.sample_ids.clone();
        sample_ids.truncate(sample_size as usize);
        Ok(WindowCount {
            total_count,
            sample_ids,
        })
    }

    async fn fetch_summaries(
        &self,
        ids: &[String],
        _cancel: &CancellationToken,
    ) -> Result<Vec<PublicationRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .map(|id| PublicationRecord {
                id: id.clone(),
                title: format!("Record {id}"),
                publication_types: ["Journal Article".to_string()].into_iter().collect(),
                ..Default::default()
            })
            .collect())
    }
}

/// Registry answering with a fixed list of study statuses.
#[derive(Default)]
pub struct FakeTrials {
    pub statuses: Vec<&'static str>,
    pub total: Option<u64>,
    pub calls: AtomicUsize,
}

impl FakeTrials {
    pub fn with_statuses(statuses: &[&'static str]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            total: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrialsSource for FakeTrials {
    async fn search(
        &self,
        _term: &str,
        _page_size: u32,
        _cancel: &CancellationToken,
    ) -> Result<TrialsPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let studies: Vec<Value> = self
            .statuses
            .iter()
            .map(|s| json!({"status": s, "phases": ["PHASE2"]}))
            .collect();
        Ok(TrialsPage {
            total_count: self.total,
            studies,
        })
    }
}

// ------------------------------------------------------------
// Controller harness
// ------------------------------------------------------------

pub struct Harness {
    pub controller: Arc<RunController>,
    pub literature: Arc<FakeLiterature>,
    pub trials: Arc<FakeTrials>,
    pub cache: Arc<ReportCache>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(literature: FakeLiterature, trials: FakeTrials) -> Harness {
    harness_with_window(literature, trials, DEFAULT_WINDOW_DAYS)
}

/// Harness whose controller falls back to `default_window_days`.
pub fn harness_with_window(
    literature: FakeLiterature,
    trials: FakeTrials,
    default_window_days: u32,
) -> Harness {
    let literature = Arc::new(literature);
    let trials = Arc::new(trials);
    let clock = ManualClock::new(T0_MS);
    let store = Arc::new(MemoryStore::new());

    let aggregator = Aggregator::new(literature.clone(), trials.clone()).with_clock(clock.clone());
    let cache = Arc::new(ReportCache::new(store.clone()).with_clock(clock.clone()));
    let controller = RunController::new(
        Arc::new(aggregator),
        cache.clone(),
        LastSearchStore::new(store),
    )
    .with_clock(clock.clone())
    .with_default_window_days(default_window_days);

    Harness {
        controller: Arc::new(controller),
        literature,
        trials,
        cache,
        clock,
    }
}
