//! # Aggregation Engine
//! Fans one run out across the evidence sources and folds the answers into a
//! `ReportModel`.
//!
//! Phase 1 (parallel): recent window, 10-year window, trials page, and the
//! best-effort review/meta-analysis count. Phase 2 (parallel, only when phase 1
//! found something): summaries for the sampled ids and the optional yearly trend.
//! Every mandatory call fails the run; the review count degrades to `None`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Datelike;
use futures::future::try_join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::query::{PicoQuery, QueryMode, SearchExpression};
use crate::report::{is_empty_evidence, publication_type_counts, ReportModel, TrialsSummary};
use crate::rules::{classify, opportunities, EvidenceSignals};
use crate::sources::{LiteratureSource, TrialsPage, TrialsSource};
use crate::trend::{yearly_counts, TREND_WINDOWS_DAYS};

pub const HISTORICAL_WINDOW_DAYS: u32 = 3650;
pub const DEFAULT_SAMPLE_SIZE: u32 = 10;
pub const DEFAULT_TRIALS_PAGE_SIZE: u32 = 25;
pub const DEFAULT_REVIEW_FILTER: &str =
    "review[pt] OR systematic review[pt] OR meta-analysis[pt]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSettings {
    pub historical_window_days: u32,
    pub sample_size: u32,
    pub trials_page_size: u32,
    pub trend_enabled: bool,
    pub review_filter: String,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            historical_window_days: HISTORICAL_WINDOW_DAYS,
            sample_size: DEFAULT_SAMPLE_SIZE,
            trials_page_size: DEFAULT_TRIALS_PAGE_SIZE,
            trend_enabled: true,
            review_filter: DEFAULT_REVIEW_FILTER.to_string(),
        }
    }
}

/// Inputs of one analysis, already validated by the controller.
#[derive(Debug, Clone)]
pub struct AnalysisInput<'a> {
    pub query: &'a PicoQuery,
    pub mode: QueryMode,
    pub expression: &'a SearchExpression,
    pub window_days: u32,
}

pub struct Aggregator {
    literature: Arc<dyn LiteratureSource>,
    trials: Arc<dyn TrialsSource>,
    settings: AggregationSettings,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(literature: Arc<dyn LiteratureSource>, trials: Arc<dyn TrialsSource>) -> Self {
        Self {
            literature,
            trials,
            settings: AggregationSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_settings(mut self, settings: AggregationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn analyze(
        &self,
        input: AnalysisInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<ReportModel> {
        let term = input.expression.as_str();
        let s = &self.settings;
        let lit = self.literature.as_ref();

        // (1) Independent counts
        let review_term = input.expression.and(&s.review_filter);
        let review = async {
            match lit
                .search_window(review_term.as_str(), s.historical_window_days, 0, cancel)
                .await
            {
                Ok(w) => Ok(Some(w.total_count)),
                Err(e) if e.is_cancelled() => Err(e),
                Err(e) => {
                    warn!(error = %e, "review/meta-analysis count unavailable");
                    Ok(None)
                }
            }
        };
        let (recent, historical, trials_page, review_count) = tokio::try_join!(
            lit.search_window(term, input.window_days, s.sample_size, cancel),
            lit.search_window(term, s.historical_window_days, 0, cancel),
            self.trials.search(term, s.trials_page_size, cancel),
            review,
        )?;

        let trials = summarize_trials(trials_page);
        let mut report = ReportModel {
            query: input.query.clone(),
            mode: input.mode,
            window_days: input.window_days,
            search_expression: input.expression.clone(),
            recent_count: recent.total_count,
            historical_count: historical.total_count,
            review_meta_analysis_count: review_count,
            trials,
            classification: None,
            opportunities: Vec::new(),
            top_publications: Vec::new(),
            yearly_counts: Vec::new(),
            publication_type_counts: BTreeMap::new(),
            generated_at: self.clock.now(),
        };

        if is_empty_evidence(
            report.recent_count,
            report.historical_count,
            report.trials.total_count,
        ) {
            debug!("no evidence in any source; skipping classification");
            return Ok(report);
        }

        // (2) Dependent fetches
        let summaries = async {
            if recent.sample_ids.is_empty() {
                Ok(Vec::new())
            } else {
                lit.fetch_summaries(&recent.sample_ids, cancel).await
            }
        };
        let trend = async {
            if !s.trend_enabled {
                return Ok(Vec::new());
            }
            try_join_all(
                TREND_WINDOWS_DAYS
                    .iter()
                    .map(|&days| lit.search_window(term, days, 0, cancel)),
            )
            .await
            .map(|ws| ws.into_iter().map(|w| w.total_count).collect::<Vec<_>>())
        };
        let (top_publications, cumulative) = tokio::try_join!(summaries, trend)?;

        if !cumulative.is_empty() {
            report.yearly_counts =
                yearly_counts(report.generated_at.year(), report.recent_count, &cumulative);
        }
        report.publication_type_counts = publication_type_counts(&top_publications);
        report.top_publications = top_publications;

        // (3) Rules
        let signals = EvidenceSignals::from_report(&report);
        report.classification = Some(classify(&signals));
        report.opportunities = opportunities(&signals);

        Ok(report)
    }
}

/// Tally statuses and phases of a registry page. Missing `totalCount` falls back
/// to the number of studies on the page, which undercounts paginated results.
pub fn summarize_trials(page: TrialsPage) -> TrialsSummary {
    let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut phase_counts: BTreeMap<String, u64> = BTreeMap::new();

    for study in &page.studies {
        *status_counts.entry(study_status(study)).or_insert(0) += 1;
        *phase_counts.entry(study_phase(study)).or_insert(0) += 1;
    }

    TrialsSummary {
        total_count: page.total_count.unwrap_or(page.studies.len() as u64),
        status_counts,
        phase_counts,
        raw_studies: page.studies,
    }
}

fn study_status(study: &Value) -> String {
    study
        .get("status")
        .or_else(|| study.pointer("/protocolSection/statusModule/overallStatus"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("UNKNOWN")
        .to_string()
}

fn study_phase(study: &Value) -> String {
    let raw = study
        .get("phases")
        .or_else(|| study.pointer("/protocolSection/designModule/phases"));
    let phases: Vec<&str> = match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect(),
        Some(Value::String(p)) if !p.trim().is_empty() => vec![p.trim()],
        _ => Vec::new(),
    };
    if phases.is_empty() {
        "unspecified".to_string()
    } else {
        phases.join(",")
    }
}
