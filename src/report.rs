//! report.rs: the report model handed to presentation collaborators and cached.
//!
//! One `ReportModel` per successful run. `classification` is `None` exactly when the
//! run hit the "no evidence found" state (no publications in either window and no
//! trials), in which case opportunities are empty as well.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{PicoQuery, QueryMode, SearchExpression};
use crate::sources::PublicationRecord;

/// Statuses that count as "active" research.
pub const ACTIVE_STATUSES: [&str; 3] = [
    "RECRUITING",
    "ACTIVE_NOT_RECRUITING",
    "ENROLLING_BY_INVITATION",
];

/// Registry results reduced to tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialsSummary {
    pub total_count: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub phase_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub raw_studies: Vec<Value>,
}

impl TrialsSummary {
    /// Sum of RECRUITING, ACTIVE_NOT_RECRUITING and ENROLLING_BY_INVITATION.
    /// Status labels match regardless of case and separator style
    /// ("Active, not recruiting" == "ACTIVE_NOT_RECRUITING").
    pub fn active_count(&self) -> u64 {
        self.status_counts
            .iter()
            .filter(|(status, _)| {
                let s = normalize_status(status);
                ACTIVE_STATUSES.contains(&s.as_str())
            })
            .map(|(_, n)| *n)
            .sum()
    }
}

pub(crate) fn normalize_status(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
            prev_sep = false;
        } else if !prev_sep && !out.is_empty() {
            out.push('_');
            prev_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Evidence-maturity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLabel {
    Orphan,
    Emerging,
    /// Part of the label vocabulary; the current rule table never produces it.
    Moderate,
    Mature,
    MatureActive,
    Saturated,
    Indeterminate,
}

impl EvidenceLabel {
    /// Label as shown in the product UI.
    pub fn display_name(self) -> &'static str {
        match self {
            EvidenceLabel::Orphan => "Huérfano",
            EvidenceLabel::Emerging => "Emergente",
            EvidenceLabel::Moderate => "Moderado",
            EvidenceLabel::Mature => "Maduro",
            EvidenceLabel::MatureActive => "Maduro (activo)",
            EvidenceLabel::Saturated => "Saturado",
            EvidenceLabel::Indeterminate => "Indeterminado",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceClassification {
    pub label: EvidenceLabel,
    pub rationale: String,
}

impl EvidenceClassification {
    pub fn new(label: EvidenceLabel, rationale: impl Into<String>) -> Self {
        Self {
            label,
            rationale: rationale.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub query: PicoQuery,
    pub mode: QueryMode,
    pub window_days: u32,
    pub search_expression: SearchExpression,
    pub recent_count: u64,
    /// Ten-year (3650-day) count.
    pub historical_count: u64,
    /// `None` when the auxiliary review/meta-analysis search failed.
    #[serde(default)]
    pub review_meta_analysis_count: Option<u64>,
    pub trials: TrialsSummary,
    #[serde(default)]
    pub classification: Option<EvidenceClassification>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub top_publications: Vec<PublicationRecord>,
    /// Oldest year first.
    #[serde(default)]
    pub yearly_counts: Vec<YearCount>,
    #[serde(default)]
    pub publication_type_counts: BTreeMap<String, u64>,
    pub generated_at: DateTime<Utc>,
}

impl ReportModel {
    /// Nothing in either literature window and no trials.
    pub fn is_empty_result(&self) -> bool {
        is_empty_evidence(self.recent_count, self.historical_count, self.trials.total_count)
    }

    pub fn active_trial_count(&self) -> u64 {
        self.trials.active_count()
    }
}

pub fn is_empty_evidence(recent: u64, historical: u64, trials_total: u64) -> bool {
    recent == 0 && historical == 0 && trials_total == 0
}

/// Tally of publication types over a set of records.
pub fn publication_type_counts(records: &[PublicationRecord]) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for r in records {
        for t in &r.publication_types {
            *out.entry(t.clone()).or_insert(0) += 1;
        }
    }
    out
}
