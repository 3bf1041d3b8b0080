//! # Classification Rules
//! Pure, testable logic that maps aggregate counts → `EvidenceClassification`
//! and a short list of research opportunities. No I/O.
//!
//! Maturity policy is evaluated top-down, first match wins:
//! 1. historical < 20, no active trials        → Orphan
//! 2. historical < 50, active trials           → Emerging
//! 3. 50 ≤ historical ≤ 300                    → Mature
//! 4. historical > 300, no active trials       → Saturated
//! 5. historical > 300, active trials          → MatureActive
//! 6. recent/historical > 0.4 (both non-zero)  → Emerging
//! 7. otherwise                                → Indeterminate
//!
//! The 20..50 band with no active trials and a low recent ratio deliberately
//! lands on Indeterminate.

use crate::report::{EvidenceClassification, EvidenceLabel, ReportModel};

pub const MAX_OPPORTUNITIES: usize = 4;

/// Counts the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvidenceSignals {
    pub recent_count: u64,
    pub historical_count: u64,
    pub active_trials: u64,
}

impl EvidenceSignals {
    pub fn new(recent_count: u64, historical_count: u64, active_trials: u64) -> Self {
        Self {
            recent_count,
            historical_count,
            active_trials,
        }
    }

    pub fn from_report(report: &ReportModel) -> Self {
        Self::new(
            report.recent_count,
            report.historical_count,
            report.active_trial_count(),
        )
    }

    fn recent_ratio(&self) -> Option<f64> {
        if self.recent_count > 0 && self.historical_count > 0 {
            Some(self.recent_count as f64 / self.historical_count as f64)
        } else {
            None
        }
    }
}

pub fn classify(s: &EvidenceSignals) -> EvidenceClassification {
    let total = s.historical_count;
    let active = s.active_trials;

    if total < 20 && active == 0 {
        return EvidenceClassification::new(
            EvidenceLabel::Orphan,
            "Muy pocas publicaciones y sin ensayos activos.",
        );
    }
    if total < 50 && active >= 1 {
        return EvidenceClassification::new(
            EvidenceLabel::Emerging,
            "Pocas publicaciones, pero hay ensayos activos.",
        );
    }
    if (50..=300).contains(&total) {
        return EvidenceClassification::new(
            EvidenceLabel::Mature,
            "Volumen moderado; potencial para implementación/comparativos.",
        );
    }
    if total > 300 && active == 0 {
        return EvidenceClassification::new(
            EvidenceLabel::Saturated,
            "Mucho publicado; pocos ensayos activos.",
        );
    }
    if total > 300 && active >= 1 {
        return EvidenceClassification::new(
            EvidenceLabel::MatureActive,
            "Muy publicado pero aún con investigación activa.",
        );
    }
    if s.recent_ratio().is_some_and(|r| r > 0.4) {
        return EvidenceClassification::new(
            EvidenceLabel::Emerging,
            "Proporción alta de publicaciones recientes; posible crecimiento.",
        );
    }
    EvidenceClassification::new(
        EvidenceLabel::Indeterminate,
        "Señales mixtas; conviene afinar términos.",
    )
}

/// Independent suggestions, in rule order, capped at [`MAX_OPPORTUNITIES`].
pub fn opportunities(s: &EvidenceSignals) -> Vec<String> {
    let total = s.historical_count;
    let recent = s.recent_count;
    let active = s.active_trials;

    let mut out = Vec::new();
    if total < 20 {
        out.push("Evidencia escasa: plantear piloto/factibilidad o estudio cualitativo/mixto.");
    }
    if (20..80).contains(&total) && active == 0 {
        out.push("Poca tracción en ensayos: oportunidad para estudio de implementación o vida real.");
    }
    if active >= 1 {
        out.push("Hay ensayos activos: mapear outcomes, comparabilidad y brechas.");
    }
    if recent == 0 && total > 0 {
        out.push("Sin señales recientes: revisar sinónimos/MeSH o reformular la pregunta.");
    }
    if out.is_empty() {
        out.push("Afina términos (sinónimos, población u outcome) y repite.");
    }

    out.into_iter()
        .take(MAX_OPPORTUNITIES)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(recent: u64, historical: u64, active: u64) -> EvidenceLabel {
        classify(&EvidenceSignals::new(recent, historical, active)).label
    }

    #[test]
    fn orphan_boundary_is_twenty() {
        assert_eq!(label(0, 19, 0), EvidenceLabel::Orphan);
        assert_ne!(label(0, 20, 0), EvidenceLabel::Orphan);
        assert_eq!(label(0, 20, 0), EvidenceLabel::Indeterminate);
    }

    #[test]
    fn emerging_with_active_trials_below_fifty() {
        assert_eq!(label(0, 5, 1), EvidenceLabel::Emerging);
        assert_eq!(label(0, 49, 3), EvidenceLabel::Emerging);
    }

    #[test]
    fn mature_band_is_inclusive() {
        assert_eq!(label(0, 50, 0), EvidenceLabel::Mature);
        assert_eq!(label(0, 300, 5), EvidenceLabel::Mature);
    }

    #[test]
    fn above_three_hundred_splits_on_active_trials() {
        assert_eq!(label(10, 301, 0), EvidenceLabel::Saturated);
        assert_eq!(label(10, 600, 2), EvidenceLabel::MatureActive);
    }

    #[test]
    fn recent_ratio_rescues_middle_band() {
        assert_eq!(label(13, 30, 0), EvidenceLabel::Emerging);
        // exactly 0.4 is not "greater than"
        assert_eq!(label(12, 30, 0), EvidenceLabel::Indeterminate);
    }

    #[test]
    fn opportunities_accumulate_in_order_and_fallback() {
        let o = opportunities(&EvidenceSignals::new(0, 10, 0));
        assert_eq!(o.len(), 2);
        assert!(o[0].contains("piloto/factibilidad"));
        assert!(o[1].contains("reformular"));

        let o = opportunities(&EvidenceSignals::new(5, 40, 0));
        assert_eq!(o.len(), 1);
        assert!(o[0].contains("implementación"));

        let o = opportunities(&EvidenceSignals::new(5, 500, 0));
        assert_eq!(o, vec!["Afina términos (sinónimos, población u outcome) y repite.".to_string()]);
    }

    #[test]
    fn opportunities_never_exceed_cap() {
        for recent in [0, 3] {
            for total in [0, 10, 25, 90, 400] {
                for active in [0, 2] {
                    let o = opportunities(&EvidenceSignals::new(recent, total, active));
                    assert!(!o.is_empty() && o.len() <= MAX_OPPORTUNITIES);
                }
            }
        }
    }
}
