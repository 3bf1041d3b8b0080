//! # Term/Query Builder
//! Pure conversion of a PICO question into one boolean search expression.
//!
//! Two mutually exclusive variants exist:
//! - free text: primary value + synonyms per field, `(a OR b)` within a field
//! - controlled vocabulary: quoted MeSH labels with field qualifiers
//!
//! Fields are always emitted in the order population, intervention, outcome,
//! context and joined with ` AND `. Empty fields contribute nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four PICO slots, in expression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PicoField {
    Population,
    Intervention,
    Outcome,
    Context,
}

impl PicoField {
    pub const ALL: [PicoField; 4] = [
        PicoField::Population,
        PicoField::Intervention,
        PicoField::Outcome,
        PicoField::Context,
    ];
}

/// One value per PICO field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PerField<T> {
    pub population: T,
    pub intervention: T,
    pub outcome: T,
    pub context: T,
}

impl<T> PerField<T> {
    pub fn get(&self, field: PicoField) -> &T {
        match field {
            PicoField::Population => &self.population,
            PicoField::Intervention => &self.intervention,
            PicoField::Outcome => &self.outcome,
            PicoField::Context => &self.context,
        }
    }

    pub fn get_mut(&mut self, field: PicoField) -> &mut T {
        match field {
            PicoField::Population => &mut self.population,
            PicoField::Intervention => &mut self.intervention,
            PicoField::Outcome => &mut self.outcome,
            PicoField::Context => &mut self.context,
        }
    }
}

/// A controlled-vocabulary (MeSH) heading chosen for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyTerm {
    pub label: String,
    #[serde(default)]
    pub identifier: String,
    /// Exploded search (narrower headings included).
    #[serde(default = "default_true")]
    pub include_narrower: bool,
    #[serde(default)]
    pub is_major_topic: bool,
}

fn default_true() -> bool {
    true
}

impl VocabularyTerm {
    pub fn new(label: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.into(),
            include_narrower: true,
            is_major_topic: false,
        }
    }

    pub fn no_explode(mut self) -> Self {
        self.include_narrower = false;
        self
    }

    pub fn major(mut self) -> Self {
        self.is_major_topic = true;
        self
    }

    /// `"label"[MeSH Terms]`, `[MeSH Terms:noexp]`, `[Majr]` or `[Majr:noexp]`.
    pub fn render(&self) -> Option<String> {
        let label: String = self.label.trim().chars().filter(|c| *c != '"').collect();
        if label.is_empty() {
            return None;
        }
        let tag = match (self.is_major_topic, self.include_narrower) {
            (true, true) => "Majr",
            (true, false) => "Majr:noexp",
            (false, true) => "MeSH Terms",
            (false, false) => "MeSH Terms:noexp",
        };
        Some(format!("\"{label}\"[{tag}]"))
    }
}

/// Immutable input to one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicoQuery {
    #[serde(default)]
    pub population: String,
    #[serde(default)]
    pub intervention: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub synonyms: PerField<Vec<String>>,
    #[serde(default)]
    pub vocabulary: PerField<Vec<VocabularyTerm>>,
}

impl PicoQuery {
    pub fn new(
        population: impl Into<String>,
        intervention: impl Into<String>,
        outcome: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            population: population.into(),
            intervention: intervention.into(),
            outcome: outcome.into(),
            context: context.into(),
            ..Default::default()
        }
    }

    pub fn with_synonyms<I, S>(mut self, field: PicoField, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms
            .get_mut(field)
            .extend(synonyms.into_iter().map(Into::into));
        self
    }

    pub fn with_vocabulary(mut self, field: PicoField, term: VocabularyTerm) -> Self {
        self.vocabulary.get_mut(field).push(term);
        self
    }

    pub fn primary(&self, field: PicoField) -> &str {
        match field {
            PicoField::Population => &self.population,
            PicoField::Intervention => &self.intervention,
            PicoField::Outcome => &self.outcome,
            PicoField::Context => &self.context,
        }
    }

    /// Primary value followed by synonyms: trimmed, blanks and case-insensitive
    /// repeats dropped, first spelling kept.
    pub fn free_text_terms(&self, field: PicoField) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let candidates =
            std::iter::once(self.primary(field)).chain(self.synonyms.get(field).iter().map(String::as_str));
        for raw in candidates {
            let t = raw.trim();
            if t.is_empty() {
                continue;
            }
            if out.iter().any(|seen| seen.eq_ignore_ascii_case(t)) {
                continue;
            }
            out.push(t.to_string());
        }
        out
    }
}

/// Which builder variant produced an expression. Part of the cache fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    FreeText,
    Vocabulary,
}

impl QueryMode {
    pub fn tag(self) -> &'static str {
        match self {
            QueryMode::FreeText => "text",
            QueryMode::Vocabulary => "mesh",
        }
    }
}

/// Boolean search expression sent to both sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchExpression(String);

impl SearchExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self AND (filter)`; used for the review/meta-analysis sub-query.
    pub fn and(&self, filter: &str) -> SearchExpression {
        let filter = filter.trim();
        if filter.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return SearchExpression(format!("({filter})"));
        }
        SearchExpression(format!("{} AND ({filter})", self.0))
    }
}

impl fmt::Display for SearchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the expression for `mode`. The other variant's inputs are ignored.
pub fn build(query: &PicoQuery, mode: QueryMode) -> SearchExpression {
    match mode {
        QueryMode::FreeText => build_free_text(query),
        QueryMode::Vocabulary => build_vocabulary(query),
    }
}

pub fn build_free_text(query: &PicoQuery) -> SearchExpression {
    let parts = PicoField::ALL
        .iter()
        .filter_map(|&field| {
            let terms = query.free_text_terms(field);
            match terms.len() {
                0 => None,
                1 => Some(format!("({})", terms[0])),
                _ => Some(format!("({})", terms.join(" OR "))),
            }
        })
        .collect::<Vec<_>>();
    SearchExpression(parts.join(" AND "))
}

pub fn build_vocabulary(query: &PicoQuery) -> SearchExpression {
    let parts = PicoField::ALL
        .iter()
        .filter_map(|&field| {
            let rendered = query
                .vocabulary
                .get(field)
                .iter()
                .filter_map(VocabularyTerm::render)
                .collect::<Vec<_>>();
            match rendered.len() {
                0 => None,
                1 => rendered.into_iter().next(),
                _ => Some(format!("({})", rendered.join(" OR "))),
            }
        })
        .collect::<Vec<_>>();
    SearchExpression(parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_terms_are_parenthesized_and_and_joined() {
        let q = PicoQuery::new("diabetes", "metformin", "", "  ");
        assert_eq!(build_free_text(&q).as_str(), "(diabetes) AND (metformin)");
    }

    #[test]
    fn synonyms_are_or_joined_within_field() {
        let q = PicoQuery::new("pacientes VIH", "telefarmacia", "adherencia", "")
            .with_synonyms(PicoField::Population, ["HIV patients", " ", "people living with HIV"])
            .with_synonyms(PicoField::Outcome, ["ADHERENCIA", "medication adherence"]);
        assert_eq!(
            build_free_text(&q).as_str(),
            "(pacientes VIH OR HIV patients OR people living with HIV) AND (telefarmacia) AND (adherencia OR medication adherence)"
        );
    }

    #[test]
    fn synonyms_alone_fill_an_empty_primary() {
        let q = PicoQuery::default().with_synonyms(PicoField::Context, ["primary care"]);
        assert_eq!(build_free_text(&q).as_str(), "(primary care)");
    }

    #[test]
    fn empty_query_yields_empty_expression() {
        assert!(build(&PicoQuery::default(), QueryMode::FreeText).is_empty());
        assert!(build(&PicoQuery::default(), QueryMode::Vocabulary).is_empty());
    }

    #[test]
    fn vocabulary_tags_cover_explode_and_major_combinations() {
        assert_eq!(
            VocabularyTerm::new("Diabetes Mellitus", "D003920").render().unwrap(),
            "\"Diabetes Mellitus\"[MeSH Terms]"
        );
        assert_eq!(
            VocabularyTerm::new("Metformin", "D008687").no_explode().render().unwrap(),
            "\"Metformin\"[MeSH Terms:noexp]"
        );
        assert_eq!(
            VocabularyTerm::new("Metformin", "D008687").major().render().unwrap(),
            "\"Metformin\"[Majr]"
        );
        assert_eq!(
            VocabularyTerm::new("Metformin", "D008687")
                .major()
                .no_explode()
                .render()
                .unwrap(),
            "\"Metformin\"[Majr:noexp]"
        );
        assert!(VocabularyTerm::new("  ", "D0").render().is_none());
    }

    #[test]
    fn vocabulary_mode_ignores_free_text() {
        let q = PicoQuery::new("ignored", "", "", "")
            .with_vocabulary(PicoField::Population, VocabularyTerm::new("HIV Infections", "D015658"))
            .with_vocabulary(PicoField::Population, VocabularyTerm::new("HIV", "D006678").major())
            .with_vocabulary(PicoField::Outcome, VocabularyTerm::new("Medication Adherence", "D055118"));
        assert_eq!(
            build(&q, QueryMode::Vocabulary).as_str(),
            "(\"HIV Infections\"[MeSH Terms] OR \"HIV\"[Majr]) AND \"Medication Adherence\"[MeSH Terms]"
        );
        assert_eq!(build(&q, QueryMode::FreeText).as_str(), "(ignored)");
    }

    #[test]
    fn and_appends_parenthesized_filter() {
        let e = build_free_text(&PicoQuery::new("asthma", "", "", ""));
        assert_eq!(
            e.and("review[pt] OR meta-analysis[pt]").as_str(),
            "(asthma) AND (review[pt] OR meta-analysis[pt])"
        );
    }
}
