// src/sources/mod.rs
//! Evidence source adapters: literature index and trials registry.
//!
//! The traits are the seam the aggregation engine depends on; the concrete
//! adapters wrap [`crate::fetch::FetchClient`] and normalize responses.

pub mod literature;
pub mod trials;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use literature::LiteratureAdapter;
pub use trials::TrialsAdapter;

/// Total matches for a window plus the ids sampled for full metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowCount {
    pub total_count: u64,
    pub sample_ids: Vec<String>,
}

/// One literature record from a summaries batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    pub id: String,
    pub title: String,
    pub journal: String,
    pub publication_date: String,
    pub authors: Vec<String>,
    pub publication_types: std::collections::BTreeSet<String>,
}

/// One registry page as returned; studies stay opaque until summarized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialsPage {
    #[serde(default, deserialize_with = "lenient_opt_count")]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub studies: Vec<Value>,
}

#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Matches within the last `window_days`; `sample_size` bounds `sample_ids` only.
    async fn search_window(
        &self,
        term: &str,
        window_days: u32,
        sample_size: u32,
        cancel: &CancellationToken,
    ) -> Result<WindowCount>;

    /// Records in the order of `ids`. An empty slice issues no request.
    async fn fetch_summaries(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicationRecord>>;
}

#[async_trait]
pub trait TrialsSource: Send + Sync {
    async fn search(
        &self,
        term: &str,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<TrialsPage>;
}

// --- lenient wire helpers (indexes often send counts and ids as strings) ---

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Num(u64),
    Float(f64),
    Text(String),
}

impl NumOrText {
    fn as_count(&self) -> Option<u64> {
        match self {
            NumOrText::Num(n) => Some(*n),
            NumOrText::Float(f) if f.is_finite() && *f >= 0.0 => Some(*f as u64),
            NumOrText::Float(_) => None,
            NumOrText::Text(s) => s.trim().parse().ok(),
        }
    }

    fn into_id(self) -> String {
        match self {
            NumOrText::Num(n) => n.to_string(),
            NumOrText::Float(f) => f.to_string(),
            NumOrText::Text(s) => s.trim().to_string(),
        }
    }
}

pub(crate) fn lenient_count<'de, D>(de: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumOrText>::deserialize(de)?;
    Ok(raw.and_then(|v| v.as_count()).unwrap_or(0))
}

pub(crate) fn lenient_opt_count<'de, D>(de: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumOrText>::deserialize(de)?;
    Ok(raw.and_then(|v| v.as_count()))
}

pub(crate) fn lenient_ids<'de, D>(de: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<NumOrText>>::deserialize(de)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(NumOrText::into_id)
        .filter(|s| !s.is_empty())
        .collect())
}
