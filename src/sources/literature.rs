// src/sources/literature.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{lenient_count, lenient_ids, LiteratureSource, PublicationRecord, WindowCount};
use crate::error::{RadarError, Result};
use crate::fetch::{FetchClient, FetchOptions};

pub const SEARCH_PATH: &str = "/api/literature/search";
pub const SUMMARIES_PATH: &str = "/api/literature/summaries";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResp {
    #[serde(default, deserialize_with = "lenient_count")]
    total_count: u64,
    #[serde(default, deserialize_with = "lenient_ids")]
    sample_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummariesResp {
    #[serde(default)]
    records: HashMap<String, RawRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRecord {
    title: Option<String>,
    #[serde(alias = "fulljournalname")]
    journal: Option<String>,
    #[serde(alias = "publicationDate")]
    pubdate: Option<String>,
    authors: Vec<RawAuthor>,
    #[serde(alias = "pubtype")]
    publication_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAuthor {
    Name(String),
    Object { name: Option<String> },
}

impl RawAuthor {
    fn into_name(self) -> Option<String> {
        let n = match self {
            RawAuthor::Name(s) => s,
            RawAuthor::Object { name } => name?,
        };
        let t = n.trim();
        (!t.is_empty()).then(|| t.to_string())
    }
}

fn normalize_record(id: &str, raw: RawRecord) -> PublicationRecord {
    let clean = |s: Option<String>| s.map(|v| v.trim().to_string()).unwrap_or_default();
    PublicationRecord {
        id: id.to_string(),
        title: clean(raw.title),
        journal: clean(raw.journal),
        publication_date: clean(raw.pubdate),
        authors: raw
            .authors
            .into_iter()
            .filter_map(RawAuthor::into_name)
            .collect(),
        publication_types: raw
            .publication_types
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>(),
    }
}

/// Literature index adapter over the shared fetch client.
pub struct LiteratureAdapter {
    client: Arc<FetchClient>,
}

impl LiteratureAdapter {
    pub fn new(client: Arc<FetchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LiteratureSource for LiteratureAdapter {
    async fn search_window(
        &self,
        term: &str,
        window_days: u32,
        sample_size: u32,
        cancel: &CancellationToken,
    ) -> Result<WindowCount> {
        let params = [
            ("term", term.to_string()),
            ("windowDays", window_days.to_string()),
            ("sampleSize", sample_size.to_string()),
        ];
        let v = self
            .client
            .fetch_json(SEARCH_PATH, &params, &FetchOptions::new(cancel.clone()))
            .await?;
        let resp: SearchResp =
            serde_json::from_value(v).map_err(|e| RadarError::Decode(format!("literature search: {e}")))?;

        let mut sample_ids = resp.sample_ids;
        sample_ids.truncate(sample_size as usize);
        Ok(WindowCount {
            total_count: resp.total_count,
            sample_ids,
        })
    }

    async fn fetch_summaries(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicationRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = [("ids", ids.join(","))];
        let v = self
            .client
            .fetch_json(SUMMARIES_PATH, &params, &FetchOptions::new(cancel.clone()))
            .await?;
        let mut resp: SummariesResp = serde_json::from_value(v)
            .map_err(|e| RadarError::Decode(format!("literature summaries: {e}")))?;

        Ok(ids
            .iter()
            .filter_map(|id| resp.records.remove(id).map(|raw| normalize_record(id, raw)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_normalization_handles_both_author_shapes() {
        let raw: RawRecord = serde_json::from_str(
            r#"{
                "title": " Metformin and outcomes ",
                "fulljournalname": "Diabetes Care",
                "pubdate": "2023 Jan",
                "authors": ["Smith J", {"name": "Doe A"}, {"name": null}, "  "],
                "pubtype": ["Review", "Journal Article", "Review"]
            }"#,
        )
        .unwrap();
        let rec = normalize_record("123", raw);
        assert_eq!(rec.title, "Metformin and outcomes");
        assert_eq!(rec.journal, "Diabetes Care");
        assert_eq!(rec.publication_date, "2023 Jan");
        assert_eq!(rec.authors, vec!["Smith J".to_string(), "Doe A".to_string()]);
        assert_eq!(rec.publication_types.len(), 2);
    }

    #[test]
    fn search_response_accepts_string_count_and_numeric_ids() {
        let r: SearchResp =
            serde_json::from_str(r#"{"totalCount":"17","sampleIds":[101, "102"]}"#).unwrap();
        assert_eq!(r.total_count, 17);
        assert_eq!(r.sample_ids, vec!["101".to_string(), "102".to_string()]);
    }
}
