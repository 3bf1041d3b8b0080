// src/sources/trials.rs
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{TrialsPage, TrialsSource};
use crate::error::{RadarError, Result};
use crate::fetch::{FetchClient, FetchOptions};

pub const SEARCH_PATH: &str = "/api/trials/search";

/// Trials registry adapter. Returns the raw page; tallying happens in
/// [`crate::aggregate::summarize_trials`].
pub struct TrialsAdapter {
    client: Arc<FetchClient>,
}

impl TrialsAdapter {
    pub fn new(client: Arc<FetchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrialsSource for TrialsAdapter {
    async fn search(
        &self,
        term: &str,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<TrialsPage> {
        let params = [
            ("query", term.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        let v = self
            .client
            .fetch_json(SEARCH_PATH, &params, &FetchOptions::new(cancel.clone()))
            .await?;
        serde_json::from_value(v).map_err(|e| RadarError::Decode(format!("trials search: {e}")))
    }
}
