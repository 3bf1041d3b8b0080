//! Last submitted search, persisted so a client can prefill its form.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheStore;
use crate::query::{PicoQuery, QueryMode};

pub const LAST_SEARCH_KEY: &str = "egr_last_search";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSearch {
    pub query: PicoQuery,
    pub window_days: u32,
    pub mode: QueryMode,
    pub saved_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LastSearchStore {
    store: Arc<dyn CacheStore>,
}

impl LastSearchStore {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Best-effort; a failed write only logs.
    pub fn save(&self, search: &LastSearch) {
        match serde_json::to_string(search) {
            Ok(json) => {
                if let Err(e) = self.store.set(LAST_SEARCH_KEY, &json) {
                    debug!(error = %e, "last search not saved");
                }
            }
            Err(e) => debug!(error = %e, "last search not serializable"),
        }
    }

    pub fn load(&self) -> Option<LastSearch> {
        let raw = self.store.get(LAST_SEARCH_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn clear(&self) {
        self.store.remove(LAST_SEARCH_KEY);
    }
}
