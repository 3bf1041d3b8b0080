// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod last_search;
pub mod metrics;
pub mod query;
pub mod report;
pub mod rules;
pub mod sources;
pub mod trend;

// ---- Re-exports for stable public API ----
pub use crate::config::RadarConfig;
pub use crate::controller::{RunController, RunOutcome, RunRequest, RunState};
pub use crate::error::{RadarError, Result};
pub use crate::query::{PicoQuery, QueryMode};
pub use crate::report::ReportModel;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::aggregate::Aggregator;
use crate::cache::{CacheStore, FileStore, MemoryStore, ReportCache};
use crate::fetch::{FetchClient, HttpTransport};
use crate::last_search::LastSearchStore;
use crate::sources::{LiteratureAdapter, TrialsAdapter};

/// Wire the HTTP transport, adapters, aggregator, cache and controller from config.
pub fn build_controller(cfg: &RadarConfig) -> anyhow::Result<Arc<RunController>> {
    let transport = HttpTransport::new(
        cfg.api_base_url.clone(),
        cfg.connect_timeout(),
        cfg.request_timeout(),
    )
    .context("building HTTP client")?;
    let client = Arc::new(FetchClient::new(Arc::new(transport)).with_policy(cfg.retry_policy()));

    let aggregator = Aggregator::new(
        Arc::new(LiteratureAdapter::new(client.clone())),
        Arc::new(TrialsAdapter::new(client)),
    )
    .with_settings(cfg.aggregation());

    let store: Arc<dyn CacheStore> = match &cfg.cache_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "file-backed report cache");
            Arc::new(FileStore::new(dir))
        }
        None => Arc::new(MemoryStore::new()),
    };
    let cache = ReportCache::new(store.clone()).with_ttl(cfg.cache_ttl());

    Ok(Arc::new(
        RunController::new(
            Arc::new(aggregator),
            Arc::new(cache),
            LastSearchStore::new(store),
        )
        .with_default_window_days(cfg.default_window_days),
    ))
}
