//! Evidence Gap Radar: binary entrypoint.
//! Boots the Axum HTTP server: config, tracing, metrics and the run controller.

use evidence_gap_radar::{api, build_controller, metrics::Metrics, RadarConfig};
use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines when RADAR_LOG_FORMAT=json.
/// Filter comes from RUST_LOG, falling back to `evidence_gap_radar=info,warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("evidence_gap_radar=info,warn"));

    let json = std::env::var("RADAR_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    // try_init: the runtime may already have installed a subscriber
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        warn!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = RadarConfig::load_default()?;
    info!(
        api_base = %cfg.api_base_url,
        cache_ttl_secs = cfg.cache_ttl_secs,
        max_attempts = cfg.max_attempts,
        "radar config loaded"
    );

    let controller = build_controller(&cfg)?;
    let router = api::create_router(api::AppState::new(controller));

    let router = match Metrics::init(cfg.cache_ttl().as_millis() as u64) {
        Ok(m) => router.merge(m.router()),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            router
        }
    };

    Ok(router.into())
}
