// src/config/radar.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::aggregate::{
    AggregationSettings, DEFAULT_REVIEW_FILTER, DEFAULT_SAMPLE_SIZE, DEFAULT_TRIALS_PAGE_SIZE,
    HISTORICAL_WINDOW_DAYS,
};
use crate::fetch::{RetryPolicy, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};

pub const ENV_CONFIG_PATH: &str = "RADAR_CONFIG_PATH";
pub const ENV_API_BASE: &str = "RADAR_API_BASE";
pub const ENV_CACHE_DIR: &str = "RADAR_CACHE_DIR";
pub const ENV_CACHE_TTL_SECS: &str = "RADAR_CACHE_TTL_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "RADAR_MAX_ATTEMPTS";

const DEFAULT_CONFIG_PATH: &str = "config/radar.toml";
const DEFAULT_API_BASE: &str = "http://localhost:8787";
const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Base URL of the proxy serving `/api/literature/*` and `/api/trials/*`.
    pub api_base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub cache_ttl_secs: u64,
    /// File-backed cache when set; in-memory otherwise.
    pub cache_dir: Option<PathBuf>,
    pub default_window_days: u32,
    pub historical_window_days: u32,
    pub sample_size: u32,
    pub trials_page_size: u32,
    pub trend_enabled: bool,
    pub review_filter: String,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            connect_timeout_ms: 4_000,
            request_timeout_ms: 15_000,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_dir: None,
            default_window_days: DEFAULT_WINDOW_DAYS,
            historical_window_days: HISTORICAL_WINDOW_DAYS,
            sample_size: DEFAULT_SAMPLE_SIZE,
            trials_page_size: DEFAULT_TRIALS_PAGE_SIZE,
            trend_enabled: true,
            review_filter: DEFAULT_REVIEW_FILTER.to_string(),
        }
    }
}

impl RadarConfig {
    /// Parse a TOML file, apply env overrides, sanitize.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading radar config from {}", path.display()))?;
        let cfg: RadarConfig = toml::from_str(&data)
            .with_context(|| format!("parsing radar config {}", path.display()))?;
        Ok(cfg.with_env_overrides()?.sanitized())
    }

    /// 1) $RADAR_CONFIG_PATH
    /// 2) config/radar.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        Ok(Self::default().with_env_overrides()?.sanitized())
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = env::var(ENV_API_BASE) {
            if !v.trim().is_empty() {
                self.api_base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var(ENV_CACHE_DIR) {
            self.cache_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v.trim()));
        }
        if let Ok(v) = env::var(ENV_CACHE_TTL_SECS) {
            self.cache_ttl_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CACHE_TTL_SECS} is not a number"))?;
        }
        if let Ok(v) = env::var(ENV_MAX_ATTEMPTS) {
            self.max_attempts = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_ATTEMPTS} is not a number"))?;
        }
        Ok(self)
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        while self.api_base_url.ends_with('/') {
            self.api_base_url.pop();
        }
        if self.api_base_url.is_empty() {
            self.api_base_url = defaults.api_base_url;
        }
        self.max_attempts = self.max_attempts.max(1);
        if self.cache_ttl_secs == 0 {
            self.cache_ttl_secs = defaults.cache_ttl_secs;
        }
        if self.default_window_days == 0 {
            self.default_window_days = defaults.default_window_days;
        }
        if self.historical_window_days == 0 {
            self.historical_window_days = defaults.historical_window_days;
        }
        if self.trials_page_size == 0 {
            self.trials_page_size = defaults.trials_page_size;
        }
        if self.review_filter.trim().is_empty() {
            self.review_filter = defaults.review_filter;
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff_ms: self.initial_backoff_ms,
        }
    }

    pub fn aggregation(&self) -> AggregationSettings {
        AggregationSettings {
            historical_window_days: self.historical_window_days,
            sample_size: self.sample_size,
            trials_page_size: self.trials_page_size,
            trend_enabled: self.trend_enabled,
            review_filter: self.review_filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for k in [
            ENV_CONFIG_PATH,
            ENV_API_BASE,
            ENV_CACHE_DIR,
            ENV_CACHE_TTL_SECS,
            ENV_MAX_ATTEMPTS,
        ] {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn partial_toml_keeps_defaults_and_sanitizes() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("radar.toml");
        fs::write(
            &p,
            "api_base_url = \"https://proxy.example.org/\"\nmax_attempts = 0\ncache_ttl_secs = 0\n",
        )
        .unwrap();

        let cfg = RadarConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.api_base_url, "https://proxy.example.org");
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.cache_ttl_secs, 900);
        assert_eq!(cfg.sample_size, 10);
        assert!(cfg.trend_enabled);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_win_over_file() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("radar.toml");
        fs::write(&p, "cache_ttl_secs = 60\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_CACHE_TTL_SECS, "120");
        env::set_var(ENV_MAX_ATTEMPTS, "2");
        let cfg = RadarConfig::load_default().unwrap();
        clear_env();

        assert_eq!(cfg.cache_ttl_secs, 120);
        assert_eq!(cfg.max_attempts, 2);
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_path_is_an_error() {
        clear_env();
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        let res = RadarConfig::load_default();
        clear_env();
        assert!(res.is_err());
    }
}
