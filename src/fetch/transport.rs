// src/fetch/transport.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER};

use crate::error::{RadarError, Result};

/// Status, `Retry-After` header and body of one GET. Classification (429, non-2xx)
/// is left to [`super::FetchClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into().into_bytes(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One outbound GET. Implementations must only fail with [`RadarError::Network`];
/// HTTP statuses are returned, not raised.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<RawResponse>;
}

/// reqwest-backed transport against a fixed base address. No cookie store and no
/// auth headers are ever configured.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("evidence-gap-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        resolve_url(&self.base_url, path)
    }
}

/// Absolute URLs pass through; relative paths are joined onto `base` with exactly one `/`.
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<RawResponse> {
        let resp = self
            .http
            .get(self.url_for(path))
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(network_error)?.to_vec();

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn network_error(e: reqwest::Error) -> RadarError {
    if e.is_timeout() {
        RadarError::Network("request timed out".to_string())
    } else {
        RadarError::Network(e.to_string())
    }
}
