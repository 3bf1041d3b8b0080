//! Error taxonomy shared by the fetch client, the source adapters and the run controller.
//!
//! Every failure carries a short, user-presentable classification via
//! [`RadarError::user_message`]. `Cancelled` is a distinct variant so callers can
//! drop it silently instead of reporting it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for radar operations.
pub type Result<T> = std::result::Result<T, RadarError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadarError {
    /// The run was cancelled by the caller or superseded by a newer run.
    #[error("search cancelled")]
    Cancelled,

    /// HTTP 429 on every attempt of the retry budget.
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Connection, DNS, TLS, timeout or a request blocked before reaching the server.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response other than a retryable 429.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The body was not the JSON shape the adapter expects.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Rejected before any network call (e.g. all PICO fields empty).
    #[error("{0}")]
    Validation(String),
}

/// Coarse, serializable error kind for API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Cancelled,
    RateLimited,
    Network,
    Http,
    Decode,
    Validation,
}

impl RadarError {
    pub fn empty_query() -> Self {
        RadarError::Validation("enter at least one field".to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RadarError::Cancelled)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RadarError::Cancelled => ErrorKind::Cancelled,
            RadarError::RateLimited { .. } => ErrorKind::RateLimited,
            RadarError::Network(_) => ErrorKind::Network,
            RadarError::Http { .. } => ErrorKind::Http,
            RadarError::Decode(_) => ErrorKind::Decode,
            RadarError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            RadarError::Cancelled => "search cancelled".to_string(),
            RadarError::RateLimited { .. } => "too many requests, wait and retry".to_string(),
            RadarError::Network(_) => "connectivity or blocked request".to_string(),
            RadarError::Http { status, .. } if (500..600).contains(status) => {
                "server error, retry later".to_string()
            }
            RadarError::Http { status, .. } if (400..500).contains(status) => {
                "bad request, check terms".to_string()
            }
            other => other.to_string(),
        }
    }
}
