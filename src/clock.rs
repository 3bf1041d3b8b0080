//! Injectable time sources.
//!
//! `Clock` feeds cache TTL checks and report timestamps; `Sleeper` performs backoff
//! waits. Production code uses the system clock and tokio timers; tests swap in
//! deterministic doubles.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Wall-clock source in UNIX milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms())
            .single()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Async sleep used between retry attempts. Cancellation is handled by the caller
/// racing this future against its token.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
