//! Injectable waiting.
//!
//! Backoff, pacing and readiness polling all sleep through [`Sleeper`] so
//! tests can record the schedule instead of waiting it out.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real time, via `tokio::time::sleep`.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-delay gate between sequential remote calls.
///
/// The first call to [`Pacer::wait`] returns immediately; every later call
/// sleeps for the configured interval first.
pub struct Pacer {
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
    primed: bool,
}

impl Pacer {
    pub fn new(interval: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            interval,
            sleeper,
            primed: false,
        }
    }

    pub async fn wait(&mut self) {
        if self.primed && !self.interval.is_zero() {
            self.sleeper.sleep(self.interval).await;
        }
        self.primed = true;
    }
}
