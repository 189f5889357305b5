use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::cancel::CancelSignal;

/// Returned when a throttle wait is interrupted by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleCancelled;

/// Shared record of the last issuance. Clones share one throttling domain;
/// separately constructed throttles are independent.
#[derive(Debug, Clone, Default)]
pub struct Throttle {
    last_issued: Arc<Mutex<Option<Instant>>>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_issued(&self) -> Option<Instant> {
        *self.last_issued.lock().await
    }

    /// Waits until at least `min_interval` has passed since the previous
    /// issuance, then records now as the new issuance. The lock is held for
    /// the whole read-wait-record sequence so concurrent callers queue up
    /// behind each other. Returns how long the caller was held back.
    pub async fn acquire(
        &self,
        min_interval: Duration,
        cancel: &CancelSignal,
    ) -> Result<Duration, ThrottleCancelled> {
        if cancel.is_cancelled() {
            return Err(ThrottleCancelled);
        }

        let mut last_issued = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ThrottleCancelled),
            guard = self.last_issued.lock() => guard,
        };

        let wait = match *last_issued {
            Some(previous) => min_interval.saturating_sub(previous.elapsed()),
            None => Duration::ZERO,
        };

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Throttling request");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ThrottleCancelled),
                _ = sleep(wait) => {}
            }
        }

        *last_issued = Some(Instant::now());
        Ok(wait)
    }
}
