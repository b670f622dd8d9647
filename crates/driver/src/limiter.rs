//! Call-rate limiting for remote requests.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::DriverError;

/// Token bucket with a burst of one, shared by every operation of a driver.
///
/// Slots are handed out in order: each caller reserves the next free
/// instant and sleeps until it. A caller cancelled while waiting gives up
/// its slot without returning it.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_free: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `rate` is in calls per second; zero, negative or non-finite
    /// disables limiting.
    pub fn new(rate: f64) -> Self {
        let interval = (rate.is_finite() && rate > 0.0).then(|| Duration::from_secs_f64(1.0 / rate));
        Self {
            interval,
            next_free: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0)
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits for the next slot. Fails once `cancel` has fired, even when disabled.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), DriverError> {
        let Some(interval) = self.interval else {
            if cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            return Ok(());
        };
        let slot = {
            let mut next_free = self.next_free.lock().await;
            let now = Instant::now();
            let slot = match *next_free {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_free = Some(slot + interval);
            slot
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DriverError::Cancelled),
            _ = tokio::time::sleep_until(slot) => Ok(()),
        }
    }
}
