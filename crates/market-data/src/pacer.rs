//! Process-wide pacing gate for outbound price API requests.
//!
//! The upstream quota is global, not per-resource, so a single shared
//! gate serializes all callers: every request waits until at least the
//! configured minimum delay has elapsed since the previous outbound
//! call anywhere in the process.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

/// Default minimum delay between outbound price API requests.
/// The upstream allows 30 requests per 10 seconds (333 ms); 350 ms
/// keeps a small margin.
pub const DEFAULT_MIN_REQUEST_DELAY: Duration = Duration::from_millis(350);

/// Shared inter-request gate.
///
/// One instance is shared by every component that talks to the price
/// API. Injected rather than ambient so tests can use fresh instances.
#[derive(Debug)]
pub struct RequestPacer {
    /// Time of the most recent claimed request slot.
    last_request: Mutex<Option<Instant>>,
    min_delay: Duration,
}

impl RequestPacer {
    /// Create a pacer with a custom minimum inter-request delay.
    pub fn new(min_delay: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_delay,
        }
    }

    /// Lock the timestamp mutex, recovering from poison if necessary.
    ///
    /// Worst case after recovery is one request issued slightly early,
    /// which is better than panicking the refresh cycle.
    fn lock_last(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_request.lock().unwrap_or_else(|poisoned| {
            warn!("Request pacer mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait until the minimum inter-request delay has elapsed since the
    /// previous outbound call, then claim the slot.
    ///
    /// The lock is never held across the sleep; after waking, the gate
    /// is re-checked because another task may have claimed the slot in
    /// the meantime.
    pub async fn wait(&self) {
        loop {
            let wait_time = {
                let mut last = self.lock_last();
                match *last {
                    None => {
                        *last = Some(Instant::now());
                        return;
                    }
                    Some(prev) => {
                        let elapsed = prev.elapsed();
                        if elapsed >= self.min_delay {
                            *last = Some(Instant::now());
                            return;
                        }
                        self.min_delay - elapsed
                    }
                }
            };

            tokio::time::sleep(wait_time).await;
        }
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REQUEST_DELAY)
    }
}
