//! Fixed-delay throttle shared by every upstream call.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Spaces calls at least `delay` apart across all callers.
///
/// The lock is held while sleeping, so concurrent callers queue up and
/// upstream throughput is one request per `delay`.
pub struct RateLimiter {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let remaining = self.delay - elapsed;
                debug!("Rate limiting upstream call for {:?}", remaining);
                sleep(remaining).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
