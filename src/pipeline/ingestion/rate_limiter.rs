use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Minimum spacing between outbound registry calls.
///
/// Each instance tracks its own last-call time, so two pipelines pointed at
/// different registries never slow each other down.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    // None until the first call returns
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// A non-positive or non-finite rate disables spacing entirely.
    pub fn new(calls_per_second: f64) -> Self {
        let interval = if calls_per_second.is_finite() && calls_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / calls_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least one interval has passed since the previous `wait()`
    /// returned. The first call returns immediately.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        // Stamp after sleeping so the spacing is measured from when the caller resumed
        *last = Some(Instant::now());
    }
}
