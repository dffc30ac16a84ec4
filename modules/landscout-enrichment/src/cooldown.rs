use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Fixed minimum spacing between consecutive external calls.
pub struct Cooldown {
    last_call: Mutex<Option<Instant>>,
    interval: Duration,
}

impl Cooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            interval,
        }
    }

    /// Sleep until `interval` has passed since the previous call, then mark
    /// this one. The first call never waits.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.interval {
                let wait_time = self.interval - elapsed;
                tracing::debug!(?wait_time, "cooldown: waiting");
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
