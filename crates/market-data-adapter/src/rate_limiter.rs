use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Sliding-window rate limiter: blocks the caller until issuing another
/// request would keep the window's occupancy at or below `max_per_window`.
#[derive(Clone)]
pub struct RateLimiter {
    window: Duration,
    max_per_window: usize,
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        Self {
            window,
            max_per_window,
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Per-symbol validation calls: one slot every 500ms.
    pub fn per_symbol() -> Self {
        Self::new(Duration::from_millis(500), 1)
    }

    /// Index-level calls (SPI, S&P 500, etc.): one slot every 1s.
    pub fn index_level() -> Self {
        Self::new(Duration::from_secs(1), 1)
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                while let Some(&front) = timestamps.front() {
                    if now.duration_since(front) > self.window {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }
                if timestamps.len() < self.max_per_window {
                    timestamps.push_back(now);
                    None
                } else {
                    let oldest = *timestamps.front().unwrap();
                    Some(self.window.saturating_sub(now.duration_since(oldest)))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}
