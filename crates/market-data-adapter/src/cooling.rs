use std::sync::atomic::{AtomicU32, Ordering};

/// Tracks whether the primary provider is believed blocked. After
/// `threshold` consecutive successful fallback calls, the primary is
/// marked cooling for the rest of the run rather than retried per-call —
/// re-probing a provider mid-block just invites another IP flag.
pub struct CoolingTracker {
    threshold: u32,
    fallback_streak: AtomicU32,
    cooling: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolingState {
    Hot,
    Cooling { streak: u32 },
    Cold,
}

impl CoolingTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            fallback_streak: AtomicU32::new(0),
            cooling: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn is_cold(&self) -> bool {
        self.cooling.load(Ordering::Relaxed)
    }

    pub fn record_primary_success(&self) {
        self.fallback_streak.store(0, Ordering::Relaxed);
    }

    /// Returns true the instant the streak crosses the threshold.
    pub fn record_fallback_success(&self) -> bool {
        let streak = self.fallback_streak.fetch_add(1, Ordering::Relaxed) + 1;
        if streak >= self.threshold {
            self.cooling.store(true, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> CoolingState {
        if self.is_cold() {
            CoolingState::Cold
        } else {
            let streak = self.fallback_streak.load(Ordering::Relaxed);
            if streak == 0 {
                CoolingState::Hot
            } else {
                CoolingState::Cooling { streak }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_hot_until_threshold_reached() {
        let tracker = CoolingTracker::new(3);
        assert!(!tracker.record_fallback_success());
        assert!(!tracker.record_fallback_success());
        assert!(tracker.record_fallback_success());
        assert!(tracker.is_cold());
    }

    #[test]
    fn primary_success_resets_streak() {
        let tracker = CoolingTracker::new(3);
        tracker.record_fallback_success();
        tracker.record_primary_success();
        assert_eq!(tracker.state(), CoolingState::Hot);
    }
}
