//! Client-side record of the server's ratelimit window.
//!
//! # Design
//! A single `Option<Instant>` behind a mutex. Concurrent calls may race on
//! it; the worst case is one call slipping through right before a window is
//! recorded, which the server answers with another 429 anyway.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remaining windows at or below this are treated as already cleared.
pub const RATELIMIT_EPSILON: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
pub struct RatelimitTracker {
    until: Mutex<Option<Instant>>,
}

impl RatelimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left in the current window, or zero.
    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    pub fn is_ratelimited(&self) -> bool {
        !self.remaining().is_zero()
    }

    /// Record a window ending `reset_secs` from now. Non-positive or
    /// non-finite values (including the `-1` sentinel) are ignored.
    pub fn record(&self, reset_secs: f64) {
        if !reset_secs.is_finite() || reset_secs <= 0.0 {
            return;
        }
        let Ok(window) = Duration::try_from_secs_f64(reset_secs) else {
            return;
        };
        let Some(until) = Instant::now().checked_add(window) else {
            return;
        };
        let mut slot = self.lock();
        // Keep the later deadline if two 429s race.
        match *slot {
            Some(current) if current >= until => {}
            _ => *slot = Some(until),
        }
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        let until = *self.lock();
        let left = until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default();
        if left <= RATELIMIT_EPSILON {
            Duration::ZERO
        } else {
            left
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        // The guarded value is a plain scalar, so a poisoned lock is still usable.
        self.until.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_is_not_limited() {
        let tracker = RatelimitTracker::new();
        assert!(!tracker.is_ratelimited());
        assert_eq!(tracker.remaining(), Duration::ZERO);
    }

    #[test]
    fn recorded_window_blocks_until_it_elapses() {
        let tracker = RatelimitTracker::new();
        tracker.record(10.0);
        assert!(tracker.is_ratelimited());
        let left = tracker.remaining();
        assert!(left > Duration::from_secs(9) && left <= Duration::from_secs(10));

        let later = Instant::now() + Duration::from_secs(11);
        assert_eq!(tracker.remaining_at(later), Duration::ZERO);
    }

    #[test]
    fn sentinel_and_invalid_resets_are_ignored() {
        let tracker = RatelimitTracker::new();
        tracker.record(-1.0);
        tracker.record(0.0);
        tracker.record(f64::NAN);
        tracker.record(f64::INFINITY);
        assert!(!tracker.is_ratelimited());
    }

    #[test]
    fn windows_within_epsilon_count_as_cleared() {
        let tracker = RatelimitTracker::new();
        tracker.record(0.0005);
        assert!(!tracker.is_ratelimited());
    }

    #[test]
    fn shorter_window_does_not_shrink_a_longer_one() {
        let tracker = RatelimitTracker::new();
        tracker.record(30.0);
        tracker.record(1.0);
        assert!(tracker.remaining() > Duration::from_secs(20));
    }

    #[test]
    fn clear_lifts_the_block() {
        let tracker = RatelimitTracker::new();
        tracker.record(30.0);
        tracker.clear();
        assert!(!tracker.is_ratelimited());
    }
}
