use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::cache::models::{RateDecision, RateWindow};

/// Fixed-window counters keyed by client (and tier).
///
/// `check` runs under the map's per-key lock, so the reset-or-increment
/// sequence is atomic even when requests for the same key race.
#[derive(Debug, Default)]
pub struct RateWindows {
    windows: DashMap<String, RateWindow>,
    sweeping: AtomicBool,
}

impl RateWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, limit: u32, interval_ms: u64, now_ms: u64) -> RateDecision {
        let allowed = |count| RateDecision {
            allowed: true,
            count,
            limit,
            retry_after_ms: 0,
        };

        match self.windows.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(RateWindow::open(now_ms));
                allowed(1)
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();
                let elapsed = window.elapsed(now_ms);
                if elapsed >= interval_ms {
                    *window = RateWindow::open(now_ms);
                    return allowed(1);
                }

                window.count = window.count.saturating_add(1);
                if window.count <= limit {
                    allowed(window.count)
                } else {
                    RateDecision {
                        allowed: false,
                        count: window.count,
                        limit,
                        retry_after_ms: interval_ms - elapsed,
                    }
                }
            }
        }
    }

    pub fn window(&self, key: &str) -> Option<RateWindow> {
        self.windows.get(key).map(|w| *w)
    }

    /// Drops windows that started more than `interval_ms` ago.
    /// A call made while another sweep is in progress does nothing.
    pub fn sweep_at(&self, now_ms: u64, interval_ms: u64) -> usize {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }

        let mut removed = 0;
        self.windows.retain(|_, window| {
            let keep = window.elapsed(now_ms) <= interval_ms;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.sweeping.store(false, Ordering::Release);
        removed
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u64 = 60_000;

    #[test]
    fn window_rejects_past_limit_and_resets_after_interval() {
        let windows = RateWindows::new();
        for t in 0..5 {
            let d = windows.check("10.0.0.1", 5, INTERVAL, t);
            assert!(d.allowed, "request at t={t} should pass");
        }

        let rejected = windows.check("10.0.0.1", 5, INTERVAL, 10);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after_ms, 59_990);
        assert_eq!(rejected.retry_after_secs(), 60);

        let reset = windows.check("10.0.0.1", 5, INTERVAL, 60_001);
        assert!(reset.allowed);
        assert_eq!(reset.count, 1);
        assert_eq!(
            windows.window("10.0.0.1"),
            Some(RateWindow {
                count: 1,
                window_start: 60_001
            })
        );
    }

    #[test]
    fn window_resets_exactly_at_interval() {
        let windows = RateWindows::new();
        windows.check("k", 1, INTERVAL, 0);
        assert!(!windows.check("k", 1, INTERVAL, 59_999).allowed);
        assert!(windows.check("k", 1, INTERVAL, 60_000).allowed);
    }

    #[test]
    fn keys_are_counted_independently() {
        let windows = RateWindows::new();
        assert!(windows.check("a", 1, INTERVAL, 0).allowed);
        assert!(!windows.check("a", 1, INTERVAL, 1).allowed);
        assert!(windows.check("b", 1, INTERVAL, 1).allowed);
    }

    #[test]
    fn rejected_requests_keep_counting() {
        let windows = RateWindows::new();
        windows.check("k", 1, INTERVAL, 0);
        windows.check("k", 1, INTERVAL, 1);
        let d = windows.check("k", 1, INTERVAL, 2);
        assert_eq!(d.count, 3);
        assert_eq!(d.retry_after_ms, 59_998);
    }

    #[test]
    fn only_the_first_overflow_is_flagged() {
        let windows = RateWindows::new();
        assert!(!windows.check("k", 2, INTERVAL, 0).is_first_rejection());
        assert!(!windows.check("k", 2, INTERVAL, 1).is_first_rejection());
        assert!(windows.check("k", 2, INTERVAL, 2).is_first_rejection());
        assert!(!windows.check("k", 2, INTERVAL, 3).is_first_rejection());

        let reopened = windows.check("k", 2, INTERVAL, INTERVAL);
        assert!(reopened.allowed);
        windows.check("k", 2, INTERVAL, INTERVAL + 1);
        assert!(windows.check("k", 2, INTERVAL, INTERVAL + 2).is_first_rejection());
    }

    #[test]
    fn sweep_drops_only_expired_windows() {
        let windows = RateWindows::new();
        windows.check("old", 5, INTERVAL, 0);
        windows.check("new", 5, INTERVAL, 30_000);

        assert_eq!(windows.sweep_at(INTERVAL, INTERVAL), 0, "boundary is kept");
        assert_eq!(windows.sweep_at(INTERVAL + 1, INTERVAL), 1);
        assert!(windows.window("old").is_none());
        assert!(windows.window("new").is_some());
    }

    #[test]
    fn concurrent_checks_never_exceed_limit() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicU32;

        let windows = Arc::new(RateWindows::new());
        let admitted = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let windows = windows.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if windows.check("shared", 100, INTERVAL, 5).allowed {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 100);
        assert_eq!(windows.window("shared").unwrap().count, 400);
    }
}
