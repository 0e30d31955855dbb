/// Fixed-window request counter for one client in one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    /// Milliseconds since the epoch.
    pub window_start: u64,
}

impl RateWindow {
    /// A window opened by the request arriving at `now_ms`.
    pub fn open(now_ms: u64) -> Self {
        Self {
            count: 1,
            window_start: now_ms,
        }
    }

    pub fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.window_start)
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub count: u32,
    pub limit: u32,
    pub retry_after_ms: u64,
}

impl RateDecision {
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }

    /// `true` only for the request that first went over the limit in its
    /// window.
    pub fn is_first_rejection(&self) -> bool {
        !self.allowed && self.count == self.limit.saturating_add(1)
    }
}
