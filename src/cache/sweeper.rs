use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// A table with time-based expiry.
pub trait Sweep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Removes expired rows and returns how many were removed.
    fn sweep(&self) -> usize;
}

/// Sweeps every table once. Returns the total number of rows removed.
pub fn sweep_all(tables: &[Arc<dyn Sweep>]) -> usize {
    tables
        .iter()
        .map(|table| {
            let removed = table.sweep();
            if removed > 0 {
                debug!(table = table.name(), removed, "Expired rows removed");
            }
            removed
        })
        .sum()
}

/// One background task sweeping all tables every `period`. The first sweep
/// happens one full period after the call.
pub fn spawn_sweeper(tables: Vec<Arc<dyn Sweep>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_all(&tables);
        }
    })
}
