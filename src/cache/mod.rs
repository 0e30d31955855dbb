// In-memory tables behind the response cache and the rate limiters.
// Both live as long as the process and are never persisted.

pub mod keys;
pub mod models;
pub mod operations;
pub mod shaping;
pub mod sweeper;

pub use models::{CacheEntry, RateDecision, RateWindow};
pub use operations::{RateWindows, ResponseCache};
pub use sweeper::{Sweep, spawn_sweeper, sweep_all};
