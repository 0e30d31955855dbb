//! Records kept in the in-memory tables.
pub mod rate_limit;
pub mod response;

pub use rate_limit::{RateDecision, RateWindow};
pub use response::CacheEntry;
