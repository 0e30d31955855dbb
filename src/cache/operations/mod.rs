pub mod rate_limit;
pub mod response;

pub use rate_limit::RateWindows;
pub use response::ResponseCache;
