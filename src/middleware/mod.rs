mod error_handler;
mod rate_limit;
mod response_cache;

pub use error_handler::log_errors;
pub use rate_limit::{
    IdentifyFn, RateLimiter, RateTier, forwarded_address, peer_address, rate_limit,
};
pub use response_cache::{ResponseCaching, X_CACHE, response_cache};
