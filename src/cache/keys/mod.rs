//! Key derivation for the response cache and the rate-limit windows.
pub mod rate_limit_keys;
pub mod response_keys;

pub use rate_limit_keys::rate_window_key;
pub use response_keys::{KeyMode, QueryParams, response_key};
