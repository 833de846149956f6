//! Response-side security concerns: CORS headers and request throttling.

pub mod cors;
pub mod rate_limit;

pub use cors::CorsPolicy;
pub use rate_limit::{RateDecision, RateLimiter};
