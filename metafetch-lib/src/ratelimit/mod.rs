//! Global rate limiting and concurrency control.
//!
//! Every remote call of a batch passes two independent gates before it
//! starts:
//!
//! - [`ConcurrencyGate`]: bounds how many calls are in flight at once
//! - [`RateGate`]: bounds how many calls start within any rolling window
//!
//! Both ceilings are configured through [`RateLimitConfig`]. The rate gate
//! only limits admissions, not how long a call takes, so a slow call holds a
//! concurrency slot but no quota.

mod concurrency;
mod config;
mod error;
mod window;

pub use concurrency::ConcurrencyGate;
pub use config::{DEFAULT_CONCURRENCY, DEFAULT_PERIOD, DEFAULT_QUOTA, RateLimitConfig};
pub use error::RateLimitError;
pub use window::RateGate;
