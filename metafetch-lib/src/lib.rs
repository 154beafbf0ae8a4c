//! `metafetch` fetches the metadata of many remote files at once, without
//! exceeding a rate limit.
//!
//! Requests are dispatched "as completed": up to `concurrency` calls are in
//! flight at any time, no more than `quota` calls start within any window of
//! `period`, and every result is handed out as soon as its call finishes.
//!
//! ```no_run
//! use metafetch_lib::{ClientBuilder, RateLimitConfig, Result, input, run_batch};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let keys = input::KeySource::new("ids.txt").read_keys()?;
//!     let client = ClientBuilder::default().client()?;
//!     let result = run_batch(client, input::requests(keys, None), &RateLimitConfig::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&result).unwrap());
//!     Ok(())
//! }
//! ```
//!
//! Any [`Executor`] can be plugged into the [`Dispatcher`]; the
//! [`DriveClient`] is the one talking HTTP.
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod client;
mod collector;
mod dispatcher;
mod executor;
mod retry;
mod types;

pub mod input;
pub mod ratelimit;

#[cfg(test)]
mod test_utils;

pub use crate::{
    batch::{run_batch, run_batch_with},
    client::{
        ClientBuilder, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT_TIME,
        DEFAULT_USER_AGENT, DriveClient,
    },
    collector::ResultCollector,
    dispatcher::{CompletionStream, Dispatcher},
    executor::Executor,
    ratelimit::{RateLimitConfig, RateLimitError},
    types::*,
};

/// Re-export of the cancellation token accepted by [`run_batch_with`] and
/// [`Dispatcher::with_cancellation`]
pub use tokio_util::sync::CancellationToken;
