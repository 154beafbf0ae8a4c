use serde::{Serialize, Serializer};
use std::path::PathBuf;
use thiserror::Error;

use crate::ratelimit::RateLimitError;

/// Possible errors when interacting with `metafetch_lib`.
///
/// Failures of individual remote calls are not represented here. They are
/// recovered into [`Completion::Failure`](crate::Completion::Failure) and
/// never abort a batch. Everything in this enum is fatal for a run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Any form of I/O error occurred while reading keys.
    #[error("Failed to read from path: `{}`, reason: {}", match .0 {
        Some(p) => p.to_str().unwrap_or("<MALFORMED PATH>"),
        None => "<stdin>",
    }, .1)]
    IoError(Option<PathBuf>, std::io::Error),

    /// An input line did not contain a key
    #[error("Key must not be empty")]
    EmptyKey,

    /// The field selector was blank
    #[error("Field selector must not be empty")]
    EmptyFields,

    /// The rate limiting configuration is invalid
    #[error("Invalid rate limit configuration: {0}")]
    RateLimit(#[from] RateLimitError),

    /// The request client could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The given header could not be parsed.
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The base URL of the remote API is not a valid URL
    #[error("Invalid base URL `{0}`: {1}")]
    InvalidBaseUrl(String, String),
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<(PathBuf, std::io::Error)> for ErrorKind {
    fn from(value: (PathBuf, std::io::Error)) -> Self {
        Self::IoError(Some(value.0), value.1)
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(None, e)
    }
}
