use std::fmt::Display;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::Key;

/// Failure reported by the remote API or the transport layer for a single
/// request.
///
/// `code` holds the HTTP status of the response. Transport errors which never
/// produced a response (connection refused, timeouts, ...) carry no code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteError {
    /// HTTP status code of the failed response, if there was one
    pub code: Option<u16>,
    /// Human readable reason, preferably the message sent by the API
    pub message: String,
}

impl RemoteError {
    /// Create an error for a response with the given status code
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Create an error for a request that never received a response
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Returns `true` if the remote API rejected the request because of its
    /// rate limit (403 or 429)
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.code, Some(403 | 429))
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.code.and_then(|c| StatusCode::from_u16(c).ok())) {
            (_, Some(status)) => write!(f, "[{status}] {}", self.message),
            (Some(code), None) => write!(f, "[{code}] {}", self.message),
            (None, None) => write!(f, "[transport] {}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// The terminal outcome of one remote call.
///
/// The dispatcher yields exactly one `Completion` for every request it
/// submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The remote call returned a payload
    Success {
        /// Key of the request
        key: Key,
        /// Opaque payload returned by the executor
        payload: Value,
    },
    /// The remote call failed
    Failure {
        /// Key of the request
        key: Key,
        /// HTTP status code, `None` for transport errors
        code: Option<u16>,
        /// Reason of the failure
        message: String,
    },
}

impl Completion {
    /// Wrap the outcome of an executor call
    #[must_use]
    pub fn from_outcome(key: Key, outcome: Result<Value, RemoteError>) -> Self {
        match outcome {
            Ok(payload) => Self::Success { key, payload },
            Err(RemoteError { code, message }) => Self::Failure { key, code, message },
        }
    }

    /// Key of the request this completion belongs to
    #[must_use]
    pub const fn key(&self) -> &Key {
        match self {
            Self::Success { key, .. } | Self::Failure { key, .. } => key,
        }
    }

    /// Returns `true` if the call succeeded
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the status code of a failure
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { code, .. } => *code,
        }
    }
}

impl Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { key, .. } => write!(f, "[OK] {key}"),
            Self::Failure {
                key,
                code: Some(code),
                message,
            } => write!(f, "[{code}] {key} | {message}"),
            Self::Failure {
                key,
                code: None,
                message,
            } => write!(f, "[ERR] {key} | {message}"),
        }
    }
}
