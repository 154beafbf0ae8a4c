use thiserror::Error;

/// Errors in a rate limiting configuration.
///
/// These are detected before a batch starts and are fatal for the run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The quota admits no request at all
    #[error("quota must be greater than zero")]
    ZeroQuota,

    /// The concurrency limit admits no request at all
    #[error("concurrency must be greater than zero")]
    ZeroConcurrency,

    /// The quota period is empty
    #[error("quota period must not be zero")]
    ZeroPeriod,
}
