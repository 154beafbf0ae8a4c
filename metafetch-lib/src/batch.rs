use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::{
    BatchResult, Completion, Dispatcher, Executor, Request, ResultCollector, Result,
    ratelimit::RateLimitConfig,
};

/// Fetch every request through `executor` and collect the outcome.
///
/// Requests with the same key are sent only once. Individual failures end up
/// in [`BatchResult::errors`]; they never abort the batch.
///
/// # Errors
///
/// Returns an error if the rate limit configuration is invalid, in which
/// case no request is sent.
pub async fn run_batch<E, I>(executor: E, requests: I, config: &RateLimitConfig) -> Result<BatchResult>
where
    E: Executor + 'static,
    I: IntoIterator<Item = Request>,
{
    run_batch_with(executor, requests, config, &CancellationToken::new(), |_| {}).await
}

/// Same as [`run_batch`], with a cancellation token and a callback invoked
/// for every completion as it arrives.
///
/// Cancelling `cancel` stops the batch early. The returned result then holds
/// every completion produced up to that point.
///
/// # Errors
///
/// Returns an error if the rate limit configuration is invalid, in which
/// case no request is sent.
pub async fn run_batch_with<E, I, F>(
    executor: E,
    requests: I,
    config: &RateLimitConfig,
    cancel: &CancellationToken,
    on_completion: F,
) -> Result<BatchResult>
where
    E: Executor + 'static,
    I: IntoIterator<Item = Request>,
    F: FnMut(&Completion),
{
    let dispatcher = Dispatcher::new(executor, config)?.with_cancellation(cancel);

    let mut seen = HashSet::new();
    let requests: Vec<Request> = requests
        .into_iter()
        .filter(|request| seen.insert(request.key.clone()))
        .collect();
    let expected = requests.len();
    log::debug!(
        "Dispatching {expected} request(s), {} per {:?}, {} at a time",
        dispatcher.config().quota,
        dispatcher.config().period,
        dispatcher.config().concurrency
    );

    let completions = dispatcher.dispatch_iter(requests);
    let result = ResultCollector::new()
        .collect_with(completions, on_completion)
        .await;

    if cancel.is_cancelled() {
        log::info!("Batch cancelled after {} of {expected} request(s)", result.len());
    } else if result.len() != expected {
        log::error!(
            "Collected {} completion(s) for {expected} request(s)",
            result.len()
        );
    }
    Ok(result)
}
