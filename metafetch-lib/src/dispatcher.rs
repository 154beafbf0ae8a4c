//! Rate-limited "as-completed" dispatching of remote calls.
//!
//! The [`Dispatcher`] keeps up to `concurrency` calls in flight, admits every
//! new call through the [`RateGate`] and yields each [`Completion`] as soon as
//! its call finishes. A slow call never holds back the next admission; only
//! the two gates do.

use std::{
    collections::HashMap,
    pin::{Pin, pin},
    sync::Arc,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use tokio::{
    sync::mpsc,
    task::{self, JoinError, JoinSet},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::{
    Completion, Executor, Key, Request, Result,
    ratelimit::{ConcurrencyGate, RateGate, RateLimitConfig},
};

/// Message of the failure reported for a call whose task panicked
const PANICKED: &str = "request task panicked";

/// Submits requests to an [`Executor`] under a rate and a concurrency
/// ceiling.
///
/// ```no_run
/// # use metafetch_lib::{Dispatcher, Executor, RateLimitConfig, Request, Result};
/// # use futures::StreamExt;
/// # async fn run(executor: impl Executor + 'static, requests: Vec<Request>) -> Result<()> {
/// let dispatcher = Dispatcher::new(executor, &RateLimitConfig::default())?;
/// let mut completions = dispatcher.dispatch_iter(requests);
/// while let Some(completion) = completions.next().await {
///     println!("{completion}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Dispatcher<E> {
    executor: Arc<E>,
    config: RateLimitConfig,
    rate_gate: Arc<RateGate>,
    concurrency_gate: ConcurrencyGate,
    cancel: CancellationToken,
}

impl<E: Executor + 'static> Dispatcher<E> {
    /// Create a dispatcher for the given executor.
    ///
    /// A concurrency limit above the quota is clamped to the quota.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate limit configuration is invalid.
    pub fn new(executor: E, config: &RateLimitConfig) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            executor: Arc::new(executor),
            rate_gate: Arc::new(RateGate::new(config.quota, config.period)),
            concurrency_gate: ConcurrencyGate::new(config.concurrency),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop dispatching once `token` is cancelled.
    ///
    /// Cancelling the returned [`CompletionStream`] does not cancel `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancel = token.child_token();
        self
    }

    /// The effective configuration, after clamping
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Start dispatching `requests` and return the stream of their
    /// completions, in the order the calls finish.
    ///
    /// Requests are pulled lazily: the next one is taken from `requests` only
    /// once it can be admitted.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn dispatch<S>(self, requests: S) -> CompletionStream
    where
        S: Stream<Item = Request> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(self.concurrency_gate.limit());
        let cancel = self.cancel.clone();
        tokio::spawn(self.drive(requests, sender));
        CompletionStream {
            inner: ReceiverStream::new(receiver),
            cancel,
        }
    }

    /// Same as [`Dispatcher::dispatch`], for requests which are already in
    /// memory.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn dispatch_iter<I>(self, requests: I) -> CompletionStream
    where
        I: IntoIterator<Item = Request>,
        I::IntoIter: Send + 'static,
    {
        self.dispatch(futures::stream::iter(requests))
    }

    async fn drive<S>(self, requests: S, sender: mpsc::Sender<Completion>)
    where
        S: Stream<Item = Request> + Send + 'static,
    {
        let Self {
            executor,
            rate_gate,
            concurrency_gate,
            cancel,
            ..
        } = self;
        let mut requests = pin!(requests);
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<task::Id, Key> = HashMap::new();

        loop {
            while let Some(joined) = tasks.try_join_next_with_id() {
                reap(joined, &mut pending, &sender).await;
            }

            let request = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = requests.next() => match next {
                    Some(request) => request,
                    None => break,
                },
            };

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = concurrency_gate.acquire() => match permit {
                    Some(permit) => permit,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = rate_gate.until_ready() => {}
            }

            log::debug!(
                "Admitting {request} ({} in flight)",
                concurrency_gate.in_flight()
            );

            let executor = Arc::clone(&executor);
            let sender = sender.clone();
            let cancel = cancel.clone();
            let key = request.key.clone();
            let handle = tasks.spawn(async move {
                // Only a call which has not returned yet is abandoned. Once
                // the executor returned, its completion is always delivered.
                let outcome = tokio::select! {
                    biased;
                    outcome = executor.execute(&request) => outcome,
                    () = cancel.cancelled() => return,
                };
                drop(permit);
                let completion = Completion::from_outcome(request.key, outcome);
                if sender.send(completion).await.is_err() {
                    log::debug!("Completion stream closed, dropping completion");
                }
            });
            pending.insert(handle.id(), key);
        }

        if cancel.is_cancelled() {
            log::debug!("Dispatch cancelled, winding down {} call(s)", tasks.len());
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            reap(joined, &mut pending, &sender).await;
        }
    }
}

/// Handle a finished call task.
///
/// A task which panicked never sent its completion, so a failure is sent on
/// its behalf.
async fn reap(
    joined: std::result::Result<(task::Id, ()), JoinError>,
    pending: &mut HashMap<task::Id, Key>,
    sender: &mpsc::Sender<Completion>,
) {
    match joined {
        Ok((id, ())) => {
            pending.remove(&id);
        }
        Err(err) => {
            let Some(key) = pending.remove(&err.id()) else {
                return;
            };
            if err.is_panic() {
                log::error!("Call for {key} panicked");
                let completion = Completion::Failure {
                    key,
                    code: None,
                    message: PANICKED.to_string(),
                };
                if sender.send(completion).await.is_err() {
                    log::debug!("Completion stream closed, dropping completion");
                }
            }
        }
    }
}

/// Completions of a running dispatch, in the order the calls finished.
///
/// The stream ends once every admitted call has completed and no request is
/// left, or after cancellation once the completions produced so far have
/// been read. Dropping the stream cancels the dispatch.
#[derive(Debug)]
pub struct CompletionStream {
    inner: ReceiverStream<Completion>,
    cancel: CancellationToken,
}

impl CompletionStream {
    /// Stop admitting requests and abandon the calls which have not
    /// returned yet.
    ///
    /// Every call which already returned is still delivered, even if it is
    /// waiting for room on the stream.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` if the dispatch was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for CompletionStream {
    type Item = Completion;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::*;
    use crate::{ErrorKind, RateLimitError, test_utils::MockExecutor, test_utils::requests};

    fn config(quota: usize, period: Duration, concurrency: usize) -> RateLimitConfig {
        RateLimitConfig {
            quota,
            period,
            concurrency,
        }
    }

    fn keys(completions: &[Completion]) -> Vec<&str> {
        completions.iter().map(|c| c.key().as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_completions_arrive_as_calls_finish() {
        let executor = MockExecutor::new()
            .delay("slow", Duration::from_millis(300))
            .delay("fast", Duration::from_millis(100))
            .delay("medium", Duration::from_millis(200));
        let dispatcher = Dispatcher::new(executor, &config(10, Duration::from_secs(1), 3)).unwrap();

        let completions: Vec<_> = dispatcher
            .dispatch_iter(requests(&["slow", "fast", "medium"]))
            .collect()
            .await;

        assert_eq!(keys(&completions), vec!["fast", "medium", "slow"]);
        assert!(completions.iter().all(Completion::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_is_saturated_but_never_exceeded() {
        let executor = Arc::new(MockExecutor::new().with_latency(Duration::from_millis(100)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            &config(100, Duration::from_secs(1), 3),
        )
        .unwrap();

        let keys: Vec<String> = (0..20).map(|i| format!("id{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let start = Instant::now();
        let completions: Vec<_> = dispatcher.dispatch_iter(requests(&keys)).collect().await;

        assert_eq!(completions.len(), 20);
        assert_eq!(executor.max_in_flight(), 3);
        // 20 calls of 100ms, three at a time
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_above_quota_is_clamped() {
        let executor = Arc::new(MockExecutor::new().with_latency(Duration::from_secs(5)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            &config(2, Duration::from_secs(1), 10),
        )
        .unwrap();
        assert_eq!(dispatcher.config().concurrency, 2);

        let keys: Vec<String> = (0..8).map(|i| format!("id{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let completions: Vec<_> = dispatcher.dispatch_iter(requests(&keys)).collect().await;

        assert_eq!(completions.len(), 8);
        assert!(executor.max_in_flight() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admissions_respect_sliding_window() {
        let period = Duration::from_secs(1);
        let executor = Arc::new(MockExecutor::new().with_latency(Duration::from_millis(10)));
        let dispatcher = Dispatcher::new(Arc::clone(&executor), &config(5, period, 5)).unwrap();

        let keys: Vec<String> = (0..23).map(|i| format!("id{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let start = Instant::now();
        let completions: Vec<_> = dispatcher.dispatch_iter(requests(&keys)).collect().await;
        assert_eq!(completions.len(), 23);

        let mut admissions = executor.admissions();
        admissions.sort();
        for (i, first) in admissions.iter().enumerate() {
            let in_window = admissions[i..]
                .iter()
                .take_while(|t| t.duration_since(*first) < period)
                .count();
            assert!(in_window <= 5, "{in_window} admissions within one period");
        }
        let last = admissions.last().unwrap().duration_since(start);
        assert_eq!(last, 4 * period);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_requests() {
        let executor = MockExecutor::new().fail("B", 500, "Backend Error");
        let dispatcher = Dispatcher::new(executor, &config(10, Duration::from_secs(1), 1)).unwrap();

        let completions: Vec<_> = dispatcher
            .dispatch_iter(requests(&["A", "B", "C"]))
            .collect()
            .await;

        assert_eq!(keys(&completions), vec!["A", "B", "C"]);
        assert_eq!(
            completions[1],
            Completion::Failure {
                key: Key::new("B").unwrap(),
                code: Some(500),
                message: "Backend Error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_panicking_call_becomes_failure() {
        let executor = MockExecutor::new().panic_on("boom");
        let dispatcher = Dispatcher::new(executor, &config(10, Duration::from_secs(1), 2)).unwrap();

        let mut completions: Vec<_> = dispatcher
            .dispatch_iter(requests(&["ok", "boom"]))
            .collect()
            .await;
        completions.sort_by(|a, b| a.key().cmp(b.key()));

        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0].code(), None);
        assert!(matches!(
            &completions[0],
            Completion::Failure { message, .. } if message == PANICKED
        ));
        assert!(completions[1].is_success());
    }

    #[tokio::test]
    async fn test_requests_are_pulled_lazily() {
        let (tx, rx) = mpsc::channel(1);
        let dispatcher =
            Dispatcher::new(MockExecutor::new(), &config(10, Duration::from_secs(1), 2)).unwrap();
        let mut completions = dispatcher.dispatch(ReceiverStream::new(rx));

        tx.send(Request::from(Key::new("first").unwrap())).await.unwrap();
        let first = completions.next().await.unwrap();
        assert_eq!(first.key().as_str(), "first");

        tx.send(Request::from(Key::new("second").unwrap())).await.unwrap();
        drop(tx);
        let rest: Vec<_> = completions.collect().await;
        assert_eq!(keys(&rest), vec!["second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_admissions() {
        let executor = Arc::new(MockExecutor::new().with_latency(Duration::from_millis(100)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            &config(1, Duration::from_secs(1), 1),
        )
        .unwrap();

        let keys: Vec<String> = (0..10).map(|i| format!("id{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let mut completions = dispatcher.dispatch_iter(requests(&keys));

        assert!(completions.next().await.is_some());
        completions.cancel();
        let started = executor.calls();

        let rest: Vec<_> = completions.collect().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rest.is_empty());
        assert_eq!(executor.calls(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_completions_of_finished_calls() {
        let executor = Arc::new(MockExecutor::new().with_latency(Duration::from_millis(10)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            &config(100, Duration::from_secs(1), 2),
        )
        .unwrap();

        let keys: Vec<String> = (0..20).map(|i| format!("id{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let mut completions = dispatcher.dispatch_iter(requests(&keys));

        // A slow consumer lets every call finish while the stream is full
        assert!(completions.next().await.is_some());
        tokio::time::sleep(Duration::from_secs(1)).await;
        completions.cancel();

        let rest: Vec<_> = completions.collect().await;
        assert_eq!(executor.calls(), 20);
        assert_eq!(rest.len(), 19);
        assert!(rest.iter().all(Completion::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_stream_cancels() {
        let executor = Arc::new(MockExecutor::new().with_latency(Duration::from_millis(100)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            &config(100, Duration::from_secs(1), 2),
        )
        .unwrap();

        let keys: Vec<String> = (0..10).map(|i| format!("id{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let mut completions = dispatcher.dispatch_iter(requests(&keys));
        completions.next().await.unwrap();
        drop(completions);
        let started = executor.calls();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(executor.calls(), started);
        assert!(started < 10);
    }

    #[tokio::test]
    async fn test_external_token_cancels_dispatch() {
        let token = CancellationToken::new();
        token.cancel();
        let executor = Arc::new(MockExecutor::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            &config(10, Duration::from_secs(1), 2),
        )
        .unwrap()
        .with_cancellation(&token);

        let completions: Vec<_> = dispatcher
            .dispatch_iter(requests(&["a", "b"]))
            .collect()
            .await;
        assert!(completions.is_empty());
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Dispatcher::new(MockExecutor::new(), &config(0, Duration::from_secs(1), 1));
        assert!(matches!(
            result,
            Err(ErrorKind::RateLimit(RateLimitError::ZeroQuota))
        ));
    }
}
