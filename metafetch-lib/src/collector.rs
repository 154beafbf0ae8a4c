use std::collections::HashSet;

use futures::{Stream, StreamExt};

use crate::{BatchResult, Completion, Key};

/// Folds a stream of completions into a [`BatchResult`].
///
/// Successes go to `metadata` and failures to `errors`, both in the order
/// they were added. A key is collected at most once.
#[derive(Debug, Default)]
pub struct ResultCollector {
    result: BatchResult,
    seen: HashSet<Key>,
}

impl ResultCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a completion.
    ///
    /// Returns `false` if a completion for the same key was collected
    /// before; the duplicate is dropped.
    pub fn add(&mut self, completion: Completion) -> bool {
        if !self.seen.insert(completion.key().clone()) {
            log::warn!(
                "Ignoring duplicate completion for `{}`",
                completion.key()
            );
            return false;
        }
        self.result.push(completion);
        true
    }

    /// Number of collected completions
    #[must_use]
    pub fn len(&self) -> usize {
        self.result.len()
    }

    /// Returns `true` if nothing was collected yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    /// Finish collecting and return the result
    #[must_use]
    pub fn finish(self) -> BatchResult {
        self.result
    }

    /// Collect a whole stream
    pub async fn collect<S>(self, completions: S) -> BatchResult
    where
        S: Stream<Item = Completion>,
    {
        self.collect_with(completions, |_| {}).await
    }

    /// Collect a whole stream, calling `inspect` for every completion before
    /// it is added
    pub async fn collect_with<S, F>(mut self, completions: S, mut inspect: F) -> BatchResult
    where
        S: Stream<Item = Completion>,
        F: FnMut(&Completion),
    {
        let mut completions = std::pin::pin!(completions);
        while let Some(completion) = completions.next().await {
            inspect(&completion);
            self.add(completion);
        }
        self.finish()
    }
}
