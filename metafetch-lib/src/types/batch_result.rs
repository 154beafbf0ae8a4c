use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Completion, Key};

/// A classified failure as it appears in the final output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Key of the failed request
    pub id: Key,
    /// HTTP status code, `null` for transport errors
    pub code: Option<u16>,
    /// Reason of the failure
    pub message: String,
}

/// Aggregate of all successes and failures of one run.
///
/// Both sequences are in completion order. A `BatchResult` is built by the
/// [`ResultCollector`](crate::ResultCollector) and cannot be modified
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    metadata: Vec<Value>,
    errors: Vec<ErrorEntry>,
}

impl BatchResult {
    pub(crate) fn push(&mut self, completion: Completion) {
        match completion {
            Completion::Success { payload, .. } => self.metadata.push(payload),
            Completion::Failure { key, code, message } => self.errors.push(ErrorEntry {
                id: key,
                code,
                message,
            }),
        }
    }

    /// Payloads of all successful requests
    #[must_use]
    pub fn metadata(&self) -> &[Value] {
        &self.metadata
    }

    /// All failed requests
    #[must_use]
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Total number of completions in this result
    #[must_use]
    pub fn len(&self) -> usize {
        self.metadata.len() + self.errors.len()
    }

    /// Returns `true` if no completion was collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if no request failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failures per status code.
    ///
    /// Transport errors are counted under `None`.
    #[must_use]
    pub fn error_counts(&self) -> BTreeMap<Option<u16>, usize> {
        let mut counts = BTreeMap::new();
        for error in &self.errors {
            *counts.entry(error.code).or_insert(0) += 1;
        }
        counts
    }

    /// Split the result into its metadata and errors
    #[must_use]
    pub fn into_parts(self) -> (Vec<Value>, Vec<ErrorEntry>) {
        (self.metadata, self.errors)
    }
}
