use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::{Executor, Key, RemoteError, Request};

/// Build one request per key, without a field selector
///
/// # Panic
///
/// This panics on a blank key, so it should only be used for testing
pub(crate) fn requests(keys: &[&str]) -> Vec<Request> {
    keys.iter()
        .map(|key| Request::from(Key::new(key).expect("Expected non-blank key")))
        .collect()
}

/// An in-memory executor which records how it was called.
///
/// Every key succeeds with `{"id": key, "name": "<key>.txt"}` unless a
/// failure was registered for it.
#[derive(Debug, Default)]
pub(crate) struct MockExecutor {
    latency: Duration,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, RemoteError>,
    panics: HashSet<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    admissions: Mutex<Vec<Instant>>,
}

impl MockExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Latency of every call without an explicit delay
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn delay(mut self, key: &str, latency: Duration) -> Self {
        self.delays.insert(key.to_string(), latency);
        self
    }

    pub(crate) fn fail(mut self, key: &str, code: u16, message: &str) -> Self {
        self.failures
            .insert(key.to_string(), RemoteError::new(code, message));
        self
    }

    pub(crate) fn panic_on(mut self, key: &str) -> Self {
        self.panics.insert(key.to_string());
        self
    }

    /// Number of calls started so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls executing at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Start times of all calls, in call order
    pub(crate) fn admissions(&self) -> Vec<Instant> {
        self.admissions.lock().clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, request: &Request) -> Result<Value, RemoteError> {
        let key = request.key.as_str();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.admissions.lock().push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = self.delays.get(key).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        assert!(!self.panics.contains(key), "simulated panic for {key}");
        match self.failures.get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(json!({"id": key, "name": format!("{key}.txt")})),
        }
    }
}
