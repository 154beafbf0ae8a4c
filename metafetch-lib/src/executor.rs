use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{RemoteError, Request};

/// Performs a single remote call.
///
/// Implementations must be safe to call from many tasks at once. Throttling
/// is the job of the [`Dispatcher`](crate::Dispatcher), so an executor should
/// issue its call right away and report the outcome. Failures are returned
/// as values and never abort the batch.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Fetch the resource identified by `request`
    async fn execute(&self, request: &Request) -> Result<Value, RemoteError>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, request: &Request) -> Result<Value, RemoteError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Box<E> {
    async fn execute(&self, request: &Request) -> Result<Value, RemoteError> {
        (**self).execute(request).await
    }
}
