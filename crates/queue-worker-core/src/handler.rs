//! Handler contract.
//!
//! Handlers signal a retry through [`TaskError::Retry`]; every other error
//! is a failure and the message is dropped.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use thiserror::Error;

/// Error returned by a handler
#[derive(Debug, Error)]
pub enum TaskError {
    /// Try the message again later
    ///
    /// With a positive `backoff` the message becomes visible again after
    /// that delay. Without one it reappears when its current visibility
    /// timeout expires.
    #[error("Task requested a retry")]
    Retry { backoff: Option<Duration> },

    /// The task failed and will not be retried
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl TaskError {
    /// Retry once the current visibility timeout expires
    pub fn retry() -> Self {
        Self::Retry { backoff: None }
    }

    /// Retry after `backoff`
    pub fn retry_after(backoff: Duration) -> Self {
        Self::Retry {
            backoff: Some(backoff),
        }
    }

    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        Self::Failed(error.into())
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Work performed for each decoded message
///
/// Handlers run concurrently on a shared instance and may be invoked more
/// than once for the same message, so they should be idempotent.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Output: Serialize + Send + 'static;

    /// Name used in logs
    fn name(&self) -> &str;

    async fn handle(&self, payload: Self::Payload) -> Result<Self::Output, TaskError>;
}

/// [`TaskHandler`] backed by an async closure
pub struct FnHandler<P, O, F> {
    name: String,
    func: F,
    _types: PhantomData<fn(P) -> O>,
}

impl<P, O, F> std::fmt::Debug for FnHandler<P, O, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

/// Build a handler from a name and an async closure
///
/// ```rust
/// use queue_worker_core::{task_fn, TaskHandler};
///
/// let handler = task_fn("double", |n: u64| async move { Ok(n * 2) });
/// assert_eq!(handler.name(), "double");
/// ```
pub fn task_fn<P, O, F, Fut>(name: impl Into<String>, func: F) -> FnHandler<P, O, F>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
{
    FnHandler {
        name: name.into(),
        func,
        _types: PhantomData,
    }
}

#[async_trait]
impl<P, O, F, Fut> TaskHandler for FnHandler<P, O, F>
where
    P: Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
{
    type Payload = P;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, payload: P) -> Result<O, TaskError> {
        (self.func)(payload).await
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
