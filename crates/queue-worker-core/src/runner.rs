//! # Task Runner
//!
//! Executes one decoded message and settles it on the queue:
//!
//! ```text
//! Received -> Executing -> Deleted | VisibilityExtended | Retained
//! ```
//!
//! The runner never fails. Handler panics become failures, and queue errors
//! while settling are logged and reported; the message is then left to the
//! queue's own redelivery.

use crate::gate::GatePermit;
use crate::handler::{TaskError, TaskHandler};
use crate::report::TaskReport;
use crate::retry::{QueueAction, RetryPolicy, TaskStatus};
use futures::FutureExt;
use queue_worker_runtime::{QueueError, QueueName, QueueProvider, ReceivedMessage};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs a handler against single messages
pub struct TaskRunner<H> {
    handler: Arc<H>,
    queue: Arc<dyn QueueProvider>,
    queue_name: QueueName,
    retry_policy: RetryPolicy,
}

impl<H> Clone for TaskRunner<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            queue: self.queue.clone(),
            queue_name: self.queue_name.clone(),
            retry_policy: self.retry_policy,
        }
    }
}

impl<H: TaskHandler> TaskRunner<H> {
    pub fn new(
        handler: Arc<H>,
        queue: Arc<dyn QueueProvider>,
        queue_name: QueueName,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            handler,
            queue,
            queue_name,
            retry_policy,
        }
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    /// Run the handler for `message` and apply the resulting queue action
    ///
    /// `permit` is held until the action has been issued.
    pub async fn run(
        &self,
        message: ReceivedMessage,
        payload: H::Payload,
        permit: GatePermit,
    ) -> TaskReport {
        let _permit = permit;

        let outcome = AssertUnwindSafe(self.handler.handle(payload))
            .catch_unwind()
            .await;

        let (status, output) = match outcome {
            Ok(Ok(value)) => (TaskStatus::Success, serialize_output(&value)),
            Ok(Err(TaskError::Retry { backoff })) => {
                (TaskStatus::RetryRequested { backoff }, None)
            }
            Ok(Err(TaskError::Failed(e))) => (
                TaskStatus::UnhandledFailure {
                    error: format!("{e:#}"),
                },
                None,
            ),
            Err(panic) => (
                TaskStatus::UnhandledFailure {
                    error: format!("handler panicked: {}", panic_message(panic.as_ref())),
                },
                None,
            ),
        };

        let action = self.retry_policy.resolve(&status, message.receive_count);
        let action_applied = match self.apply(&message, action).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    task = %self.handler.name(),
                    queue = %self.queue_name,
                    message_id = %message.message_id,
                    action = ?action,
                    error = %e,
                    "Failed to settle message; it will be redelivered"
                );
                false
            }
        };

        let report = TaskReport {
            status,
            action,
            action_applied,
        };
        self.log_finished(&message, &report, output.as_deref());
        report
    }

    async fn apply(&self, message: &ReceivedMessage, action: QueueAction) -> Result<(), QueueError> {
        match action {
            QueueAction::Delete => self.queue.delete_message(&message.receipt_handle).await,
            QueueAction::ExtendVisibility(delay) => {
                self.queue
                    .change_visibility(&message.receipt_handle, delay)
                    .await
            }
            QueueAction::Retain => Ok(()),
        }
    }

    fn log_finished(&self, message: &ReceivedMessage, report: &TaskReport, output: Option<&str>) {
        let deleted = report.action_applied && report.action == QueueAction::Delete;
        let status = report.status.label();
        let task = self.handler.name();

        match &report.status {
            TaskStatus::Success => info!(
                task = %task,
                queue = %self.queue_name,
                message_id = %message.message_id,
                receipt = %message.receipt_handle,
                receive_count = message.receive_count,
                max_retries = self.retry_policy.max_retries,
                status,
                deleted,
                output = output.unwrap_or("null"),
                "Task finished"
            ),
            TaskStatus::RetryRequested { backoff } => warn!(
                task = %task,
                queue = %self.queue_name,
                message_id = %message.message_id,
                receipt = %message.receipt_handle,
                receive_count = message.receive_count,
                max_retries = self.retry_policy.max_retries,
                status,
                deleted,
                backoff = ?backoff,
                "Task finished"
            ),
            TaskStatus::UnhandledFailure { error: failure } => error!(
                task = %task,
                queue = %self.queue_name,
                message_id = %message.message_id,
                receipt = %message.receipt_handle,
                receive_count = message.receive_count,
                max_retries = self.retry_policy.max_retries,
                status,
                deleted,
                error = %failure,
                "Task finished"
            ),
        }
    }
}

fn serialize_output<T: serde::Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Task output is not serializable");
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
