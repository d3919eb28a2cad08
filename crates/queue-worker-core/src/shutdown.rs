//! # Shutdown Coordinator
//!
//! Tracks the executions a consumer has started and drains them when the
//! poll loop ends. The queue connection is closed only after every
//! execution has issued its terminal action.

use crate::gate::ConcurrencyGate;
use crate::report::{ConsumerReport, TaskReport};
use crate::retry::{QueueAction, TaskStatus};
use queue_worker_runtime::QueueProvider;
use std::future::Future;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn, Instrument, Span};

/// Running executions of one consumer
#[derive(Debug, Default)]
pub struct InFlightTasks {
    tasks: JoinSet<TaskReport>,
}

impl InFlightTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an execution inside `span`
    pub fn spawn<F>(&mut self, span: Span, task: F)
    where
        F: Future<Output = TaskReport> + Send + 'static,
    {
        self.tasks.spawn(task.instrument(span));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Record every execution that already finished, without waiting
    pub fn reap(&mut self, report: &mut ConsumerReport) {
        while let Some(result) = self.tasks.try_join_next() {
            record_result(result, report);
        }
    }

    /// Wait for every execution to finish
    pub async fn drain(&mut self, report: &mut ConsumerReport) {
        if !self.tasks.is_empty() {
            info!(in_flight = self.tasks.len(), "Waiting for in-flight tasks");
        }

        while let Some(result) = self.tasks.join_next().await {
            record_result(result, report);
        }
    }
}

fn record_result(result: Result<TaskReport, JoinError>, report: &mut ConsumerReport) {
    match result {
        Ok(task) => report.record(&task),
        Err(e) => {
            // The runner catches handler panics, so this is an aborted runtime
            error!(error = %e, "In-flight task did not complete");
            report.record(&TaskReport {
                status: TaskStatus::UnhandledFailure {
                    error: e.to_string(),
                },
                action: QueueAction::Retain,
                action_applied: false,
            });
        }
    }
}

/// Drain `tasks`, then close the gate and release the queue connection
pub async fn shutdown(
    tasks: &mut InFlightTasks,
    gate: &ConcurrencyGate,
    queue: &dyn QueueProvider,
    report: &mut ConsumerReport,
) {
    tasks.drain(report).await;
    gate.close();

    if let Err(e) = queue.close().await {
        warn!(error = %e, "Failed to close queue connection");
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
