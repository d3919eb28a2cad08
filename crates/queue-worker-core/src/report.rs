//! Counters describing what a consumer run did.

use crate::retry::{QueueAction, TaskStatus};
use serde::Serialize;

/// Result of one message execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub status: TaskStatus,
    pub action: QueueAction,
    /// Whether the queue accepted the terminal action
    pub action_applied: bool,
}

/// Totals for one consumer run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerReport {
    /// Poll iterations, failed ones included
    pub polls: u64,
    pub poll_errors: u64,
    pub received: u64,
    /// Messages dropped because they could not be decoded
    pub malformed: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
    pub deleted: u64,
    pub extended: u64,
    pub retained: u64,
}

impl ConsumerReport {
    /// Add the outcome of one execution
    pub fn record(&mut self, task: &TaskReport) {
        match task.status {
            TaskStatus::Success => self.succeeded += 1,
            TaskStatus::RetryRequested { .. } => self.retried += 1,
            TaskStatus::UnhandledFailure { .. } => self.failed += 1,
        }

        match task.action {
            QueueAction::Delete if task.action_applied => self.deleted += 1,
            QueueAction::ExtendVisibility(_) if task.action_applied => self.extended += 1,
            QueueAction::Retain => self.retained += 1,
            _ => {}
        }
    }

    /// Executions that finished, whatever their outcome
    pub fn completed(&self) -> u64 {
        self.succeeded + self.retried + self.failed
    }
}

impl std::fmt::Display for ConsumerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "polls={} poll_errors={} received={} malformed={} succeeded={} retried={} failed={} deleted={} extended={} retained={}",
            self.polls,
            self.poll_errors,
            self.received,
            self.malformed,
            self.succeeded,
            self.retried,
            self.failed,
            self.deleted,
            self.extended,
            self.retained
        )
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
