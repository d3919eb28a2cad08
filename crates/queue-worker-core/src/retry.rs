//! # Retry Module
//!
//! Maps handler outcomes onto queue actions and computes the pause between
//! failed polls.
//!
//! Retrying a message never re-enqueues it. The message stays on the queue
//! and comes back when its visibility timeout expires; a requested backoff
//! only moves that moment.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one handler execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The handler returned normally
    Success,

    /// The handler asked for the message to be tried again
    RetryRequested { backoff: Option<Duration> },

    /// The handler failed with any other error, or panicked
    UnhandledFailure { error: String },
}

impl TaskStatus {
    /// Short label used in log records
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RetryRequested { .. } => "retrying",
            Self::UnhandledFailure { .. } => "failed",
        }
    }
}

/// Terminal action issued against the queue for a dispatched message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    /// Remove the message for good
    Delete,

    /// Keep the message and make it visible again after the given delay
    ExtendVisibility(Duration),

    /// Leave the message alone; it reappears when its current visibility
    /// timeout expires
    Retain,
}

/// Decides what happens to a message after its handler ran
///
/// # Examples
///
/// ```rust
/// use queue_worker_core::retry::{QueueAction, RetryPolicy, TaskStatus};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(2);
/// let retry = TaskStatus::RetryRequested { backoff: Some(Duration::from_secs(5)) };
///
/// assert_eq!(policy.resolve(&retry, 1), QueueAction::ExtendVisibility(Duration::from_secs(5)));
/// assert_eq!(policy.resolve(&retry, 3), QueueAction::Delete);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of redeliveries after the first attempt
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Get total number of deliveries a message may get (initial + retries)
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check whether a delivery with this receive count is the last one
    pub fn is_exhausted(&self, receive_count: u32) -> bool {
        receive_count >= self.total_attempts()
    }

    /// Map an outcome and the message's receive count to a queue action
    pub fn resolve(&self, status: &TaskStatus, receive_count: u32) -> QueueAction {
        match status {
            TaskStatus::Success | TaskStatus::UnhandledFailure { .. } => QueueAction::Delete,
            TaskStatus::RetryRequested { .. } if self.is_exhausted(receive_count) => {
                QueueAction::Delete
            }
            TaskStatus::RetryRequested {
                backoff: Some(backoff),
            } if !backoff.is_zero() => QueueAction::ExtendVisibility(*backoff),
            TaskStatus::RetryRequested { .. } => QueueAction::Retain,
        }
    }
}

/// Exponential backoff between failed polls
///
/// # Examples
///
/// ```rust
/// use queue_worker_core::retry::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::default().without_jitter();
/// assert_eq!(policy.calculate_delay(0), Duration::from_secs(1));
/// assert_eq!(policy.calculate_delay(3), Duration::from_secs(8));
/// assert_eq!(policy.calculate_delay(10), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    #[serde(rename = "initial_delay_ms", with = "crate::config::duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound for any delay
    #[serde(rename = "max_delay_ms", with = "crate::config::duration_millis")]
    pub max_delay: Duration,

    /// Exponential growth factor
    pub multiplier: f64,

    /// Jitter range as a fraction of the delay (0.25 = ±25%)
    pub jitter_percent: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_percent: 0.25,
        }
    }
}

impl BackoffPolicy {
    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.jitter_percent = 0.0;
        self
    }

    /// Calculate the delay after `attempt` consecutive failures (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped_secs = base_secs.min(self.max_delay.as_secs_f64());

        let final_secs = if self.jitter_percent > 0.0 {
            Self::add_jitter(capped_secs, self.jitter_percent.min(1.0))
        } else {
            capped_secs
        };

        Duration::try_from_secs_f64(final_secs).unwrap_or(self.max_delay)
    }

    /// Apply random variation in [delay * (1-jitter), delay * (1+jitter)]
    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
