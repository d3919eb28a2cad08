//! Consumer configuration.
//!
//! A [`ConsumerConfig`] is fixed for the lifetime of one consumer run.
//! Every field has a default so partial configuration files deserialize.

use crate::error::ConfigError;
use crate::retry::{BackoffPolicy, RetryPolicy};
use queue_worker_runtime::QueueName;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Longest long-poll wait a queue accepts
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// Longest visibility timeout a queue accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(43_200);

/// Configuration for one consumer run
///
/// # Examples
///
/// ```rust
/// use queue_worker_core::ConsumerConfig;
/// use queue_worker_runtime::QueueName;
/// use std::time::Duration;
///
/// let config = ConsumerConfig::new(QueueName::new("jobs".to_string()).unwrap())
///     .with_max_concurrent_tasks(2)
///     .with_wait_time(Duration::from_secs(1));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Queue to consume; accepts a queue name or an SQS queue URL
    pub queue: Option<QueueName>,

    /// How long one receive waits for messages
    #[serde(rename = "wait_time_seconds", with = "duration_secs")]
    pub wait_time: Duration,

    /// How long a received message stays hidden from other receivers
    #[serde(rename = "visibility_timeout_seconds", with = "duration_secs")]
    pub visibility_timeout: Duration,

    /// Redeliveries allowed after the first attempt
    pub max_retries: u32,

    /// Upper bound on simultaneous handler executions
    pub max_concurrent_tasks: usize,

    /// Upper bound on messages requested per receive
    pub max_messages_per_poll: u32,

    /// Stop after this many poll iterations; runs until shutdown when unset
    pub max_iterations: Option<u64>,

    /// Pause between failed receives
    pub poll_error_backoff: BackoffPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue: None,
            wait_time: Duration::from_secs(15),
            visibility_timeout: Duration::from_secs(3600),
            max_retries: 1,
            max_concurrent_tasks: 5,
            max_messages_per_poll: 10,
            max_iterations: None,
            poll_error_backoff: BackoffPolicy::default(),
        }
    }
}

impl ConsumerConfig {
    /// Create a configuration for the given queue with default settings
    pub fn new(queue: QueueName) -> Self {
        Self {
            queue: Some(queue),
            ..Self::default()
        }
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max_concurrent_tasks: usize) -> Self {
        self.max_concurrent_tasks = max_concurrent_tasks;
        self
    }

    pub fn with_max_messages_per_poll(mut self, max_messages_per_poll: u32) -> Self {
        self.max_messages_per_poll = max_messages_per_poll;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_poll_error_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.poll_error_backoff = backoff;
        self
    }

    /// Get the configured queue
    pub fn queue_name(&self) -> Result<&QueueName, ConfigError> {
        self.queue.as_ref().ok_or_else(|| ConfigError::Missing {
            field: "queue".to_string(),
        })
    }

    /// Retry policy derived from `max_retries`
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    /// Check the configuration can drive a consumer
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue_name()?;

        if self.max_concurrent_tasks == 0 {
            return Err(invalid("max_concurrent_tasks", "must be at least 1"));
        }

        if self.max_concurrent_tasks > Semaphore::MAX_PERMITS {
            return Err(invalid(
                "max_concurrent_tasks",
                format!("must not exceed {}", Semaphore::MAX_PERMITS),
            ));
        }

        if self.max_messages_per_poll == 0 {
            return Err(invalid("max_messages_per_poll", "must be at least 1"));
        }

        if self.wait_time > MAX_WAIT_TIME {
            return Err(invalid(
                "wait_time_seconds",
                format!("must not exceed {} seconds", MAX_WAIT_TIME.as_secs()),
            ));
        }

        if self.visibility_timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(invalid(
                "visibility_timeout_seconds",
                format!(
                    "must not exceed {} seconds",
                    MAX_VISIBILITY_TIMEOUT.as_secs()
                ),
            ));
        }

        if self.poll_error_backoff.multiplier < 1.0 {
            return Err(invalid("poll_error_backoff.multiplier", "must be at least 1.0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Serde adapter for durations stored as whole seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Serde adapter for durations stored as milliseconds
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
