//! Error types for the consumer.

use queue_worker_runtime::QueueError;
use thiserror::Error;

/// A message body that cannot become a handler payload
///
/// Undecodable messages are deleted without invoking the handler.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Message body is malformed: {message}")]
    Malformed { message: String },

    #[error("Message body does not match the payload schema: {message}")]
    Schema { message: String },
}

/// Invalid consumer configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {field}")]
    Missing { field: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Fatal consumer errors
///
/// Only startup problems surface here; errors while running are handled
/// inside the poll loop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Invalid consumer configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue '{queue}' is not available: {source}")]
    Startup {
        queue: String,
        #[source]
        source: QueueError,
    },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
