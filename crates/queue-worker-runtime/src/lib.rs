//! # Queue Worker Runtime
//!
//! Queue port for the queue worker: the operations a consumer needs against a
//! pull-based, visibility-timeout message queue, and the backends that provide
//! them.
//!
//! This library provides:
//! - Provider-agnostic receive / delete / change-visibility operations
//! - An in-memory provider with real visibility-timeout semantics
//! - An AWS SQS provider speaking the SQS query API over HTTP
//! - A sender for publishing JSON payloads and Celery task envelopes
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Message structures and receipt handles
//! - [`provider`] - Provider types and configuration
//! - [`client`] - The `QueueProvider` trait and provider factory
//! - [`providers`] - Concrete providers
//! - [`sender`] - Publishing helpers
//! - [`celery`] - Celery protocol envelopes

pub mod celery;
pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;
pub mod sender;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueProvider, QueueProviderFactory};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    Message, MessageGroupId, MessageId, QueueName, ReceiptHandle, ReceivedMessage, Timestamp,
};
pub use provider::{AwsSqsConfig, InMemoryConfig, ProviderConfig, ProviderType};
pub use providers::{AwsSqsProvider, InMemoryProvider, QueueDepth};
pub use sender::QueueSender;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
