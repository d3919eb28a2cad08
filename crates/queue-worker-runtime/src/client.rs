//! The queue port trait and provider factory.

use crate::error::QueueError;
use crate::message::{Message, MessageId, QueueName, ReceiptHandle, ReceivedMessage};
use crate::provider::{InMemoryConfig, ProviderConfig, ProviderType};
use crate::providers::{AwsSqsProvider, InMemoryProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by specific queue providers (AWS SQS, in-memory)
///
/// A provider is shared by every in-flight task of a consumer and must be
/// safe for concurrent use.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Send single message
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError>;

    /// Receive up to `max_messages`, waiting at most `wait` for the first one
    ///
    /// Returns an empty list when nothing arrived in time. Received messages
    /// stay invisible to other receivers for `visibility_timeout`.
    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        wait: Duration,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Remove a message for good
    ///
    /// Deleting an already-deleted message succeeds.
    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;

    /// Make a received message visible again after `timeout` from now
    async fn change_visibility(
        &self,
        receipt: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError>;

    /// Check the queue exists and is reachable
    async fn verify_queue(&self, queue: &QueueName) -> Result<(), QueueError>;

    /// Release the connection
    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Get maximum batch size
    fn max_batch_size(&self) -> u32 {
        self.provider_type().max_batch_size()
    }
}

/// Factory for creating queue providers from configuration
pub struct QueueProviderFactory;

impl QueueProviderFactory {
    /// Create provider from configuration
    pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn QueueProvider>, QueueError> {
        let provider: Arc<dyn QueueProvider> = match config {
            ProviderConfig::InMemory(in_memory_config) => {
                Arc::new(InMemoryProvider::new(in_memory_config.clone()))
            }
            ProviderConfig::AwsSqs(aws_config) => Arc::new(AwsSqsProvider::new(aws_config.clone())?),
        };

        Ok(provider)
    }

    /// Create in-memory provider for tests and local runs
    pub fn create_test_provider() -> Arc<dyn QueueProvider> {
        Arc::new(InMemoryProvider::new(InMemoryConfig::default()))
    }
}
