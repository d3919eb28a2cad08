//! Publishing helpers bound to a single queue.

use crate::celery::build_celery_message;
use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{Message, MessageGroupId, MessageId, QueueName};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Sends messages to one queue through a shared provider
///
/// On FIFO queues every message needs a group; when none is given a fresh
/// UUID is used, so unrelated messages are not serialized behind each other.
pub struct QueueSender {
    provider: Arc<dyn QueueProvider>,
    queue: QueueName,
    background: Mutex<JoinSet<Result<MessageId, QueueError>>>,
}

impl QueueSender {
    /// Create a sender for `queue`
    pub fn new(provider: Arc<dyn QueueProvider>, queue: QueueName) -> Self {
        Self {
            provider,
            queue,
            background: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue this sender publishes to
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Send a text body
    pub async fn send_text(
        &self,
        body: impl Into<String>,
        group_id: Option<MessageGroupId>,
    ) -> Result<MessageId, QueueError> {
        let message = self.build_message(body.into(), group_id);
        send(self.provider.as_ref(), &self.queue, &message).await
    }

    /// Serialize `value` to JSON and send it
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        group_id: Option<MessageGroupId>,
    ) -> Result<MessageId, QueueError> {
        let body = serde_json::to_string(value).map_err(crate::error::SerializationError::from)?;
        self.send_text(body, group_id).await
    }

    /// Publish a Celery task
    ///
    /// Returns the Celery task id.
    pub async fn send_task(
        &self,
        task_name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<String, QueueError> {
        let celery = build_celery_message(task_name, args, kwargs)?;
        self.send_text(celery.body, None).await?;
        Ok(celery.task_id)
    }

    /// Send a text body without waiting for the result
    ///
    /// Must be called from within a tokio runtime. Use
    /// [`wait_background`](Self::wait_background) to await completion.
    pub fn send_in_background(&self, body: impl Into<String>, group_id: Option<MessageGroupId>) {
        let message = self.build_message(body.into(), group_id);
        let provider = Arc::clone(&self.provider);
        let queue = self.queue.clone();

        let mut background = self
            .background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        background.spawn(async move {
            let result = send(provider.as_ref(), &queue, &message).await;
            if let Err(ref e) = result {
                warn!(queue = %queue, error = %e, "Background send failed");
            }
            result
        });
    }

    /// Publish a Celery task without waiting for the result
    ///
    /// Returns the Celery task id.
    pub fn send_task_in_background(
        &self,
        task_name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<String, QueueError> {
        let celery = build_celery_message(task_name, args, kwargs)?;
        self.send_in_background(celery.body, None);
        Ok(celery.task_id)
    }

    /// Number of background sends not yet collected
    pub fn pending_background(&self) -> usize {
        self.background
            .lock()
            .map(|background| background.len())
            .unwrap_or(0)
    }

    /// Wait for every background send started so far
    pub async fn wait_background(&self) -> Vec<Result<MessageId, QueueError>> {
        let mut pending = {
            let mut background = self
                .background
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *background)
        };

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = pending.join_next().await {
            results.push(joined.unwrap_or_else(|e| {
                Err(QueueError::ProviderError {
                    provider: self.provider.provider_type().to_string(),
                    code: "BackgroundSendAborted".to_string(),
                    message: e.to_string(),
                })
            }));
        }

        results
    }

    fn build_message(&self, body: String, group_id: Option<MessageGroupId>) -> Message {
        let message = Message::new(Bytes::from(body));
        match group_id {
            Some(group_id) => message.with_group_id(group_id),
            None if self.queue.is_fifo() => message.with_group_id(MessageGroupId::random()),
            None => message,
        }
    }
}

async fn send(
    provider: &dyn QueueProvider,
    queue: &QueueName,
    message: &Message,
) -> Result<MessageId, QueueError> {
    let message_id = provider.send_message(queue, message).await?;
    debug!(queue = %queue, message_id = %message_id, "Message sent");
    Ok(message_id)
}
