//! In-memory queue provider implementation for testing and development.
//!
//! This module provides a fully functional in-memory queue implementation that:
//! - Implements visibility timeouts with real redelivery
//! - Tracks an approximate receive count per message
//! - Long-polls receives and wakes them when a message is sent
//!
//! Visibility deadlines use `tokio::time::Instant`, so tests running with a
//! paused clock observe redelivery deterministically.

use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{
    Message, MessageGroupId, MessageId, QueueName, ReceiptHandle, ReceivedMessage, Timestamp,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Upper bound on a single long-poll sleep so delayed and expiring messages
/// are picked up without a send notification.
const POLL_SLICE: Duration = Duration::from_millis(50);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues
struct QueueStorage {
    queues: HashMap<QueueName, InMemoryQueue>,
    config: InMemoryConfig,
}

impl QueueStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    /// Get or create a queue
    fn get_or_create_queue(&mut self, queue_name: &QueueName) -> &mut InMemoryQueue {
        self.queues.entry(queue_name.clone()).or_default()
    }
}

/// Internal queue state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Messages waiting for delivery, in send order
    messages: VecDeque<StoredMessage>,
    /// Received messages keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
}

impl InMemoryQueue {
    /// Move in-flight messages whose visibility expired back to the queue
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(entry) = self.in_flight.remove(&receipt) {
                let mut message = entry.message;
                message.available_at = entry.visible_at;
                self.messages.push_back(message);
            }
        }
    }

    /// Take up to `max` messages that are visible at `now`
    fn take_available(&mut self, max: usize, now: Instant) -> Vec<StoredMessage> {
        let mut taken = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.messages.len());

        while let Some(message) = self.messages.pop_front() {
            if taken.len() < max && message.available_at <= now {
                taken.push(message);
            } else {
                remaining.push_back(message);
            }
        }

        self.messages = remaining;
        taken
    }

    fn len(&self) -> usize {
        self.messages.len() + self.in_flight.len()
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    attributes: HashMap<String, String>,
    group_id: Option<MessageGroupId>,
    receive_count: u32,
    available_at: Instant,
}

/// A message currently being processed
struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

/// Snapshot of a queue's contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    /// Messages that a receive would return right now
    pub visible: usize,
    /// Messages waiting out a delivery delay or a retry backoff
    pub delayed: usize,
    /// Messages received and not yet deleted or expired
    pub in_flight: usize,
}

impl QueueDepth {
    /// Total number of messages still held by the queue
    pub fn total(&self) -> usize {
        self.visible + self.delayed + self.in_flight
    }

    /// Check whether the queue holds no messages at all
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
    arrivals: Arc<Notify>,
    closed: AtomicBool,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new(config))),
            arrivals: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Open another connection to the same queues
    ///
    /// The new connection shares all messages with this one but can be
    /// closed independently.
    pub fn connection(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            arrivals: Arc::clone(&self.arrivals),
            closed: AtomicBool::new(false),
        }
    }

    /// Check whether this connection has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Inspect how many messages a queue holds in each state
    pub fn queue_depth(&self, queue: &QueueName) -> Result<QueueDepth, QueueError> {
        let mut storage = self.write_storage()?;
        let now = Instant::now();

        let Some(state) = storage.queues.get_mut(queue) else {
            return Ok(QueueDepth::default());
        };
        state.reclaim_expired(now);

        let visible = state
            .messages
            .iter()
            .filter(|m| m.available_at <= now)
            .count();

        Ok(QueueDepth {
            visible,
            delayed: state.messages.len() - visible,
            in_flight: state.in_flight.len(),
        })
    }

    /// Enqueue a raw body without going through message validation
    ///
    /// Works on closed connections; used to seed queues with arbitrary bytes.
    pub fn push_raw(
        &self,
        queue: &QueueName,
        body: impl Into<Bytes>,
    ) -> Result<MessageId, QueueError> {
        let message = Message::new(body.into());
        self.enqueue(queue, &message)
    }

    fn write_storage(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|_| QueueError::ProviderError {
            provider: ProviderType::InMemory.to_string(),
            code: "StoragePoisoned".to_string(),
            message: "queue storage lock poisoned by a panicked writer".to_string(),
        })
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    fn enqueue(&self, queue: &QueueName, message: &Message) -> Result<MessageId, QueueError> {
        let max_size = ProviderType::InMemory.max_message_size();
        if message.body.len() > max_size {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            });
        }

        let message_id = MessageId::new();
        {
            let mut storage = self.write_storage()?;
            let max_queue_size = storage.config.max_queue_size;
            let state = storage.get_or_create_queue(queue);

            if state.len() >= max_queue_size {
                return Err(QueueError::QueueFull {
                    queue_name: queue.to_string(),
                    max_size: max_queue_size,
                });
            }

            let available_at = Instant::now() + message.delay.unwrap_or(Duration::ZERO);
            state.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                group_id: message.group_id.clone(),
                receive_count: 0,
                available_at,
            });
        }

        self.arrivals.notify_waiters();
        Ok(message_id)
    }

    fn try_receive(
        &self,
        queue: &QueueName,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut storage = self.write_storage()?;
        let now = Instant::now();
        let state = storage.get_or_create_queue(queue);

        state.reclaim_expired(now);

        let mut received = Vec::new();
        for mut message in state.take_available(max_messages, now) {
            message.receive_count += 1;
            let receipt = uuid::Uuid::new_v4().to_string();

            received.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                group_id: message.group_id.clone(),
                receipt_handle: ReceiptHandle::new(
                    receipt.clone(),
                    queue.clone(),
                    Timestamp::after(visibility_timeout),
                    ProviderType::InMemory,
                ),
                receive_count: message.receive_count,
                received_at: Timestamp::now(),
            });

            state.in_flight.insert(
                receipt,
                InFlightMessage {
                    message,
                    visible_at: now + visibility_timeout,
                },
            );
        }

        Ok(received)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        self.ensure_open()?;
        self.enqueue(queue, message)
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        wait: Duration,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.ensure_open()?;

        let max_messages = max_messages.clamp(1, self.max_batch_size()) as usize;
        let deadline = Instant::now() + wait;

        loop {
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let received = self.try_receive(queue, max_messages, visibility_timeout)?;
            let now = Instant::now();
            if !received.is_empty() || now >= deadline {
                return Ok(received);
            }

            let slice_end = deadline.min(now + POLL_SLICE);
            let _ = tokio::time::timeout_at(slice_end, arrival).await;
            self.ensure_open()?;
        }
    }

    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.ensure_open()?;

        let mut storage = self.write_storage()?;
        if let Some(state) = storage.queues.get_mut(receipt.queue()) {
            state.in_flight.remove(receipt.handle());
        }

        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.ensure_open()?;

        let mut storage = self.write_storage()?;
        let entry = storage
            .queues
            .get_mut(receipt.queue())
            .and_then(|state| state.in_flight.get_mut(receipt.handle()))
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.handle().to_string(),
            })?;

        entry.visible_at = Instant::now() + timeout;
        Ok(())
    }

    async fn verify_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        self.ensure_open()?;

        let mut storage = self.write_storage()?;
        storage.get_or_create_queue(queue);
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        self.arrivals.notify_waiters();
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
