//! Common test utilities for queue-worker integration tests
//!
//! This module provides:
//! - A recording queue that wraps the in-memory provider
//! - A concurrency probe for handlers
//! - Helpers for seeding queues and building consumer configuration

use async_trait::async_trait;
use queue_worker_core::{BackoffPolicy, ConsumerConfig};
use queue_worker_runtime::{
    InMemoryProvider, Message, MessageId, ProviderType, QueueError, QueueName, QueueProvider,
    ReceiptHandle, ReceivedMessage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[allow(dead_code)]
pub fn queue_name() -> QueueName {
    QueueName::new("integration".to_string()).unwrap()
}

/// Consumer configuration with short polls and deterministic poll backoff
#[allow(dead_code)]
pub fn consumer_config() -> ConsumerConfig {
    ConsumerConfig::new(queue_name())
        .with_wait_time(Duration::from_secs(1))
        .with_visibility_timeout(Duration::from_secs(30))
        .with_poll_error_backoff(BackoffPolicy::default().without_jitter())
}

// ============================================================================
// Recording Queue
// ============================================================================

/// A queue operation observed by [`RecordingQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Delete {
        receive_count: u32,
    },
    ExtendVisibility {
        receive_count: u32,
        timeout: Duration,
    },
    Close,
}

/// In-memory queue that records terminal actions and can fail receives
#[derive(Clone)]
#[allow(dead_code)]
pub struct RecordingQueue {
    inner: Arc<InMemoryProvider>,
    actions: Arc<Mutex<Vec<Action>>>,
    receive_counts: Arc<Mutex<HashMap<String, u32>>>,
    failing_receives: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl RecordingQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryProvider::default()),
            actions: Arc::new(Mutex::new(Vec::new())),
            receive_counts: Arc::new(Mutex::new(HashMap::new())),
            failing_receives: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the next `count` receives with a transient error
    pub fn fail_next_receives(&self, count: u32) {
        self.failing_receives.store(count, Ordering::SeqCst);
    }

    /// Enqueue JSON bodies
    pub async fn seed(&self, bodies: &[&str]) {
        for body in bodies {
            self.inner
                .send_message(&queue_name(), &Message::new(body.to_string().into()))
                .await
                .unwrap();
        }
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> usize {
        self.actions()
            .iter()
            .filter(|action| matches!(action, Action::Delete { .. }))
            .count()
    }

    /// Messages still held by the queue, visible or not
    pub fn remaining(&self) -> usize {
        self.inner.queue_depth(&queue_name()).unwrap().total()
    }

    pub fn visible(&self) -> usize {
        self.inner.queue_depth(&queue_name()).unwrap().visible
    }

    /// Handle for a consumer; shares this queue's storage
    pub fn provider(&self) -> Arc<dyn QueueProvider> {
        Arc::new(self.clone())
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }

    fn receive_count(&self, receipt: &ReceiptHandle) -> u32 {
        self.receive_counts
            .lock()
            .unwrap()
            .get(receipt.handle())
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueProvider for RecordingQueue {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        self.inner.send_message(queue, message).await
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        wait: Duration,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let failing = self
            .failing_receives
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(QueueError::ConnectionFailed {
                message: "connection reset by peer".to_string(),
            });
        }

        let messages = self
            .inner
            .receive_messages(queue, max_messages, wait, visibility_timeout)
            .await?;

        let mut counts = self.receive_counts.lock().unwrap();
        for message in &messages {
            counts.insert(
                message.receipt_handle.handle().to_string(),
                message.receive_count,
            );
        }

        Ok(messages)
    }

    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.record(Action::Delete {
            receive_count: self.receive_count(receipt),
        });
        self.inner.delete_message(receipt).await
    }

    async fn change_visibility(
        &self,
        receipt: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.record(Action::ExtendVisibility {
            receive_count: self.receive_count(receipt),
            timeout,
        });
        self.inner.change_visibility(receipt, timeout).await
    }

    async fn verify_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        self.inner.verify_queue(queue).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.record(Action::Close);
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

// ============================================================================
// Concurrency Probe
// ============================================================================

/// Tracks how many handler invocations run at once
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an invocation as running until the guard drops
    pub fn enter(&self) -> ProbeGuard {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            current: self.current.clone(),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

pub struct ProbeGuard {
    current: Arc<AtomicUsize>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}
