//! # Dispatcher
//!
//! The consumer's poll loop. One control flow pulls batches no larger than
//! the number of free execution slots, decodes each message and hands it to
//! a [`TaskRunner`] running in the consumer's [`InFlightTasks`].
//!
//! Receive errors never end the loop; it pauses with exponential backoff
//! and polls again. The loop ends on the shutdown future or the iteration
//! bound, after which all in-flight executions are drained before the queue
//! connection is closed.

use crate::config::ConsumerConfig;
use crate::decoder::{JsonDecoder, MessageDecoder};
use crate::error::ConsumerError;
use crate::gate::ConcurrencyGate;
use crate::handler::TaskHandler;
use crate::report::ConsumerReport;
use crate::runner::TaskRunner;
use crate::shutdown::{self, InFlightTasks};
use queue_worker_runtime::{QueueName, QueueProvider, ReceivedMessage};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

/// Long-running consumer for one queue and one handler
pub struct Consumer<H, D> {
    queue: Arc<dyn QueueProvider>,
    queue_name: QueueName,
    config: ConsumerConfig,
    runner: TaskRunner<H>,
    decoder: D,
    gate: ConcurrencyGate,
    tasks: InFlightTasks,
}

impl<H> Consumer<H, JsonDecoder<H::Payload>>
where
    H: TaskHandler,
    H::Payload: DeserializeOwned,
{
    /// Create a consumer that decodes message bodies as JSON
    pub fn new(
        queue: Arc<dyn QueueProvider>,
        config: ConsumerConfig,
        handler: H,
    ) -> Result<Self, ConsumerError> {
        Self::with_decoder(queue, config, handler, JsonDecoder::new())
    }
}

impl<H, D> Consumer<H, D>
where
    H: TaskHandler,
    D: MessageDecoder<Payload = H::Payload>,
{
    /// Create a consumer with a custom body decoder
    pub fn with_decoder(
        queue: Arc<dyn QueueProvider>,
        config: ConsumerConfig,
        handler: H,
        decoder: D,
    ) -> Result<Self, ConsumerError> {
        config.validate()?;
        let queue_name = config.queue_name()?.clone();

        let runner = TaskRunner::new(
            Arc::new(handler),
            queue.clone(),
            queue_name.clone(),
            config.retry_policy(),
        );

        Ok(Self {
            gate: ConcurrencyGate::new(config.max_concurrent_tasks),
            tasks: InFlightTasks::new(),
            queue,
            queue_name,
            config,
            runner,
            decoder,
        })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    /// Gate bounding this consumer's executions
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Consume until the iteration bound is reached
    ///
    /// Without an iteration bound this runs forever; use
    /// [`run_until`](Self::run_until) to stop on a signal.
    pub async fn run(self) -> Result<ConsumerReport, ConsumerError> {
        self.run_until(std::future::pending()).await
    }

    /// Consume until `shutdown` completes or the iteration bound is reached
    ///
    /// Fails only when the queue is unreachable at startup. Returns once
    /// every dispatched message has been settled and the queue connection
    /// has been closed.
    pub async fn run_until<S>(mut self, shutdown: S) -> Result<ConsumerReport, ConsumerError>
    where
        S: Future<Output = ()>,
    {
        self.queue
            .verify_queue(&self.queue_name)
            .await
            .map_err(|source| ConsumerError::Startup {
                queue: self.queue_name.to_string(),
                source,
            })?;

        info!(
            queue = %self.queue_name,
            task = %self.runner.handler_name(),
            provider = %self.queue.provider_type(),
            max_concurrent_tasks = self.config.max_concurrent_tasks,
            max_retries = self.config.max_retries,
            "Consumer started"
        );

        tokio::pin!(shutdown);
        let mut report = ConsumerReport::default();
        let mut consecutive_errors: u32 = 0;

        loop {
            if let Some(max_iterations) = self.config.max_iterations {
                if report.polls >= max_iterations {
                    info!(iterations = report.polls, "Iteration limit reached");
                    break;
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = self.gate.wait_ready() => {}
            }

            self.tasks.reap(&mut report);

            let batch = u32::try_from(self.gate.available())
                .unwrap_or(u32::MAX)
                .min(self.config.max_messages_per_poll)
                .min(self.queue.max_batch_size())
                .max(1);

            report.polls += 1;
            let received = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                received = self.queue.receive_messages(
                    &self.queue_name,
                    batch,
                    self.config.wait_time,
                    self.config.visibility_timeout,
                ) => received,
            };

            match received {
                Ok(messages) => {
                    consecutive_errors = 0;
                    if !messages.is_empty() {
                        debug!(count = messages.len(), "Received messages");
                    }
                    report.received += messages.len() as u64;

                    for message in messages {
                        self.dispatch(message, &mut report).await;
                    }
                }
                Err(e) => {
                    report.poll_errors += 1;
                    let delay = self
                        .config
                        .poll_error_backoff
                        .calculate_delay(consecutive_errors);
                    // The provider's hint is a floor for the pause
                    let delay = e.retry_after().map_or(delay, |hint| delay.max(hint));
                    consecutive_errors = consecutive_errors.saturating_add(1);

                    warn!(
                        queue = %self.queue_name,
                        error = %e,
                        transient = e.is_transient(),
                        consecutive_errors,
                        retry_in_ms = delay.as_millis() as u64,
                        "Failed to receive messages"
                    );

                    tokio::select! {
                        biased;
                        _ = &mut shutdown => {
                            info!("Shutdown requested");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        shutdown::shutdown(&mut self.tasks, &self.gate, self.queue.as_ref(), &mut report).await;

        info!(queue = %self.queue_name, %report, "Consumer stopped");
        Ok(report)
    }

    /// Decode one message and start its execution
    async fn dispatch(&mut self, message: ReceivedMessage, report: &mut ConsumerReport) {
        let payload = match self.decoder.decode(&message.body) {
            Ok(payload) => payload,
            Err(e) => {
                report.malformed += 1;
                warn!(
                    queue = %self.queue_name,
                    message_id = %message.message_id,
                    error = %e,
                    "Dropping undecodable message"
                );

                match self.queue.delete_message(&message.receipt_handle).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => error!(
                        message_id = %message.message_id,
                        error = %e,
                        "Failed to delete undecodable message"
                    ),
                }
                return;
            }
        };

        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Leaving message for redelivery"
                );
                return;
            }
        };

        let span = info_span!(
            "task",
            task = %self.runner.handler_name(),
            message_id = %message.message_id,
            receive_count = message.receive_count,
        );
        let runner = self.runner.clone();
        self.tasks.spawn(span, async move {
            runner.run(message, payload, permit).await
        });
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
