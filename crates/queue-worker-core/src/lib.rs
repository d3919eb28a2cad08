//! # Queue Worker Core
//!
//! Long-running consumer that pulls messages from a visibility-timeout queue,
//! runs a handler against each one with bounded concurrency and reconciles
//! the message lifecycle with the handler outcome.
//!
//! Delivery is at-least-once: a message is deleted only after its handler
//! finished (or gave up), so a crash leaves it for redelivery.
//!
//! ## Module Organization
//!
//! - [`config`] - Consumer configuration and validation
//! - [`gate`] - Concurrency gate with a readiness signal
//! - [`decoder`] - Raw body to payload decoding
//! - [`handler`] - Handler contract and the retry signal
//! - [`retry`] - Outcome to queue action mapping and poll backoff
//! - [`runner`] - Execution of a single message
//! - [`dispatcher`] - The poll loop (`Consumer`)
//! - [`shutdown`] - In-flight task tracking and draining
//!
//! ## Example
//!
//! ```no_run
//! use queue_worker_core::{task_fn, Consumer, ConsumerConfig, TaskError};
//! use queue_worker_runtime::{QueueName, QueueProviderFactory};
//!
//! # use futures::FutureExt;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = QueueProviderFactory::create_test_provider();
//! let config = ConsumerConfig::new(QueueName::new("jobs".to_string())?);
//!
//! let handler = task_fn("greet", |name: String| async move {
//!     if name.is_empty() {
//!         return Err(TaskError::retry());
//!     }
//!     Ok(format!("hello {name}"))
//! });
//!
//! let report = Consumer::new(queue, config, handler)?
//!     .run_until(tokio::signal::ctrl_c().map(|_| ()))
//!     .await?;
//! println!("processed {} messages", report.received);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handler;
pub mod report;
pub mod retry;
pub mod runner;
pub mod shutdown;

pub use config::ConsumerConfig;
pub use decoder::{JsonDecoder, MessageDecoder, TextDecoder};
pub use dispatcher::Consumer;
pub use error::{ConfigError, ConsumerError, DecodeError};
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use handler::{task_fn, FnHandler, TaskError, TaskHandler};
pub use report::{ConsumerReport, TaskReport};
pub use retry::{BackoffPolicy, QueueAction, RetryPolicy, TaskStatus};
pub use runner::TaskRunner;
pub use shutdown::InFlightTasks;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
