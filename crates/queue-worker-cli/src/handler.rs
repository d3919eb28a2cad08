//! Built-in handler used by `queue-worker consume`.

use async_trait::async_trait;
use queue_worker_core::{TaskError, TaskHandler};
use serde_json::Value;
use tracing::info;

/// Logs every JSON payload it receives and always succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPayloadHandler;

/// Summary returned for each handled payload
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PayloadSummary {
    pub kind: &'static str,
    /// Number of top-level fields or elements
    pub size: usize,
}

impl PayloadSummary {
    pub fn of(value: &Value) -> Self {
        let (kind, size) = match value {
            Value::Null => ("null", 0),
            Value::Bool(_) => ("bool", 1),
            Value::Number(_) => ("number", 1),
            Value::String(_) => ("string", 1),
            Value::Array(items) => ("array", items.len()),
            Value::Object(fields) => ("object", fields.len()),
        };
        Self { kind, size }
    }
}

#[async_trait]
impl TaskHandler for LogPayloadHandler {
    type Payload = Value;
    type Output = PayloadSummary;

    fn name(&self) -> &str {
        "log-payload"
    }

    async fn handle(&self, payload: Value) -> Result<PayloadSummary, TaskError> {
        info!(payload = %payload, "Received payload");
        Ok(PayloadSummary::of(&payload))
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
