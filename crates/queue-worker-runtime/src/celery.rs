//! Celery task messages.
//!
//! Builds version 2 protocol envelopes so that a Celery worker listening on
//! an SQS queue picks up tasks published from Rust. See
//! <https://docs.celeryq.dev/en/stable/internals/protocol.html>.

use crate::error::SerializationError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(test)]
#[path = "celery_tests.rs"]
mod tests;

/// A Celery task message ready to be used as an SQS body
#[derive(Debug, Clone)]
pub struct CeleryMessage {
    /// Task id, also used as correlation and root id
    pub task_id: String,
    /// Base64 encoded JSON envelope
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub properties: Properties,
    pub headers: Headers,
    pub body: String,
    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Properties {
    pub correlation_id: String,
    pub content_type: String,
    pub content_encoding: String,
    pub body_encoding: String,
    pub delivery_info: DeliveryInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DeliveryInfo {
    pub exchange: String,
    pub routing_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Headers {
    pub lang: String,
    pub task: String,
    pub id: String,
    pub root_id: String,
    pub parent_id: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Embed {
    pub callbacks: Option<Value>,
    pub errbacks: Option<Value>,
    pub chain: Option<Value>,
    pub chord: Option<Value>,
}

/// Build a Celery envelope invoking `task_name` with positional and keyword
/// arguments
pub fn build_celery_message(
    task_name: &str,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<CeleryMessage, SerializationError> {
    let task_id = uuid::Uuid::new_v4().to_string();

    let body = serde_json::to_string(&(args, kwargs, Embed::default()))?;
    let envelope = Envelope {
        properties: Properties {
            correlation_id: task_id.clone(),
            content_type: "application/json".to_string(),
            content_encoding: "utf-8".to_string(),
            body_encoding: "base64".to_string(),
            delivery_info: DeliveryInfo {
                exchange: String::new(),
                routing_key: "celery".to_string(),
            },
        },
        headers: Headers {
            lang: "py".to_string(),
            task: task_name.to_string(),
            id: task_id.clone(),
            root_id: task_id.clone(),
            parent_id: None,
            group: None,
        },
        body: STANDARD.encode(body),
        content_encoding: "utf-8".to_string(),
        content_type: "application/json".to_string(),
    };

    let encoded = STANDARD.encode(serde_json::to_string(&envelope)?);
    Ok(CeleryMessage {
        task_id,
        body: encoded,
    })
}
