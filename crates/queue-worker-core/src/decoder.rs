//! Raw message body to handler payload.

use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Turns a raw message body into the payload a handler expects
///
/// A decode failure means the message can never be processed; the
/// dispatcher deletes it without calling the handler.
pub trait MessageDecoder: Send + Sync + 'static {
    type Payload: Send + 'static;

    fn decode(&self, body: &[u8]) -> Result<Self::Payload, DecodeError>;
}

/// Decodes JSON bodies into `T`
///
/// Bodies that are not JSON at all yield [`DecodeError::Malformed`]; valid
/// JSON of the wrong shape yields [`DecodeError::Schema`].
pub struct JsonDecoder<T> {
    _payload: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageDecoder for JsonDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Payload = T;

    fn decode(&self, body: &[u8]) -> Result<T, DecodeError> {
        serde_json::from_slice(body).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => DecodeError::Schema {
                message: e.to_string(),
            },
            _ => DecodeError::Malformed {
                message: e.to_string(),
            },
        })
    }
}

/// Passes bodies through as UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl MessageDecoder for TextDecoder {
    type Payload = String;

    fn decode(&self, body: &[u8]) -> Result<String, DecodeError> {
        std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
