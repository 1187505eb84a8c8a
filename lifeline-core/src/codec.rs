//! Pluggable message serialization for lifeline.
//!
//! The [`MessageCodec`] trait lets users bring their own payload format
//! (JSON, bincode, protobuf, messagepack, etc.) while lifeline provides a
//! default [`JsonCodec`] for debugging and getting started quickly.
//!
//! Encoding is synchronous: outbound messages are serialized inline before
//! being handed to the socket. Decoding is asynchronous: inbound payloads may
//! require work that suspends (reading side tables, awaiting a worker), and
//! the connection layer is built to tolerate decode completions arriving out
//! of order.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec operations.
#[derive(Debug)]
pub enum CodecError {
    /// Failed to encode a message to bytes.
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a message.
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(e) => write!(f, "encode error: {}", e),
            CodecError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Encode(e) => Some(e.as_ref()),
            CodecError::Decode(e) => Some(e.as_ref()),
        }
    }
}

/// Pluggable message serialization format.
///
/// Implement this trait to use custom payload formats. The trait requires
/// `Clone + 'static` so codec instances can be captured by decode tasks.
///
/// # Serde Dependency
///
/// The trait uses serde's `Serialize` and `DeserializeOwned` bounds, which
/// means message types must derive or implement serde traits.
#[async_trait(?Send)]
pub trait MessageCodec: Clone + 'static {
    /// Encode a serializable message to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a deserializable message, possibly suspending.
    ///
    /// Completions are allowed to finish in any order relative to other
    /// in-flight decodes; the connection layer reassembles arrival order.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if deserialization fails.
    async fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
///
/// This is the default codec provided by lifeline. It is great for debugging
/// (human-readable payloads) but not the most compact for production use.
/// Its decode completes immediately; it never suspends.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

#[async_trait(?Send)]
impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    async fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
