//! Error types for value marshaling.

use thiserror::Error;

/// Result type for marshal/unmarshal helpers.
pub type ValueResult<T> = Result<T, ValueError>;

/// Failures converting between caller values and byte payloads.
#[derive(Debug, Error)]
pub enum ValueError {
    /// A structured value could not be encoded as JSON.
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A stored payload could not be decoded as the requested type.
    #[error("failed to deserialize value: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// The stored reply was not a byte string (e.g. an integer or array).
    #[error("stored value is not a byte string")]
    NotBytes,
}
