//! Bridge error type.

use thiserror::Error;

/// Errors at the bridge boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge transport disconnected")]
    /// The other side went away.
    Disconnected,

    #[error("invalid bridge message: {0}")]
    /// A message could not be encoded or decoded.
    Codec(#[from] serde_json::Error),

    #[error("request failed ({reason}): {message}")]
    /// The other side answered with a failure.
    Remote {
        /// Machine-readable reason.
        reason: String,
        /// Human-readable message.
        message: String,
    },
}
