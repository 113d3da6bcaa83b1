//! Protocol-level errors.

use thiserror::Error;

/// Errors raised while parsing or encoding protocol data.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// An instance address string could not be parsed.
    #[error("invalid instance address '{0}'")]
    InvalidAddress(String),

    /// A received frame was not valid JSON for the expected message type.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A message could not be serialized.
    #[error("encode failure: {0}")]
    Encode(String),
}
