//! Gossip node errors.

use std::net::SocketAddr;

use thiserror::Error;

use flood_proto::{InstanceAddress, ProtoError};

/// Errors raised by the gossip service and its RPC client.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The listener could not be bound.
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    /// An outbound connection could not be established.
    #[error("failed to connect to {0}: {1}")]
    Connect(InstanceAddress, #[source] std::io::Error),

    /// An RPC exchange did not complete within its timeout.
    #[error("rpc to {0} timed out")]
    Timeout(InstanceAddress),

    /// The peer closed the connection before replying.
    #[error("connection to {0} closed before a response arrived")]
    ConnectionClosed(InstanceAddress),

    /// Transport-level I/O failure mid-exchange.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Line framing failure (oversized or broken frame).
    #[error("framing error: {0}")]
    Framing(#[from] tokio_util::codec::LinesCodecError),

    /// Protocol encode/decode failure.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// The instance directory could not be queried for lazy hydration.
    #[error("directory lookup failed: {0}")]
    Directory(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
