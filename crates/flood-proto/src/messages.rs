//! RPC messages exchanged between instances.
//!
//! Every exchange is one JSON object per line: a [`Request`] line in, a
//! [`Response`] line back. The administrative neighbor push rides the same
//! service as gossip itself, so a single listener handles both.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::types::InstanceAddress;

/// Requests accepted by a gossip instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Flood a message. `sender_id` equal to the receiving instance's own
    /// advertised address marks the self-initiate case.
    Gossip {
        /// Opaque message payload; distinct per round.
        message: String,
        /// Address of the instance the message came from.
        sender_id: InstanceAddress,
        /// Send timestamp, nanoseconds since the Unix epoch.
        timestamp: i64,
    },
    /// Atomically replace the instance's neighbor table.
    UpdateNeighbors {
        /// The complete new neighbor set.
        neighbors: Vec<InstanceAddress>,
    },
}

/// Responses returned by a gossip instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Human-readable acknowledgment of a gossip request. Callers distinguish
    /// duplicate from fresh delivery by the event stream, not this text.
    Ack {
        /// Acknowledgment text.
        details: String,
    },
    /// Neighbor table replaced.
    NeighborsUpdated {
        /// Number of distinct neighbor addresses now stored.
        count: usize,
    },
    /// The request could not be handled.
    Error {
        /// What went wrong.
        details: String,
    },
}

impl Request {
    /// Encode as a single JSON line (without the trailing newline).
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encode(e.to_string()))
    }

    /// Decode a request from one received line.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MalformedFrame`] if the line is not a valid
    /// request.
    pub fn from_json(line: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(line).map_err(|e| ProtoError::MalformedFrame(e.to_string()))
    }
}

impl Response {
    /// Encode as a single JSON line (without the trailing newline).
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encode(e.to_string()))
    }

    /// Decode a response from one received line.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MalformedFrame`] if the line is not a valid
    /// response.
    pub fn from_json(line: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(line).map_err(|e| ProtoError::MalformedFrame(e.to_string()))
    }
}
