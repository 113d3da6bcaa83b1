//! Structured experiment events.
//!
//! One [`GossipEvent`] is emitted per protocol decision; the stream of these
//! records (one JSON object per line on stdout) is the sole surface used to
//! verify correctness and measure propagation latency.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An instance started a flood of its own message.
    Initiate,
    /// A delivery of an already-accepted message was suppressed.
    Duplicate,
    /// A new message was accepted and forwarded.
    Received,
    /// The orchestrator started a gossip round.
    GossipStart,
    /// The orchestrator observed a round's acknowledgment.
    GossipEnd,
    /// A round failed at the orchestrator level.
    GossipError,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initiate => "initiate",
            Self::Duplicate => "duplicate",
            Self::Received => "received",
            Self::GossipStart => "gossip_start",
            Self::GossipEnd => "gossip_end",
            Self::GossipError => "gossip_error",
        };
        write!(f, "{s}")
    }
}

/// One structured event record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GossipEvent {
    /// The message payload this event concerns.
    pub message: String,
    /// Address (or orchestrator identity) the message came from.
    pub sender_id: String,
    /// Identity of the instance emitting the event.
    pub receiver_id: String,
    /// When the event was recorded, nanoseconds since the Unix epoch.
    pub received_timestamp: i64,
    /// Propagation delay in milliseconds; only set for `received` events.
    pub propagation_time: Option<f64>,
    /// Event classification.
    pub event_type: EventKind,
    /// Human-readable description.
    pub detail: String,
}
