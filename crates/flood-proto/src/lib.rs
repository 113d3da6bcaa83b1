//! # flood-proto
//!
//! Shared protocol definitions for the floodnet gossip platform: typed
//! identifiers, the RPC request/response messages exchanged between
//! instances, and the structured event records that form the experiment's
//! observable output.

#![forbid(unsafe_code)]

pub mod error;
pub mod events;
pub mod messages;
pub mod sink;
pub mod types;

pub use error::ProtoError;
pub use events::{EventKind, GossipEvent};
pub use messages::{Request, Response};
pub use sink::{EventSink, MemorySink, StdoutSink};
pub use types::{InstanceAddress, NodeId, now_nanos};
