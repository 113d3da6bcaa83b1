//! # flood-node
//!
//! The per-instance gossip service. Each running instance owns a neighbor
//! table and a bounded dedup cache; on an inbound flood request it decides
//! initiate/duplicate/received, emits exactly one structured event, and fans
//! the message out to its neighbors.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod handler;
pub mod server;
pub mod store;

pub use client::send_request;
pub use config::NodeConfig;
pub use dedup::SeenCache;
pub use error::{NodeError, Result};
pub use handler::GossipHandler;
pub use server::GossipServer;
pub use store::{DirectorySource, NeighborSource, NeighborStore, NoSource, StaticSource};
