//! # flood-control
//!
//! The control side of a floodnet experiment: computing and pushing neighbor
//! tables into running instances (with bounded retry), waiting for the
//! cluster to come up, and driving sequential gossip rounds.

#![forbid(unsafe_code)]

pub mod directory;
pub mod distributor;
pub mod error;
pub mod orchestrator;

pub use directory::{InstanceDirectory, StaticDirectory};
pub use distributor::{
    CampaignReport, DistributionPlan, Distributor, DistributorConfig, NeighborPusher, PushError,
    RpcPusher,
};
pub use error::{ControlError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RoundsReport};
