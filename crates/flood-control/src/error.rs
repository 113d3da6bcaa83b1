//! Control-plane errors.

use std::time::Duration;

use thiserror::Error;

use flood_topology::TopologyError;

/// Errors raised by the distributor and orchestrator.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Topology file problems (missing, malformed, invalid).
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The instances file does not exist or cannot be read.
    #[error("instances file '{path}' could not be read: {source}")]
    InstancesUnreadable {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The instances file is not a valid node-to-address map.
    #[error("instances file '{path}' is malformed: {detail}")]
    InstancesMalformed {
        /// Path that was attempted.
        path: String,
        /// Parser diagnostic.
        detail: String,
    },

    /// Topology size and live instance count disagree; the whole
    /// distribution is aborted before any push.
    #[error("topology declares {topology} nodes but {live} instances are live")]
    CountMismatch {
        /// Node count in the topology file.
        topology: usize,
        /// Live instances reported by the directory.
        live: usize,
    },

    /// The cluster did not reach the expected size within the wait window.
    #[error("cluster not ready: {observed}/{expected} instances after {waited:?}")]
    ReadinessTimeout {
        /// Instances required.
        expected: usize,
        /// Instances observed at the last poll.
        observed: usize,
        /// How long we waited.
        waited: Duration,
    },

    /// The instance directory could not be queried.
    #[error("instance directory query failed: {0}")]
    Directory(String),

    /// No live instance exists for the requested initiator.
    #[error("initiator '{0}' has no live instance")]
    UnknownInitiator(String),
}

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, ControlError>;
