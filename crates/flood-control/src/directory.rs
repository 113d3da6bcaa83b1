//! The instance directory: logical node id to live address.
//!
//! The directory is an external collaborator (in a real deployment the
//! container platform answers these queries); here it is an injected
//! interface so the distributor and orchestrator never reach for global
//! state, and tests can substitute arbitrary cluster shapes.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use flood_proto::{InstanceAddress, NodeId};

use crate::error::{ControlError, Result};

/// Boxed future type for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runtime mapping from logical node identity to live network address.
pub trait InstanceDirectory: Send + Sync {
    /// All currently live instances matching the deployment's selector.
    fn list(&self) -> BoxFuture<'_, Result<BTreeMap<NodeId, InstanceAddress>>>;
}

/// A directory with a fixed membership, built from an instances file or
/// assembled in code.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    instances: BTreeMap<NodeId, InstanceAddress>,
}

impl StaticDirectory {
    /// Build a directory from an explicit map.
    #[must_use]
    pub fn new(instances: BTreeMap<NodeId, InstanceAddress>) -> Self {
        Self { instances }
    }

    /// Load a directory from a JSON file of the form
    /// `{"gossip-0": "10.0.0.1:5050", ...}`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is missing or malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw =
            std::fs::read_to_string(path).map_err(|source| ControlError::InstancesUnreadable {
                path: path.display().to_string(),
                source,
            })?;
        let instances: BTreeMap<NodeId, InstanceAddress> =
            serde_json::from_str(&raw).map_err(|e| ControlError::InstancesMalformed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        Ok(Self { instances })
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if no instance is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl InstanceDirectory for StaticDirectory {
    fn list(&self) -> BoxFuture<'_, Result<BTreeMap<NodeId, InstanceAddress>>> {
        let instances = self.instances.clone();
        Box::pin(async move { Ok(instances) })
    }
}
