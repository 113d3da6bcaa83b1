//! The instance-local neighbor table.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use parking_lot::RwLock;
use tracing::debug;

use flood_proto::{InstanceAddress, NodeId};

use crate::error::{NodeError, Result};

/// Boxed future type for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The authoritative neighbor table one instance consults at fan-out time.
///
/// The table is created empty at startup and replaced wholesale by the
/// distributor's administrative push. Readers always observe either the
/// fully-old or the fully-new set, never a mix; addresses are deduplicated,
/// so repeating the same push is idempotent.
#[derive(Debug, Default)]
pub struct NeighborStore {
    neighbors: RwLock<Option<BTreeSet<InstanceAddress>>>,
}

impl NeighborStore {
    /// Create an empty, not-yet-hydrated store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the entire table. Returns the number of distinct
    /// addresses now stored.
    pub fn replace(&self, addrs: impl IntoIterator<Item = InstanceAddress>) -> usize {
        let set: BTreeSet<InstanceAddress> = addrs.into_iter().collect();
        let count = set.len();
        *self.neighbors.write() = Some(set);
        count
    }

    /// Snapshot of the current neighbor set, or `None` if no push (or
    /// hydration) has happened yet.
    #[must_use]
    pub fn read(&self) -> Option<Vec<InstanceAddress>> {
        self.neighbors
            .read()
            .as_ref()
            .map(|set| set.iter().copied().collect())
    }

    /// Whether the table has been populated at least once.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.neighbors.read().is_some()
    }
}

/// Fallback source a node may consult once if its store is still empty at
/// fan-out time (a catch-up for instances that started before distribution
/// completed).
pub trait NeighborSource: Send + Sync {
    /// Fetch a neighbor set from wherever this source looks.
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<InstanceAddress>>>;
}

/// A source that never yields neighbors; lazy hydration becomes a no-op.
#[derive(Debug, Default)]
pub struct NoSource;

impl NeighborSource for NoSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<InstanceAddress>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// A fixed address list, typically parsed from the node's command line.
#[derive(Debug, Clone)]
pub struct StaticSource {
    addrs: Vec<InstanceAddress>,
}

impl StaticSource {
    /// Create a source yielding exactly `addrs`.
    #[must_use]
    pub fn new(addrs: Vec<InstanceAddress>) -> Self {
        Self { addrs }
    }
}

impl NeighborSource for StaticSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<InstanceAddress>>> {
        let addrs = self.addrs.clone();
        Box::pin(async move { Ok(addrs) })
    }
}

/// Queries the deployment's instance directory at hydration time by
/// re-reading the same instances file the control plane distributes from.
///
/// Unlike [`StaticSource`], the membership does not need to exist when the
/// node starts; the file is read when the first fan-out finds the store
/// empty, so a node that came up before distribution still catches up. The
/// node's own address is excluded from the result.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: PathBuf,
    own_addr: InstanceAddress,
}

impl DirectorySource {
    /// Create a source reading `path` on fetch, filtering out `own_addr`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, own_addr: InstanceAddress) -> Self {
        Self {
            path: path.into(),
            own_addr,
        }
    }
}

impl NeighborSource for DirectorySource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<InstanceAddress>>> {
        Box::pin(async move {
            let raw = tokio::fs::read_to_string(&self.path).await?;
            let live: BTreeMap<NodeId, InstanceAddress> = serde_json::from_str(&raw)
                .map_err(|e| {
                    NodeError::Directory(format!(
                        "instances file '{}' is malformed: {e}",
                        self.path.display()
                    ))
                })?;
            let addrs: Vec<InstanceAddress> = live
                .into_values()
                .filter(|addr| *addr != self.own_addr)
                .collect();
            debug!(count = addrs.len(), "directory source resolved live instances");
            Ok(addrs)
        })
    }
}
