//! Neighbor distribution campaigns.
//!
//! A campaign computes every instance's neighbor address list from the
//! topology and the instance directory, then pushes each list with the
//! typed administrative RPC. Pushes are independent per target and run with
//! bounded concurrency; a failed push goes back on the queue with a linearly
//! growing backoff until it succeeds, exhausts its attempts, or the
//! campaign-wide deadline lands.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use flood_node::send_request;
use flood_proto::{InstanceAddress, NodeId, Request, Response};
use flood_topology::Topology;

use crate::directory::{BoxFuture, InstanceDirectory};
use crate::error::{ControlError, Result};

/// A push attempt failure; carried through the retry queue.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PushError(pub String);

/// Delivers one neighbor set to one target instance.
pub trait NeighborPusher: Send + Sync {
    /// Replace `target`'s entire neighbor table with `neighbors`.
    fn push(
        &self,
        target: InstanceAddress,
        neighbors: Vec<InstanceAddress>,
    ) -> BoxFuture<'_, std::result::Result<(), PushError>>;
}

/// Pushes over the gossip service's own RPC surface.
#[derive(Debug, Clone)]
pub struct RpcPusher {
    timeout: Duration,
}

impl RpcPusher {
    /// Create a pusher whose every exchange is bounded by `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl NeighborPusher for RpcPusher {
    fn push(
        &self,
        target: InstanceAddress,
        neighbors: Vec<InstanceAddress>,
    ) -> BoxFuture<'_, std::result::Result<(), PushError>> {
        let timeout = self.timeout;
        Box::pin(async move {
            let response = send_request(target, &Request::UpdateNeighbors { neighbors }, timeout)
                .await
                .map_err(|e| PushError(e.to_string()))?;
            match response {
                Response::NeighborsUpdated { count } => {
                    debug!(target = %target, count, "neighbor push applied");
                    Ok(())
                }
                Response::Error { details } => Err(PushError(details)),
                Response::Ack { details } => {
                    Err(PushError(format!("unexpected ack to a push: {details}")))
                }
            }
        })
    }
}

/// One target's resolved push work.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Logical identity of the target.
    pub node: NodeId,
    /// Where the target lives right now.
    pub addr: InstanceAddress,
    /// The complete neighbor set to install.
    pub neighbors: Vec<InstanceAddress>,
}

/// A validated, fully-resolved distribution campaign.
#[derive(Debug, Clone)]
pub struct DistributionPlan {
    /// Per-target work, one entry per live topology node.
    pub entries: Vec<PlanEntry>,
}

impl DistributionPlan {
    /// Number of targets in the campaign.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there is nothing to push.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Knobs for a distribution campaign.
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Maximum push attempts per target before it is marked failed.
    pub max_attempts: u32,
    /// Backoff after the first failure; attempt `n` waits `n *
    /// initial_backoff` (linear by attempt count).
    pub initial_backoff: Duration,
    /// Timeout for each individual push exchange.
    pub push_timeout: Duration,
    /// Wall-clock budget for the whole campaign, retries included.
    pub campaign_deadline: Duration,
    /// How many pushes may be in flight at once.
    pub concurrency: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            push_timeout: Duration::from_secs(30),
            campaign_deadline: Duration::from_secs(3600),
            concurrency: 4,
        }
    }
}

impl DistributorConfig {
    /// Backoff to wait after `attempt` failed (1-based).
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(attempt.max(1))
    }
}

/// Outcome of a campaign. Completion is not success: the campaign is done
/// once no work remains, and succeeded only if `failed` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    /// Targets whose push was applied.
    pub succeeded: BTreeSet<NodeId>,
    /// Targets that exhausted their attempts or hit the deadline.
    pub failed: BTreeSet<NodeId>,
    /// Total campaign wall-clock time.
    pub elapsed: Duration,
}

impl CampaignReport {
    /// True if every target received its neighbor set.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs distribution campaigns against a pusher.
pub struct Distributor {
    config: DistributorConfig,
    pusher: Arc<dyn NeighborPusher>,
}

impl Distributor {
    /// Create a distributor with the given pusher.
    #[must_use]
    pub fn new(config: DistributorConfig, pusher: Arc<dyn NeighborPusher>) -> Self {
        Self { config, pusher }
    }

    /// Create a distributor that pushes over the gossip RPC surface.
    #[must_use]
    pub fn over_rpc(config: DistributorConfig) -> Self {
        let pusher = Arc::new(RpcPusher::new(config.push_timeout));
        Self::new(config, pusher)
    }

    /// Validate and resolve a campaign.
    ///
    /// Aborts with [`ControlError::CountMismatch`] before planning any push
    /// if the topology size and live instance count disagree. A neighbor id
    /// with no live instance is dropped from its set (that is a
    /// topology/deployment mismatch the count check already guards);
    /// a *target* with no live instance is skipped with a warning.
    ///
    /// # Errors
    ///
    /// Configuration errors only; per-target push failures surface later in
    /// the [`CampaignReport`].
    pub async fn plan(
        topology: &Topology,
        directory: &dyn InstanceDirectory,
    ) -> Result<DistributionPlan> {
        let live = directory.list().await?;

        if topology.node_count() != live.len() {
            return Err(ControlError::CountMismatch {
                topology: topology.node_count(),
                live: live.len(),
            });
        }

        let mut entries = Vec::new();
        for (node, neighbor_ids) in topology.neighbor_map() {
            let Some(addr) = live.get(&node) else {
                warn!(node = %node, "topology node has no live instance, skipping");
                continue;
            };
            let neighbors: Vec<InstanceAddress> = neighbor_ids
                .iter()
                .filter_map(|id| {
                    let resolved = live.get(id).copied();
                    if resolved.is_none() {
                        warn!(node = %node, neighbor = %id, "neighbor has no live instance, dropped");
                    }
                    resolved
                })
                .collect();
            entries.push(PlanEntry {
                node,
                addr: *addr,
                neighbors,
            });
        }

        Ok(DistributionPlan { entries })
    }

    /// Execute a campaign and report the outcome.
    ///
    /// Each target retries independently; a permanently failing target never
    /// delays the others. The campaign stops at the deadline, counting
    /// whatever is still pending as failed.
    pub async fn run(&self, plan: DistributionPlan) -> CampaignReport {
        let started = Instant::now();
        let total = plan.len();
        info!(
            targets = total,
            max_attempts = self.config.max_attempts,
            deadline = ?self.config.campaign_deadline,
            "starting neighbor distribution campaign"
        );

        let limiter = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers: JoinSet<(NodeId, bool)> = JoinSet::new();
        let mut pending: BTreeSet<NodeId> = plan.entries.iter().map(|e| e.node.clone()).collect();

        for entry in plan.entries {
            let pusher = self.pusher.clone();
            let config = self.config.clone();
            let limiter = limiter.clone();
            workers.spawn(push_until_done(entry, pusher, config, limiter));
        }

        let mut succeeded = BTreeSet::new();
        let mut failed = BTreeSet::new();
        let deadline = tokio::time::sleep(self.config.campaign_deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = workers.join_next() => {
                    match joined {
                        Some(Ok((node, ok))) => {
                            pending.remove(&node);
                            if ok {
                                succeeded.insert(node);
                            } else {
                                failed.insert(node);
                            }
                        }
                        Some(Err(e)) => {
                            // A panicked worker leaves its target pending;
                            // it is picked up as failed below.
                            warn!(error = %e, "push worker aborted");
                        }
                        None => break,
                    }
                }
                () = &mut deadline => {
                    warn!(pending = pending.len(), "campaign deadline reached");
                    workers.abort_all();
                    break;
                }
            }
        }

        failed.extend(pending);

        let elapsed = started.elapsed();
        info!(
            total,
            succeeded = succeeded.len(),
            failed = failed.len(),
            elapsed = ?elapsed,
            "campaign complete"
        );

        CampaignReport {
            succeeded,
            failed,
            elapsed,
        }
    }
}

/// One target's retry loop. The backoff sleep happens outside the
/// concurrency permit, so a waiting retry never occupies a worker slot.
async fn push_until_done(
    entry: PlanEntry,
    pusher: Arc<dyn NeighborPusher>,
    config: DistributorConfig,
    limiter: Arc<Semaphore>,
) -> (NodeId, bool) {
    let mut attempt: u32 = 1;
    loop {
        let outcome = {
            let Ok(_permit) = limiter.acquire().await else {
                return (entry.node, false);
            };
            pusher.push(entry.addr, entry.neighbors.clone()).await
        };

        match outcome {
            Ok(()) => {
                debug!(node = %entry.node, attempt, "push succeeded");
                return (entry.node, true);
            }
            Err(e) if attempt >= config.max_attempts => {
                warn!(node = %entry.node, attempt, error = %e, "push failed permanently");
                return (entry.node, false);
            }
            Err(e) => {
                let delay = config.backoff_for_attempt(attempt);
                warn!(node = %entry.node, attempt, error = %e, backoff = ?delay, "push failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_topology::{Edge, NodeSpec};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::collections::HashMap;

    use crate::directory::StaticDirectory;

    fn addr(s: &str) -> InstanceAddress {
        InstanceAddress::parse(s).unwrap()
    }

    fn ring_topology(n: usize) -> Topology {
        Topology {
            nodes: (0..n)
                .map(|i| NodeSpec {
                    id: NodeId::from(format!("gossip-{i}")),
                })
                .collect(),
            edges: (0..n)
                .map(|i| Edge {
                    source: NodeId::from(format!("gossip-{i}")),
                    target: NodeId::from(format!("gossip-{}", (i + 1) % n)),
                    weight: None,
                })
                .collect(),
            directed: false,
        }
    }

    fn directory(n: usize) -> StaticDirectory {
        let map: BTreeMap<NodeId, InstanceAddress> = (0..n)
            .map(|i| {
                (
                    NodeId::from(format!("gossip-{i}")),
                    addr(&format!("10.0.0.{}:5050", i + 1)),
                )
            })
            .collect();
        StaticDirectory::new(map)
    }

    /// Scripted pusher: fails the first `failures[target]` attempts.
    #[derive(Default)]
    struct FlakyPusher {
        failures: HashMap<InstanceAddress, u32>,
        attempts: Mutex<HashMap<InstanceAddress, u32>>,
    }

    impl FlakyPusher {
        fn failing(mut self, target: InstanceAddress, times: u32) -> Self {
            self.failures.insert(target, times);
            self
        }

        fn attempts_for(&self, target: InstanceAddress) -> u32 {
            self.attempts.lock().get(&target).copied().unwrap_or(0)
        }
    }

    impl NeighborPusher for FlakyPusher {
        fn push(
            &self,
            target: InstanceAddress,
            _neighbors: Vec<InstanceAddress>,
        ) -> BoxFuture<'_, std::result::Result<(), PushError>> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                let slot = attempts.entry(target).or_insert(0);
                *slot += 1;
                *slot
            };
            let budget = self.failures.get(&target).copied().unwrap_or(0);
            Box::pin(async move {
                if attempt <= budget {
                    Err(PushError(format!("scripted failure #{attempt}")))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn fast_config() -> DistributorConfig {
        DistributorConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            push_timeout: Duration::from_millis(100),
            campaign_deadline: Duration::from_secs(5),
            concurrency: 2,
        }
    }

    #[tokio::test]
    async fn plan_resolves_every_live_node() {
        let topology = ring_topology(4);
        let plan = Distributor::plan(&topology, &directory(4)).await.unwrap();
        assert_eq!(plan.len(), 4);
        for entry in &plan.entries {
            assert_eq!(entry.neighbors.len(), 2);
        }
    }

    #[tokio::test]
    async fn count_mismatch_aborts_before_any_push() {
        let topology = ring_topology(6);
        let err = Distributor::plan(&topology, &directory(5)).await.unwrap_err();
        assert!(matches!(
            err,
            ControlError::CountMismatch { topology: 6, live: 5 }
        ));
    }

    #[tokio::test]
    async fn missing_neighbor_instance_is_dropped() {
        let topology = ring_topology(3);
        // Same count, but one topology id is unknown to the directory.
        let map: BTreeMap<NodeId, InstanceAddress> = [
            (NodeId::from("gossip-0"), addr("10.0.0.1:5050")),
            (NodeId::from("gossip-1"), addr("10.0.0.2:5050")),
            (NodeId::from("stray"), addr("10.0.0.3:5050")),
        ]
        .into_iter()
        .collect();
        let plan = Distributor::plan(&topology, &StaticDirectory::new(map))
            .await
            .unwrap();
        // gossip-2 has no live instance: skipped as a target, dropped as a
        // neighbor of gossip-0 and gossip-1.
        assert_eq!(plan.len(), 2);
        for entry in &plan.entries {
            assert_eq!(entry.neighbors.len(), 1);
        }
    }

    #[tokio::test]
    async fn clean_campaign_succeeds_everywhere() {
        let topology = ring_topology(4);
        let plan = Distributor::plan(&topology, &directory(4)).await.unwrap();
        let distributor = Distributor::new(fast_config(), Arc::new(FlakyPusher::default()));
        let report = distributor.run(plan).await;
        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 4);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_success() {
        let topology = ring_topology(3);
        let plan = Distributor::plan(&topology, &directory(3)).await.unwrap();
        let pusher = Arc::new(FlakyPusher::default().failing(addr("10.0.0.2:5050"), 2));
        let distributor = Distributor::new(fast_config(), pusher.clone());
        let report = distributor.run(plan).await;
        assert!(report.is_success());
        assert_eq!(pusher.attempts_for(addr("10.0.0.2:5050")), 3);
    }

    #[tokio::test]
    async fn hopeless_target_fails_after_exactly_max_attempts() {
        let topology = ring_topology(3);
        let plan = Distributor::plan(&topology, &directory(3)).await.unwrap();
        let pusher = Arc::new(FlakyPusher::default().failing(addr("10.0.0.1:5050"), u32::MAX));
        let distributor = Distributor::new(fast_config(), pusher.clone());
        let report = distributor.run(plan).await;

        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed.contains(&NodeId::from("gossip-0")));
        // Exactly max_attempts, no more.
        assert_eq!(pusher.attempts_for(addr("10.0.0.1:5050")), 3);
        // The other targets still made it.
        assert_eq!(report.succeeded.len(), 2);
    }

    #[tokio::test]
    async fn deadline_marks_pending_targets_failed() {
        let topology = ring_topology(2);
        let plan = Distributor::plan(&topology, &directory(2)).await.unwrap();
        let config = DistributorConfig {
            max_attempts: 100,
            initial_backoff: Duration::from_secs(10),
            campaign_deadline: Duration::from_millis(50),
            ..fast_config()
        };
        // Both targets fail forever, so the deadline cuts the campaign.
        let pusher = Arc::new(
            FlakyPusher::default()
                .failing(addr("10.0.0.1:5050"), u32::MAX)
                .failing(addr("10.0.0.2:5050"), u32::MAX),
        );
        let distributor = Distributor::new(config, pusher);
        let report = distributor.run(plan).await;

        assert_eq!(report.failed.len(), 2);
        assert!(report.succeeded.is_empty());
        assert!(report.elapsed < Duration::from_secs(5));
    }

    #[test]
    fn backoff_grows_linearly() {
        let config = DistributorConfig {
            initial_backoff: Duration::from_millis(100),
            ..DistributorConfig::default()
        };
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_millis(300));
    }
}
