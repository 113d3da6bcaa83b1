//! The test orchestrator.
//!
//! Waits for the cluster to reach its expected size, then drives strictly
//! sequential gossip rounds against one initiator instance, emitting
//! `gossip_start` / `gossip_end` / `gossip_error` records into the same
//! event stream the nodes write their protocol events to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::IteratorRandom;
use tracing::{info, warn};

use flood_node::send_request;
use flood_proto::{
    EventKind, EventSink, GossipEvent, InstanceAddress, NodeId, Request, Response, now_nanos,
};

use crate::directory::InstanceDirectory;
use crate::error::{ControlError, Result};

/// Knobs for a round-driving session.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of gossip rounds to run.
    pub rounds: u32,
    /// Pause before each round (lets the previous flood settle).
    pub gossip_delay: Duration,
    /// Timeout for one round's initiate acknowledgment.
    pub round_timeout: Duration,
    /// Readiness wait budget.
    pub readiness_timeout: Duration,
    /// Readiness poll interval.
    pub poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rounds: 1,
            gossip_delay: Duration::from_secs(5),
            round_timeout: Duration::from_secs(300),
            readiness_timeout: Duration::from_secs(1000),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Outcome of a rounds session; a failed round never stops the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundsReport {
    /// Rounds that were acknowledged.
    pub completed: u32,
    /// Rounds that errored or timed out.
    pub failed: u32,
}

/// Drives gossip rounds and readiness waits.
pub struct Orchestrator {
    config: OrchestratorConfig,
    sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Create an orchestrator emitting its round events into `sink`.
    #[must_use]
    pub fn new(config: OrchestratorConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    /// Poll the directory until `expected` instances are live.
    ///
    /// A failed directory query counts as an unready poll (zero observed),
    /// not a fatal error; a transient lookup hiccup should burn poll
    /// interval, not abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ReadinessTimeout`] if the window elapses
    /// first; this is fatal for the run and no rounds execute after it.
    pub async fn wait_for_ready(
        &self,
        directory: &dyn InstanceDirectory,
        expected: usize,
    ) -> Result<()> {
        let started = Instant::now();
        let mut observed = 0;

        while started.elapsed() < self.config.readiness_timeout {
            observed = match directory.list().await {
                Ok(live) => live.len(),
                Err(e) => {
                    warn!(error = %e, "directory query failed; treating as not ready");
                    0
                }
            };
            if observed >= expected {
                info!(expected, observed, "cluster is ready");
                return Ok(());
            }
            info!(expected, observed, "waiting for instances");
            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(ControlError::ReadinessTimeout {
            expected,
            observed,
            waited: started.elapsed(),
        })
    }

    /// Pick the initiator: the named node if given, otherwise a uniformly
    /// random live instance.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownInitiator`] if a named node has no
    /// live instance, or if the directory is empty.
    pub async fn pick_initiator(
        &self,
        directory: &dyn InstanceDirectory,
        requested: Option<&NodeId>,
    ) -> Result<(NodeId, InstanceAddress)> {
        let live = directory.list().await?;
        match requested {
            Some(node) => live
                .get(node)
                .map(|addr| (node.clone(), *addr))
                .ok_or_else(|| ControlError::UnknownInitiator(node.to_string())),
            None => live
                .into_iter()
                .choose(&mut rand::thread_rng())
                .ok_or_else(|| ControlError::UnknownInitiator("<any>".to_owned())),
        }
    }

    /// Run the configured number of strictly sequential rounds against the
    /// chosen initiator. Per-round errors are absorbed: they emit a
    /// `gossip_error` record and the session moves on.
    pub async fn run_rounds(
        &self,
        initiator: (NodeId, InstanceAddress),
        run_id: &str,
    ) -> RoundsReport {
        let (node, addr) = initiator;
        let mut report = RoundsReport::default();

        for round in 1..=self.config.rounds {
            tokio::time::sleep(self.config.gossip_delay).await;

            // Distinct payload per round keeps rounds tellable apart in the
            // event stream.
            let payload = format!("{run_id}-r{round}");
            self.emit_round_event(
                &payload,
                &node,
                EventKind::GossipStart,
                format!("gossip round {round} started via {node} ({addr})"),
            );

            let request = Request::Gossip {
                message: payload.clone(),
                sender_id: addr,
                timestamp: now_nanos(),
            };

            match send_request(addr, &request, self.config.round_timeout).await {
                Ok(Response::Ack { details }) => {
                    info!(round, initiator = %node, "round acknowledged");
                    self.emit_round_event(
                        &payload,
                        &node,
                        EventKind::GossipEnd,
                        format!("gossip round {round} acknowledged: {details}"),
                    );
                    report.completed += 1;
                }
                Ok(other) => {
                    warn!(round, response = ?other, "unexpected response to initiate");
                    self.emit_round_event(
                        &payload,
                        &node,
                        EventKind::GossipError,
                        format!("gossip round {round} got an unexpected response"),
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(round, error = %e, "round failed");
                    self.emit_round_event(
                        &payload,
                        &node,
                        EventKind::GossipError,
                        format!("gossip round {round} failed: {e}"),
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn emit_round_event(&self, payload: &str, node: &NodeId, kind: EventKind, detail: String) {
        self.sink.emit(&GossipEvent {
            message: payload.to_owned(),
            sender_id: "orchestrator".to_owned(),
            receiver_id: node.to_string(),
            received_timestamp: now_nanos(),
            propagation_time: None,
            event_type: kind,
            detail,
        });
    }
}
