//! The flood request state machine.
//!
//! Every inbound request lands here. A gossip request is classified as
//! self-initiate, duplicate, or new; exactly one structured event is emitted
//! per classification, and fan-out happens for the first and last case. The
//! administrative `update_neighbors` request swaps the neighbor table.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use flood_proto::{
    EventKind, EventSink, GossipEvent, InstanceAddress, Request, Response, now_nanos,
};

use crate::client;
use crate::config::NodeConfig;
use crate::dedup::SeenCache;
use crate::store::{NeighborSource, NeighborStore};

/// Handles decoded requests for one gossip instance.
pub struct GossipHandler {
    config: NodeConfig,
    store: Arc<NeighborStore>,
    seen: SeenCache,
    sink: Arc<dyn EventSink>,
    source: Arc<dyn NeighborSource>,
    hydration_tried: AtomicBool,
}

impl GossipHandler {
    /// Build a handler around the instance's store, event sink, and lazy
    /// hydration source.
    #[must_use]
    pub fn new(
        config: NodeConfig,
        store: Arc<NeighborStore>,
        sink: Arc<dyn EventSink>,
        source: Arc<dyn NeighborSource>,
    ) -> Self {
        let seen = SeenCache::new(config.seen_capacity, config.seen_ttl);
        Self {
            config,
            store,
            seen,
            sink,
            source,
            hydration_tried: AtomicBool::new(false),
        }
    }

    /// The address this instance advertises to peers.
    #[must_use]
    pub const fn advertised_addr(&self) -> InstanceAddress {
        self.config.advertised_addr
    }

    /// Handle one decoded request and produce the response to send back.
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        match request {
            Request::Gossip {
                message,
                sender_id,
                timestamp,
            } => self.handle_gossip(message, sender_id, timestamp).await,
            Request::UpdateNeighbors { neighbors } => {
                let count = self.store.replace(neighbors);
                info!(count, "neighbor table replaced");
                Response::NeighborsUpdated { count }
            }
        }
    }

    async fn handle_gossip(
        self: &Arc<Self>,
        message: String,
        sender_id: InstanceAddress,
        timestamp: i64,
    ) -> Response {
        let own = self.config.advertised_addr;
        let received_timestamp = now_nanos();

        if sender_id == own {
            // Self-initiate: the orchestrator addressed us with our own
            // address as sender. Record the payload, dispatch the flood on
            // its own task, and ack without waiting for deliveries.
            self.seen.check_and_insert(&message);
            let started = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
            self.emit(
                &message,
                sender_id,
                received_timestamp,
                None,
                EventKind::Initiate,
                format!("gossip initiated by {own} at {started}"),
            );
            let details = format!("Done propagate! {own} received: '{message}'");
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.fan_out(&message, sender_id).await;
            });
            return Response::Ack { details };
        }

        // Single atomic check-and-insert: concurrent deliveries of the same
        // payload resolve to exactly one accept.
        if !self.seen.check_and_insert(&message) {
            self.emit(
                &message,
                sender_id,
                received_timestamp,
                None,
                EventKind::Duplicate,
                format!("{own} ignoring duplicate message: {message} from {sender_id}"),
            );
            return Response::Ack {
                details: format!("Duplicate message ignored by ({own})"),
            };
        }

        let propagation_ms = (received_timestamp - timestamp) as f64 / 1e6;
        self.emit(
            &message,
            sender_id,
            received_timestamp,
            Some(propagation_ms),
            EventKind::Received,
            format!("{own} received: '{message}' from {sender_id} in {propagation_ms:.2} ms"),
        );
        self.fan_out(&message, sender_id).await;

        Response::Ack {
            details: format!("{own} received: '{message}'"),
        }
    }

    /// Forward `message` to every known neighbor except `exclude`,
    /// concurrently, each call bounded by the client timeout. Individual
    /// failures are logged and never abort the siblings; nothing here is
    /// retried, since re-delivery would just be suppressed as a duplicate
    /// anyway.
    async fn fan_out(&self, message: &str, exclude: InstanceAddress) {
        let own = self.config.advertised_addr;
        let neighbors = self.neighbors_for_fanout().await;
        debug!(count = neighbors.len(), "fanning out");

        let calls = neighbors
            .into_iter()
            .filter(|addr| *addr != exclude && *addr != own)
            .map(|addr| {
                let request = Request::Gossip {
                    message: message.to_owned(),
                    sender_id: own,
                    timestamp: now_nanos(),
                };
                let timeout = self.config.client_timeout;
                async move {
                    if let Err(e) = client::send_request(addr, &request, timeout).await {
                        warn!(neighbor = %addr, error = %e, "fan-out delivery failed");
                    }
                }
            });

        futures::future::join_all(calls).await;
    }

    /// Read the neighbor table, falling back to a one-shot hydration fetch
    /// if nothing has been pushed to this instance yet.
    async fn neighbors_for_fanout(&self) -> Vec<InstanceAddress> {
        if let Some(neighbors) = self.store.read() {
            return neighbors;
        }

        if self.hydration_tried.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        match self.source.fetch().await {
            Ok(addrs) => {
                info!(count = addrs.len(), "hydrated neighbor table from fallback source");
                self.store.replace(addrs);
                self.store.read().unwrap_or_default()
            }
            Err(e) => {
                warn!(error = %e, "lazy neighbor hydration failed");
                Vec::new()
            }
        }
    }

    fn emit(
        &self,
        message: &str,
        sender_id: InstanceAddress,
        received_timestamp: i64,
        propagation_time: Option<f64>,
        event_type: EventKind,
        detail: String,
    ) {
        self.sink.emit(&GossipEvent {
            message: message.to_owned(),
            sender_id: sender_id.to_string(),
            receiver_id: self.config.advertised_addr.to_string(),
            received_timestamp,
            propagation_time,
            event_type,
            detail,
        });
    }
}
