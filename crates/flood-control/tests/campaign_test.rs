//! Full-pipeline test: readiness wait, RPC distribution campaign, then a
//! gossip round over real localhost instances.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flood_control::{
    Distributor, DistributorConfig, InstanceDirectory, Orchestrator, OrchestratorConfig,
    StaticDirectory,
};
use flood_node::{GossipHandler, GossipServer, NeighborStore, NoSource, NodeConfig};
use flood_proto::{EventKind, EventSink, InstanceAddress, MemorySink, NodeId};
use flood_topology::{Edge, NodeSpec, Topology};

struct TestCluster {
    directory: StaticDirectory,
    sinks: BTreeMap<NodeId, Arc<MemorySink>>,
}

async fn spawn_cluster(n: usize) -> TestCluster {
    let mut instances = BTreeMap::new();
    let mut sinks = BTreeMap::new();

    for i in 0..n {
        let listener = GossipServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind");
        let addr = InstanceAddress::new(listener.local_addr().expect("local addr"));
        let sink = Arc::new(MemorySink::new());
        let handler = Arc::new(GossipHandler::new(
            NodeConfig::new(addr).with_client_timeout(Duration::from_secs(2)),
            Arc::new(NeighborStore::new()),
            sink.clone() as Arc<dyn EventSink>,
            Arc::new(NoSource),
        ));
        let mut server = GossipServer::new(handler, 16);
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let node = NodeId::from(format!("gossip-{i}"));
        instances.insert(node.clone(), addr);
        sinks.insert(node, sink);
    }

    TestCluster {
        directory: StaticDirectory::new(instances),
        sinks,
    }
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

fn count_kind(cluster: &TestCluster, node: &str, payload: &str, kind: EventKind) -> usize {
    cluster.sinks[&NodeId::from(node)]
        .snapshot()
        .iter()
        .filter(|e| e.message == payload && e.event_type == kind)
        .count()
}

/// The round ack only confirms the initiator dispatched its flood; poll
/// until the cluster's event counts have settled before asserting.
async fn settle(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(condition(), "flood did not settle in time");
}

fn fast_config() -> DistributorConfig {
    DistributorConfig {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(20),
        push_timeout: Duration::from_secs(2),
        campaign_deadline: Duration::from_secs(10),
        concurrency: 4,
    }
}

#[tokio::test]
async fn distribution_then_round_floods_the_ring() {
    let cluster = spawn_cluster(4).await;
    let topology = ring_topology(4);

    let plan = Distributor::plan(&topology, &cluster.directory)
        .await
        .expect("plan");
    let report = Distributor::over_rpc(fast_config()).run(plan).await;
    assert!(report.is_success(), "distribution failed: {report:?}");
    assert_eq!(report.succeeded.len(), 4);

    let orchestrator_sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            rounds: 1,
            gossip_delay: Duration::from_millis(10),
            round_timeout: Duration::from_secs(10),
            readiness_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        },
        orchestrator_sink.clone(),
    );

    orchestrator
        .wait_for_ready(&cluster.directory, 4)
        .await
        .expect("ready");

    let initiator = NodeId::from("gossip-0");
    let chosen = orchestrator
        .pick_initiator(&cluster.directory, Some(&initiator))
        .await
        .expect("initiator");
    let rounds = orchestrator.run_rounds(chosen, "t-4").await;
    assert_eq!(rounds.completed, 1);
    assert_eq!(rounds.failed, 0);

    // The orchestrator recorded the round bracket.
    let kinds: Vec<EventKind> = orchestrator_sink
        .snapshot()
        .iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(kinds, vec![EventKind::GossipStart, EventKind::GossipEnd]);

    // The flood itself: one initiate, everyone else exactly one received,
    // and on a 4-ring the 5 deliveries leave exactly 2 suppressed copies.
    let payload = "t-4-r1";
    let total_duplicates = || -> usize {
        (0..4)
            .map(|i| count_kind(&cluster, &format!("gossip-{i}"), payload, EventKind::Duplicate))
            .sum()
    };
    settle(|| {
        ["gossip-1", "gossip-2", "gossip-3"]
            .into_iter()
            .all(|node| count_kind(&cluster, node, payload, EventKind::Received) == 1)
            && total_duplicates() == 2
    })
    .await;

    assert_eq!(count_kind(&cluster, "gossip-0", payload, EventKind::Initiate), 1);
    for node in ["gossip-1", "gossip-2", "gossip-3"] {
        assert_eq!(count_kind(&cluster, node, payload, EventKind::Received), 1);
    }
    assert_eq!(total_duplicates(), 2);
}

#[tokio::test]
async fn two_rounds_use_distinct_payloads_and_both_flood() {
    let cluster = spawn_cluster(3).await;
    let topology = ring_topology(3);

    let plan = Distributor::plan(&topology, &cluster.directory)
        .await
        .expect("plan");
    assert!(Distributor::over_rpc(fast_config()).run(plan).await.is_success());

    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            rounds: 2,
            gossip_delay: Duration::from_millis(10),
            round_timeout: Duration::from_secs(10),
            readiness_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        },
        Arc::new(MemorySink::new()),
    );
    let chosen = orchestrator
        .pick_initiator(&cluster.directory, Some(&NodeId::from("gossip-1")))
        .await
        .expect("initiator");
    let rounds = orchestrator.run_rounds(chosen, "ab12").await;
    assert_eq!(rounds.completed, 2);

    settle(|| {
        ["ab12-r1", "ab12-r2"].into_iter().all(|payload| {
            count_kind(&cluster, "gossip-0", payload, EventKind::Received) == 1
                && count_kind(&cluster, "gossip-2", payload, EventKind::Received) == 1
        })
    })
    .await;

    for payload in ["ab12-r1", "ab12-r2"] {
        assert_eq!(count_kind(&cluster, "gossip-1", payload, EventKind::Initiate), 1);
        assert_eq!(count_kind(&cluster, "gossip-0", payload, EventKind::Received), 1);
        assert_eq!(count_kind(&cluster, "gossip-2", payload, EventKind::Received), 1);
    }
}

#[tokio::test]
async fn dead_instance_fails_its_push_without_blocking_the_rest() {
    let cluster = spawn_cluster(2).await;

    // A third "instance" that is in the directory but not actually running.
    let mut live = cluster.directory.list().await.expect("list");
    live.insert(
        NodeId::from("gossip-2"),
        InstanceAddress::parse("127.0.0.1:1").expect("addr"),
    );
    let directory = StaticDirectory::new(live);
    let topology = ring_topology(3);

    let plan = Distributor::plan(&topology, &directory).await.expect("plan");
    let report = Distributor::over_rpc(DistributorConfig {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(10),
        push_timeout: Duration::from_millis(300),
        campaign_deadline: Duration::from_secs(10),
        concurrency: 2,
    })
    .run(plan)
    .await;

    assert!(!report.is_success());
    assert!(report.failed.contains(&NodeId::from("gossip-2")));
    assert_eq!(report.succeeded.len(), 2);
}
