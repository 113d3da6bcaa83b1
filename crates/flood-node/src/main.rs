//! floodnode - per-instance gossip flooding service.
//!
//! Runs one gossip instance: listens for flood and neighbor-push requests,
//! emits the structured event stream on stdout, and logs diagnostics via
//! tracing on stderr.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flood_node::{
    DirectorySource, GossipHandler, GossipServer, NeighborSource, NeighborStore, NoSource,
    NodeConfig, StaticSource,
};
use flood_proto::{InstanceAddress, StdoutSink};

#[derive(Parser)]
#[command(name = "floodnode")]
#[command(about = "Floodnet gossip node")]
#[command(version)]
struct Cli {
    /// Address to advertise to peers (ip:port); also the self-initiate key.
    #[arg(long, env = "FLOODNODE_ADVERTISE")]
    advertise: InstanceAddress,

    /// Address to bind the listener (defaults to the advertised port on all
    /// interfaces).
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Instances file (JSON map of node id to ip:port) queried at lazy
    /// hydration time if no push has arrived by the first fan-out; the file
    /// is read on demand, so it may appear after startup.
    #[arg(long, env = "FLOODNODE_INSTANCES", conflicts_with = "fallback_neighbors")]
    instances: Option<std::path::PathBuf>,

    /// Comma-separated fallback neighbor addresses used for one-shot lazy
    /// hydration if no push has arrived by the first fan-out.
    #[arg(long, value_delimiter = ',')]
    fallback_neighbors: Vec<InstanceAddress>,

    /// Per-neighbor outbound call timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    client_timeout_ms: u64,

    /// Maximum inbound requests handled concurrently.
    #[arg(long, default_value_t = 64)]
    max_inflight: usize,

    /// Seen-message cache capacity (1 reproduces single-slot dedup).
    #[arg(long, default_value_t = 1024)]
    seen_capacity: usize,

    /// Seen-message cache TTL in seconds.
    #[arg(long, default_value_t = 600)]
    seen_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = NodeConfig::new(cli.advertise)
        .with_client_timeout(Duration::from_millis(cli.client_timeout_ms))
        .with_seen_capacity(cli.seen_capacity)
        .with_seen_ttl(Duration::from_secs(cli.seen_ttl_secs));
    config.max_inflight = cli.max_inflight;
    if let Some(listen) = cli.listen {
        config = config.with_listen_addr(listen);
    }

    let store = Arc::new(NeighborStore::new());
    let sink = Arc::new(StdoutSink::new());
    let source: Arc<dyn NeighborSource> = if let Some(path) = cli.instances {
        Arc::new(DirectorySource::new(path, cli.advertise))
    } else if cli.fallback_neighbors.is_empty() {
        Arc::new(NoSource)
    } else {
        Arc::new(StaticSource::new(cli.fallback_neighbors))
    };
    let handler = GossipHandler::new(config.clone(), store, sink, source);

    let listener = GossipServer::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    let mut server = GossipServer::new(Arc::new(handler), config.max_inflight);
    server.serve(listener).await.context("gossip server failed")?;

    Ok(())
}
