//! floodctl - control plane for floodnet experiments.
//!
//! `distribute` pushes neighbor tables computed from a topology file into
//! the running instances; `run` additionally waits for readiness and drives
//! gossip rounds. Only configuration and readiness failures reach the exit
//! code; per-target push failures and per-neighbor fan-out misses stay in
//! their layer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flood_control::{
    Distributor, DistributorConfig, Orchestrator, OrchestratorConfig, StaticDirectory,
};
use flood_proto::{NodeId, StdoutSink};
use flood_topology::Topology;

#[derive(Parser)]
#[command(name = "floodctl")]
#[command(about = "Floodnet distribution and test orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DistributeArgs {
    /// Topology JSON file.
    #[arg(long)]
    topology: PathBuf,

    /// Instances JSON file mapping node ids to live addresses.
    #[arg(long)]
    instances: PathBuf,

    /// Maximum push attempts per target.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Initial retry backoff in milliseconds (grows linearly per attempt).
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,

    /// Per-push RPC timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    push_timeout_ms: u64,

    /// Campaign wall-clock deadline in seconds.
    #[arg(long, default_value_t = 3600)]
    deadline_secs: u64,

    /// Concurrent pushes.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Push neighbor tables into all instances.
    Distribute {
        #[command(flatten)]
        args: DistributeArgs,
    },

    /// Wait for readiness, distribute, then drive gossip rounds.
    Run {
        #[command(flatten)]
        args: DistributeArgs,

        /// Number of gossip rounds.
        #[arg(long, default_value_t = 1)]
        rounds: u32,

        /// Initiator node id; random when omitted.
        #[arg(long)]
        initiator: Option<String>,

        /// Delay before each round in seconds.
        #[arg(long, default_value_t = 5)]
        delay_secs: u64,

        /// Per-round acknowledgment timeout in seconds.
        #[arg(long, default_value_t = 300)]
        round_timeout_secs: u64,

        /// Readiness wait budget in seconds.
        #[arg(long, default_value_t = 1000)]
        readiness_timeout_secs: u64,
    },
}

fn distributor_config(args: &DistributeArgs) -> DistributorConfig {
    DistributorConfig {
        max_attempts: args.max_attempts,
        initial_backoff: Duration::from_millis(args.backoff_ms),
        push_timeout: Duration::from_millis(args.push_timeout_ms),
        campaign_deadline: Duration::from_secs(args.deadline_secs),
        concurrency: args.concurrency,
    }
}

async fn distribute(args: &DistributeArgs) -> anyhow::Result<bool> {
    let topology = Topology::from_file(&args.topology)?;
    let directory = StaticDirectory::from_file(&args.instances)?;

    let plan = Distributor::plan(&topology, &directory).await?;
    let distributor = Distributor::over_rpc(distributor_config(args));
    let report = distributor.run(plan).await;

    if report.is_success() {
        info!(
            succeeded = report.succeeded.len(),
            elapsed = ?report.elapsed,
            "all neighbor tables distributed"
        );
    } else {
        warn!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            targets = ?report.failed,
            "distribution completed with failures"
        );
    }
    Ok(report.is_success())
}

async fn run(
    args: &DistributeArgs,
    rounds: u32,
    initiator: Option<String>,
    delay_secs: u64,
    round_timeout_secs: u64,
    readiness_timeout_secs: u64,
) -> anyhow::Result<()> {
    let topology = Topology::from_file(&args.topology)?;
    let directory = StaticDirectory::from_file(&args.instances)?;

    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            rounds,
            gossip_delay: Duration::from_secs(delay_secs),
            round_timeout: Duration::from_secs(round_timeout_secs),
            readiness_timeout: Duration::from_secs(readiness_timeout_secs),
            poll_interval: Duration::from_secs(1),
        },
        Arc::new(StdoutSink::new()),
    );

    orchestrator
        .wait_for_ready(&directory, topology.node_count())
        .await?;

    // A partially-failed distribution is reported but does not abort the
    // run; nodes that missed their push fall back to lazy hydration or sit
    // out the flood, which the event stream makes visible.
    distribute(args).await?;

    let requested = initiator.map(NodeId::from);
    let chosen = orchestrator
        .pick_initiator(&directory, requested.as_ref())
        .await?;
    info!(initiator = %chosen.0, addr = %chosen.1, rounds, "starting gossip rounds");

    let run_id = uuid::Uuid::new_v4().to_string()[..4].to_string();
    let report = orchestrator.run_rounds(chosen, &run_id).await;
    info!(
        completed = report.completed,
        failed = report.failed,
        "rounds session finished"
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Distribute { args } => distribute(&args).await.map(|success| {
            if success {
                info!("platform is ready for testing");
            }
            success
        }),
        Commands::Run {
            args,
            rounds,
            initiator,
            delay_secs,
            round_timeout_secs,
            readiness_timeout_secs,
        } => run(
            &args,
            rounds,
            initiator,
            delay_secs,
            round_timeout_secs,
            readiness_timeout_secs,
        )
        .await
        .map(|()| true),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!(error = %e, "fatal");
            std::process::exit(1);
        }
    }
}
