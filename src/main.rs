//! CuckooCache Node
//!
//! Runs either a cache worker or the routing orchestrator.
//!
//! ```text
//! cuckoocache worker       --listen 127.0.0.1:7101 --capacity 100000
//! cuckoocache orchestrator --listen 127.0.0.1:7000 --workers a:7101,b:7102
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cuckoocache::metrics::{self, Role};
use cuckoocache::partition::{PartitionStrategy, DEFAULT_VNODES};
use cuckoocache::proto::{FrameLimits, DEFAULT_MAX_KEY_BYTES, DEFAULT_MAX_VALUE_BYTES};
use cuckoocache::store::DEFAULT_CAPACITY;
use cuckoocache::{Orchestrator, OrchestratorConfig, Worker, WorkerConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// CuckooCache - distributed replicated in-memory cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    /// Serve /metrics and /healthz on this address
    #[arg(long, global = true, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a cache worker
    Worker(WorkerArgs),
    /// Run the request orchestrator
    Orchestrator(OrchestratorArgs),
}

/// Frame size limits shared by both roles
#[derive(Args, Debug)]
struct LimitArgs {
    /// Maximum key length in bytes
    #[arg(long, env = "MAX_KEY", default_value_t = DEFAULT_MAX_KEY_BYTES)]
    max_key: u16,

    /// Maximum value length in bytes
    #[arg(long, env = "MAX_VALUE", default_value_t = DEFAULT_MAX_VALUE_BYTES)]
    max_value: u32,
}

impl LimitArgs {
    fn limits(&self) -> FrameLimits {
        FrameLimits::new(self.max_key, self.max_value)
    }
}

#[derive(Args, Debug)]
struct WorkerArgs {
    /// Listen address
    #[arg(long, env = "WORKER_LISTEN", default_value = "127.0.0.1:7101")]
    listen: String,

    /// Cache capacity in entries
    #[arg(long, env = "WORKER_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Idle connection timeout in milliseconds
    #[arg(long, env = "IDLE_MS", default_value = "60000")]
    idle_ms: u64,

    #[command(flatten)]
    limits: LimitArgs,
}

#[derive(Args, Debug)]
struct OrchestratorArgs {
    /// Listen address
    #[arg(long, env = "ORCH_LISTEN", default_value = "127.0.0.1:7000")]
    listen: String,

    /// Comma separated worker addresses
    #[arg(
        long,
        env = "ORCH_WORKERS",
        value_delimiter = ',',
        default_value = "127.0.0.1:7101,127.0.0.1:7102"
    )]
    workers: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "REQUEST_MS", default_value = "300")]
    request_ms: u64,

    /// Idle connection timeout in milliseconds
    #[arg(long, env = "IDLE_MS", default_value = "60000")]
    idle_ms: u64,

    /// Partitioning strategy
    #[arg(long, env = "PARTITIONER", value_enum, default_value_t = PartitionStrategy::Modulo)]
    partitioner: PartitionStrategy,

    /// Ring points per worker (consistent-ring only, 0 = default)
    #[arg(long, env = "VNODES", default_value_t = DEFAULT_VNODES)]
    vnodes: usize,

    #[command(flatten)]
    limits: LimitArgs,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    match cli.command {
        Command::Worker(args) => {
            spawn_metrics_server(cli.metrics_addr, Role::Worker);
            run_worker(args).await
        }
        Command::Orchestrator(args) => {
            spawn_metrics_server(cli.metrics_addr, Role::Orchestrator);
            run_orchestrator(args).await
        }
    }
}

async fn run_worker(args: WorkerArgs) -> anyhow::Result<()> {
    let config = WorkerConfig {
        listen_addr: args.listen,
        capacity: args.capacity,
        idle_timeout: Duration::from_millis(args.idle_ms),
        limits: args.limits.limits(),
    };

    info!("Starting CuckooCache worker");
    info!("  Listen: {}", config.listen_addr);
    info!("  Capacity: {} entries", config.capacity);

    let worker = Worker::new(config).context("invalid worker configuration")?;
    worker.run(shutdown_signal()).await?;

    info!("Worker shutdown complete");
    Ok(())
}

async fn run_orchestrator(args: OrchestratorArgs) -> anyhow::Result<()> {
    let config = OrchestratorConfig {
        listen_addr: args.listen,
        workers: args.workers,
        request_timeout: Duration::from_millis(args.request_ms),
        idle_timeout: Duration::from_millis(args.idle_ms),
        limits: args.limits.limits(),
        strategy: args.partitioner,
        vnodes: args.vnodes,
    };

    info!("Starting CuckooCache orchestrator");
    info!("  Listen: {}", config.listen_addr);
    info!("  Workers: {}", config.workers.join(","));
    info!("  Partitioner: {}", config.strategy);

    let orchestrator =
        Orchestrator::new(config).context("invalid orchestrator configuration")?;
    orchestrator.run(shutdown_signal()).await?;

    info!("Orchestrator shutdown complete");
    Ok(())
}

fn spawn_metrics_server(addr: Option<SocketAddr>, role: Role) {
    let Some(addr) = addr else {
        return;
    };

    tokio::spawn(async move {
        if let Err(e) = metrics::serve(addr, role).await {
            error!("Metrics server error: {}", e);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(cli: &Cli) {
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "hyper=warn".parse() {
        filter = filter.add_directive(directive);
    }

    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
