mod background;
mod handlers;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

#[cfg(not(target_os = "linux"))]
use hostglow_core::collector::mock::{MockCommand, MockFs};
#[cfg(target_os = "linux")]
use hostglow_core::collector::{RealCommand, RealFs};
use hostglow_core::collector::{SharedReader, build_readers};
use hostglow_core::config::{AgentConfig, GpuType, HostType};
use hostglow_core::rates::RateConverter;
use hostglow_core::registry::MetricRegistry;
use hostglow_core::sampler::Pipeline;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "hostglow", about = "host metrics agent with Prometheus exposition", version = hostglow_core::VERSION)]
struct Args {
    /// Listen address for the exposition endpoint.
    #[arg(long, default_value = "0.0.0.0:9105", env = "HOSTGLOW_LISTEN")]
    listen: String,

    /// Sampling interval in seconds.
    #[arg(long, default_value = "10", env = "HOSTGLOW_INTERVAL")]
    interval: u64,

    /// Per-reader timeout in seconds.
    #[arg(long, default_value = "5", env = "HOSTGLOW_READER_TIMEOUT")]
    reader_timeout: u64,

    /// Host type: generic or raspberrypi (selects the CPU thermal zone).
    #[arg(long, default_value = "generic", env = "HOSTGLOW_HOST_TYPE")]
    host_type: String,

    /// GPU type: none, nvidia or amd.
    #[arg(long, default_value = "none", env = "HOSTGLOW_GPU_TYPE")]
    gpu_type: String,

    /// Substring filter on network interface names.
    /// If not specified, all interfaces are collected.
    #[arg(long, env = "HOSTGLOW_INTERFACE_FILTER")]
    interface_filter: Option<String>,

    /// Cycles a vanished interface or device keeps its rate state.
    #[arg(long, default_value = "5", env = "HOSTGLOW_STALE_CYCLES")]
    stale_cycles: u64,

    /// Path to /proc filesystem.
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to /sys filesystem.
    #[arg(long, default_value = "/sys")]
    sys_path: String,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostglow=info".parse().unwrap()),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    let host_type: HostType = match args.host_type.parse() {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "invalid --host-type");
            process::exit(1);
        }
    };
    let gpu_type: GpuType = match args.gpu_type.parse() {
        Ok(g) => g,
        Err(e) => {
            error!(error = %e, "invalid --gpu-type");
            process::exit(1);
        }
    };
    if let Err(e) = hostglow_core::config::validate_timing(args.interval, args.reader_timeout) {
        error!(error = %e, "invalid timing configuration");
        process::exit(1);
    }

    let cfg = AgentConfig {
        proc_path: args.proc_path.clone(),
        sys_path: args.sys_path.clone(),
        net_interface_filter: args.interface_filter.clone(),
        host_type,
        gpu_type,
        interval: Duration::from_secs(args.interval),
        stale_cycles: args.stale_cycles,
    };

    info!(
        version = hostglow_core::VERSION,
        host_type = %host_type,
        gpu_type = %gpu_type,
        interval_s = args.interval,
        "starting"
    );

    let readers = match create_readers(&cfg) {
        Ok(readers) => readers,
        Err(e) => {
            error!(error = %e, "sensor resolution failed");
            process::exit(1);
        }
    };

    let registry = Arc::new(MetricRegistry::new());
    let converter = RateConverter::new(cfg.stale_cycles, cfg.max_rate_dt_secs());
    let pipeline = Pipeline::new(converter, Arc::clone(&registry));

    let interval = cfg.interval;
    let reader_timeout = Duration::from_secs(args.reader_timeout);
    tokio::spawn(async move {
        background::sample_loop(readers, pipeline, interval, reader_timeout).await;
    });

    let app = Router::new()
        .route("/metrics", get(handlers::handle_metrics))
        .route("/api/v1/health", get(handlers::handle_health))
        .with_state(registry)
        .layer(CompressionLayer::new());

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

fn create_readers(cfg: &AgentConfig) -> Result<Vec<SharedReader>, hostglow_core::config::ConfigError> {
    #[cfg(target_os = "linux")]
    {
        build_readers(RealFs::new(), RealCommand::new(), cfg)
    }
    #[cfg(not(target_os = "linux"))]
    {
        build_readers(MockFs::typical_system(), MockCommand::new(), cfg)
    }
}
