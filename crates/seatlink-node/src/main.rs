//! SeatLink node entry point.
//!
//! Runs one node of a SeatLink pair: it drives the seat attached to this
//! machine, accepts commands from its peer, and can forward the local
//! operator's commands to the peer's seat.
//!
//! # Usage
//!
//! ```text
//! seatlink [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Config file [default: platform config dir]
//!   --session <INDEX>   Initial session: -1 local, 0 remote
//!   --debug-bypass      Continue lifecycle sequences past hardware errors
//! ```
//!
//! | Variable           | Description                     |
//! |--------------------|---------------------------------|
//! | `SEATLINK_CONFIG`  | Config file path                |
//! | `SEATLINK_SESSION` | Initial session index           |
//! | `RUST_LOG`         | Overrides `node.log_level`      |
//!
//! ```text
//! main()
//!  └─ load config
//!  └─ Node::launch()
//!       ├─ ListenerEndpoint   (accepts the peer)
//!       ├─ ClientEndpoint     (reaches the peer on demand)
//!       └─ SessionCoordinator (inbound reader + command worker)
//!  └─ set_session_index(initial)
//!  └─ wait for Ctrl-C, then shut down
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use seatlink_node::infrastructure::hardware::{SimulatedMonitor, SimulatedRig, SimulatedSeatDriver};
use seatlink_node::infrastructure::node::{Node, NodeSettings};
use seatlink_node::infrastructure::storage::config::{load_config, load_config_from, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// SeatLink motion-seat controller node.
#[derive(Debug, Parser)]
#[command(name = "seatlink", about = "Motion-seat controller with a peer command link", version)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// Defaults to `config.toml` in the platform config directory.  A missing
    /// file is not an error; built-in defaults are used.
    #[arg(long, env = "SEATLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Session to select at startup: `-1` drives the local seat, `0` the peer's.
    ///
    /// Overrides `node.initial_session`.
    #[arg(long, env = "SEATLINK_SESSION", allow_hyphen_values = true)]
    session: Option<i32>,

    /// Continue lifecycle sequences past non-zero hardware codes.
    #[arg(long)]
    debug_bypass: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display())),
            None => load_config().context("failed to load config"),
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config.node.log_level);

    let link = config.link_config().context("invalid network configuration")?;
    let settings = NodeSettings {
        link,
        timings: config.settle_timings(),
        seat: config.static_seat_config(),
        debug_bypass: cli.debug_bypass || config.node.debug_bypass,
    };
    if settings.debug_bypass {
        info!("debug bypass enabled: hardware error codes will not halt sequences");
    }

    // No vendor driver is linked; run against the simulated rig.
    let rig = SimulatedRig::new();
    let driver = Box::new(SimulatedSeatDriver::new(rig.clone()));
    let monitor = Arc::new(SimulatedMonitor::new(rig));

    let node = Node::launch(settings, driver, monitor)
        .await
        .with_context(|| format!("failed to open listener on {}", link.listener.bind_addr))?;
    info!(
        "SeatLink node '{}' listening on {}, peer at {}",
        config.node.name, node.local_addr, link.client.remote_addr
    );

    let initial_session = cli.session.unwrap_or(config.node.initial_session);
    node.coordinator.set_session_index(initial_session).await;

    info!("ready.  Press Ctrl-C to exit.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {e}");
    }
    info!("shutdown signal received");

    node.shutdown().await;
    info!("SeatLink node stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
