//! clawscope - live telemetry server for OpenClaw agents
//!
//! Watches the OpenClaw runtime's files and pushes telemetry snapshots to
//! dashboard clients over WebSocket.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/clawscope/clawscope.log (~/.local/state/clawscope/clawscope.log)
//! - Config: $XDG_CONFIG_HOME/clawscope/config.toml (~/.config/clawscope/config.toml)

mod server;

use anyhow::{Context, Result};
use clap::Parser;
use clawscope_core::watcher::{watch_dirs, FileWatcher, HandoffOutcome, LoopHandoff};
use clawscope_core::{BroadcastHub, Config, SnapshotAssembler, SnapshotSource};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clawscope")]
#[command(about = "Live telemetry server for OpenClaw agents")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/clawscope/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.addr`
    #[arg(long)]
    addr: Option<String>,

    /// OpenClaw root, overrides `openclaw.root`
    #[arg(long)]
    root: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print one snapshot as JSON and exit
    #[arg(long)]
    snapshot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    if let Some(root) = args.root {
        config.openclaw.root = root;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    let _log_guard = clawscope_core::logging::init(&config.logging, args.verbose)
        .context("failed to initialize logging")?;

    if args.snapshot {
        let assembler = SnapshotAssembler::new(&config);
        let snapshot = tokio::task::spawn_blocking(move || assembler.assemble())
            .await
            .context("snapshot assembly failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("failed to encode snapshot")?
        );
        return Ok(());
    }

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.addr))?;

    let assembler = Arc::new(SnapshotAssembler::new(&config));
    let hub = BroadcastHub::new(assembler.clone(), &config.hub);

    // Watcher thread → event loop: the only cross-thread hand-off
    let (handoff, refreshes) = LoopHandoff::channel(config.watcher.handoff_timeout());
    let refresh_hub = Arc::clone(&hub);
    let refresh_task = tokio::spawn(refreshes.serve(move || {
        let hub = Arc::clone(&refresh_hub);
        async move {
            let delivered = hub.broadcast_full_state().await;
            tracing::debug!(delivered, "Refresh broadcast");
        }
    }));

    let dirs = watch_dirs(assembler.paths(), &assembler.roster());
    let on_change = move || match handoff.submit() {
        Ok(HandoffOutcome::Completed) => {}
        Ok(HandoffOutcome::Coalesced) => tracing::trace!("Refresh coalesced"),
        Err(e) => tracing::warn!(error = %e, "Refresh hand-off failed"),
    };
    let watcher = match FileWatcher::start(&dirs, &config.watcher, on_change) {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!(error = %e, "File watcher unavailable, relying on heartbeat");
            None
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %addr,
        root = %config.openclaw.root.display(),
        watched = watcher.as_ref().map_or(0, FileWatcher::watched),
        "clawscope listening"
    );

    let app = server::router(server::AppState {
        hub: Arc::clone(&hub),
        assembler,
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .context("server error")?;

    hub.shutdown();
    if let Some(watcher) = watcher {
        tokio::task::spawn_blocking(move || watcher.stop())
            .await
            .context("failed to stop file watcher")?;
    }
    refresh_task.abort();

    tracing::info!("clawscope stopped");
    Ok(())
}
