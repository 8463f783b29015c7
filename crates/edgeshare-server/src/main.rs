//! edgeshare server entry point.
//!
//! Loads the configuration, builds the topology and starts the reactor.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML file, default written on first run
//!  └─ build_topology/settings  -- validated before anything listens
//!  └─ Scheduler + ServerCore   -- single-threaded reactor
//!  └─ background producers
//!       ├─ TCP listener        (tokio task per connection half)
//!       ├─ input forwarding    (std thread)
//!       └─ Ctrl-C              (posts quit)
//! ```
//!
//! The primary screen runs headless: there is no platform capture layer in
//! this crate, so screens are reached through hotkey events only.

use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use edgeshare_server::application::events::Scheduler;
use edgeshare_server::application::server_core::ServerCore;
use edgeshare_server::application::update_layout::{build_settings, build_topology};
use edgeshare_server::infrastructure::input_capture::headless::{HeadlessInput, HeadlessPrimary};
use edgeshare_server::infrastructure::input_capture::{forward_input, InputSource};
use edgeshare_server::infrastructure::network::{bind, listen_addr, spawn_listener, WriterDrain};
use edgeshare_server::infrastructure::storage::config::load_config;

/// How long shutdown waits for goodbye frames to reach the screens.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config_path, config) = load_config().context("loading configuration")?;

    // `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!(config = %config_path.display(), "edgeshare server starting");

    let topology = build_topology(&config).context("invalid screen layout")?;
    let settings = build_settings(&config).context("invalid options")?;
    info!(
        primary = %config.server.name,
        screens = topology.len(),
        "topology loaded"
    );

    let mut sched = Scheduler::new();
    let mut core = ServerCore::new(
        topology,
        &config.server.name,
        Box::new(HeadlessPrimary::new()),
        settings,
    )?;
    ServerCore::install_handlers(&mut sched);

    // ── Network ───────────────────────────────────────────────────────────────
    let addr = listen_addr(&config.server.bind_address, config.server.port)?;
    let listener = bind(addr).await?;
    let writers = WriterDrain::new();
    let accept_task = spawn_listener(listener, sched.sender(), writers.guard());

    // ── Local input ───────────────────────────────────────────────────────────
    let input = HeadlessInput::new();
    let input_thread = match input.start() {
        Ok(rx) => Some(forward_input(rx, sched.sender())),
        Err(e) => {
            warn!(error = %e, "local input unavailable");
            None
        }
    };

    // ── Ctrl-C ────────────────────────────────────────────────────────────────
    let quitter = sched.sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            quitter.quit();
        }
    });

    info!("edgeshare server ready.  Press Ctrl-C to exit.");
    sched.run(&mut core).await;

    core.shutdown();
    accept_task.abort();
    // The listener holds a writer guard until it is gone.
    let _ = accept_task.await;
    input.stop();
    if let Some(handle) = input_thread {
        if handle.join().is_err() {
            warn!("input forwarding thread panicked");
        }
    }

    // Connections still queued in the reactor hold sinks of their own.
    drop(sched);
    if !writers.wait(FLUSH_TIMEOUT).await {
        warn!(timeout = ?FLUSH_TIMEOUT, "some screens did not receive the goodbye message");
    }
    info!("edgeshare server stopped");
    Ok(())
}
