//! PeerLink host entry point.
//!
//! Wires the coordinator to a simulated radio and runs one toggle round.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimTransport      LogEventSink   FileConfigAdapter            │
//! │  (TransportPort)   (EventSink)    (ConfigPort)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            Coordinator (pure logic)                    │    │
//! │  │  FSM · Session · Pending command                       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  LinkRuntime (serialized inbox + scan deadline)                │
//! │  AmbientMonitor (independent poll thread)                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{info, warn};

use peerlink::adapters::file_config::FileConfigAdapter;
use peerlink::adapters::log_sink::LogEventSink;
use peerlink::adapters::sim::{SimScript, SimTransport};
use peerlink::ambient::{AmbientMonitor, FocusFileSource};
use peerlink::app::events::{AppEvent, PowerState};
use peerlink::app::ports::{ConfigPort, EventSink};
use peerlink::runtime::{LinkHandle, LinkRuntime};

const DEFAULT_CONFIG_PATH: &str = "peerlink.json";

/// Extra wait on top of the scan deadline for connect/discover/write.
const PIPELINE_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  PeerLink v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config (or defaults) ──────────────────────────
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let config = FileConfigAdapter::new(&path)
        .load()
        .with_context(|| format!("loading config from {path}"))?;
    info!(
        "Config: scan_timeout={}ms token={:?} ambient={:?}",
        config.scan_timeout_ms, config.command_token, config.ambient_path
    );

    // ── 3. Ambient monitor (optional) ─────────────────────────
    let ambient_path = config
        .ambient_path
        .clone()
        .or_else(FocusFileSource::default_path);
    let mut ambient = ambient_path.map(|p| {
        let monitor = AmbientMonitor::new(FocusFileSource::new(p), config.ambient_poll_interval());
        monitor.on_change(|active| LogEventSink::new().emit(&AppEvent::AmbientChanged(active)));
        monitor
    });
    if let Some(monitor) = ambient.as_mut() {
        if let Err(e) = monitor.start() {
            warn!("Ambient monitor unavailable: {:#}", e);
        }
    }

    // ── 4. Runtime on its own thread ──────────────────────────
    let handle = LinkHandle::new();
    let transport = SimTransport::new(handle.clone(), SimScript::default());
    let wait = config.scan_timeout() + PIPELINE_GRACE;
    let mut runtime = LinkRuntime::new(config, &handle, transport, LogEventSink::new());
    let worker = std::thread::Builder::new()
        .name("link".into())
        .spawn(move || runtime.run_blocking(PowerState::On))
        .context("spawning link runtime")?;

    // ── 5. Two toggles: the first connects, the second reuses the link ──
    let mut failures = 0;
    for round in 1..=2 {
        let (tx, rx) = mpsc::channel();
        handle.trigger_command(move |result| {
            let _ = tx.send(result);
        });
        match rx.recv_timeout(wait) {
            Ok(Ok(())) => info!("Toggle #{} sent", round),
            Ok(Err(e)) => {
                warn!("Toggle #{} failed: {}", round, e);
                failures += 1;
            }
            Err(_) => {
                warn!("Toggle #{} got no answer within {:?}", round, wait);
                failures += 1;
            }
        }
    }

    // ── 6. Teardown ───────────────────────────────────────────
    handle.disconnect();
    handle.shutdown();
    if worker.join().is_err() {
        bail!("link runtime panicked");
    }
    if let Some(monitor) = ambient.as_mut() {
        info!("Ambient focus at exit: {}", monitor.current_state());
        monitor.stop();
    }

    if failures > 0 {
        bail!("{failures} toggle(s) failed");
    }
    Ok(())
}
