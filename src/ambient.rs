//! Ambient signal monitor: polls a boolean OS flag off the link thread.
//!
//! Independent of the [`Coordinator`](crate::app::service::Coordinator):
//! it shares no state with the command pipeline and only reports
//! transitions of a single boolean (e.g. a "do not disturb" focus mode).
//!
//! ```text
//!  SignalSource ──read()──▶ poll thread ──on change──▶ callback
//!                                │
//!                                └──▶ current_state()
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::app::ports::SignalSource;

/// Assertions file written by the OS while a focus mode is active,
/// relative to the user's home directory.
const FOCUS_ASSERTIONS_PATH: &str = "Library/DoNotDisturb/DB/Assertions.json";

// ───────────────────────────────────────────────────────────────
// File heuristic
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AssertionsFile {
    #[serde(default)]
    data: Vec<AssertionStore>,
}

#[derive(Deserialize)]
struct AssertionStore {
    #[serde(default, rename = "storeAssertionRecords")]
    records: Vec<serde_json::Value>,
}

/// `true` when any store in the file holds at least one assertion record.
fn parse_assertions(bytes: &[u8]) -> anyhow::Result<bool> {
    let file: AssertionsFile =
        serde_json::from_slice(bytes).context("malformed assertions file")?;
    Ok(file.data.iter().any(|store| !store.records.is_empty()))
}

/// Reads the focus-mode assertions file.  A missing file means "off".
pub struct FocusFileSource {
    path: PathBuf,
}

impl FocusFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The per-user assertions file, if `$HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| Path::new(&home).join(FOCUS_ASSERTIONS_PATH))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for FocusFileSource {
    fn read(&mut self) -> anyhow::Result<bool> {
        match fs::read(&self.path) {
            Ok(bytes) => parse_assertions(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Monitor
// ───────────────────────────────────────────────────────────────

type ChangeCallback = Box<dyn FnMut(bool) + Send + 'static>;

struct Shared {
    state: AtomicBool,
    running: AtomicBool,
    on_change: Mutex<Option<ChangeCallback>>,
}

impl Shared {
    fn notify(&self, value: bool) {
        match self.on_change.lock() {
            Ok(mut guard) => {
                if let Some(cb) = guard.as_mut() {
                    cb(value);
                }
            }
            Err(_) => warn!("Ambient callback lock poisoned, change dropped"),
        }
    }
}

/// Polls a [`SignalSource`] on a background thread and reports transitions.
pub struct AmbientMonitor {
    shared: Arc<Shared>,
    source: Option<Box<dyn SignalSource>>,
    interval: Duration,
    worker: Option<JoinHandle<Box<dyn SignalSource>>>,
}

impl AmbientMonitor {
    pub fn new(source: impl SignalSource + 'static, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicBool::new(false),
                running: AtomicBool::new(false),
                on_change: Mutex::new(None),
            }),
            source: Some(Box::new(source)),
            interval,
            worker: None,
        }
    }

    /// Register the transition callback, replacing any previous one.
    pub fn on_change(&self, callback: impl FnMut(bool) + Send + 'static) {
        match self.shared.on_change.lock() {
            Ok(mut guard) => *guard = Some(Box::new(callback)),
            Err(_) => warn!("Ambient callback lock poisoned, callback not registered"),
        }
    }

    /// Last observed value.
    pub fn current_state(&self) -> bool {
        self.shared.state.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Read once synchronously, then keep polling in the background.
    ///
    /// Calling `start` on a running monitor does nothing.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let Some(mut source) = self.source.take() else {
            anyhow::bail!("ambient source lost by a previous worker");
        };

        match source.read() {
            Ok(value) => self.shared.state.store(value, Ordering::Release),
            Err(e) => warn!("Ambient initial read failed: {:#}", e),
        }
        self.shared.running.store(true, Ordering::Release);

        let shared = self.shared.clone();
        let interval = self.interval;
        let worker = std::thread::Builder::new()
            .name("ambient".into())
            .spawn(move || {
                poll_loop(source.as_mut(), &shared, interval);
                source
            })
            .context("spawning ambient monitor thread")?;
        self.worker = Some(worker);
        info!(
            "Ambient monitor started (state={}, every {:?})",
            self.current_state(),
            interval
        );
        Ok(())
    }

    /// Stop polling and join the thread.  Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        worker.thread().unpark();
        match worker.join() {
            Ok(source) => self.source = Some(source),
            Err(_) => warn!("Ambient monitor thread panicked"),
        }
        info!("Ambient monitor stopped");
    }
}

impl Drop for AmbientMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(source: &mut dyn SignalSource, shared: &Shared, interval: Duration) {
    loop {
        std::thread::park_timeout(interval);
        if !shared.running.load(Ordering::Acquire) {
            return;
        }
        let value = match source.read() {
            Ok(v) => v,
            Err(e) => {
                warn!("Ambient read failed, keeping previous value: {:#}", e);
                continue;
            }
        };
        let previous = shared.state.swap(value, Ordering::AcqRel);
        if previous != value {
            info!("Ambient signal changed: {} -> {}", previous, value);
            shared.notify(value);
        } else {
            debug!("Ambient signal unchanged ({})", value);
        }
    }
}
