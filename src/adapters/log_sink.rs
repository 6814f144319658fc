//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (stderr via `env_logger` in the host binary).
//! A UI or notification adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one pipe-separated line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Snapshot(s) => {
                info!(
                    "SNAP | radio={} scanning={} connected={} | status=\"{}\" | error={}",
                    if s.radio_enabled { "on" } else { "off" },
                    s.scanning,
                    s.connected,
                    s.status_text,
                    s.last_error_text().as_deref().unwrap_or("-"),
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::CommandSucceeded => {
                info!("CMD | toggle acknowledged");
            }
            AppEvent::CommandFailed(e) => {
                warn!("CMD | failed ({:?}): {}", e, e);
            }
            AppEvent::AmbientChanged(active) => {
                info!("AMBIENT | focus={}", if *active { "on" } else { "off" });
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
        }
    }
}
