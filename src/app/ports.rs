//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Coordinator (domain)
//! ```
//!
//! Driven adapters (radio stack, timers, observers, storage) implement these
//! traits.  The [`Coordinator`](super::service::Coordinator) consumes them via
//! generics, so the domain core never touches a radio directly.
//!
//! Every [`TransportPort`] call is fire-and-forget: the outcome comes back
//! later as a [`LinkEvent`](super::events::LinkEvent) on the coordinator's
//! serialized context, never as a return value.

use std::time::Duration;

use crate::config::LinkConfig;
use crate::error::ConfigError;
use crate::fsm::context::DeadlineToken;
use crate::session::{PeerHandle, WriteTarget};

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → radio stack)
// ───────────────────────────────────────────────────────────────

/// Radio operations requested by the coordinator.
///
/// `stop_scan` with no scan running and `disconnect` of an unknown peer
/// must be harmless no-ops in every implementation.
pub trait TransportPort {
    /// Start scanning, reporting only peers that advertise `service_filter`.
    fn start_scan(&mut self, service_filter: u128);

    fn stop_scan(&mut self);

    fn connect(&mut self, peer: PeerHandle);

    fn disconnect(&mut self, peer: PeerHandle);

    fn discover_services(&mut self, peer: PeerHandle, filter: u128);

    fn discover_endpoints(&mut self, peer: PeerHandle, service: u128, filter: u128);

    /// Write `payload` with response; the ack arrives as `WriteAcked`.
    fn write(&mut self, peer: PeerHandle, target: WriteTarget, payload: &[u8]);
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain → deadline clock)
// ───────────────────────────────────────────────────────────────

/// One-shot deadline used for the scan timeout.
///
/// When the deadline elapses the owner delivers `token` back through
/// [`Coordinator::on_scan_deadline`](super::service::Coordinator::on_scan_deadline).
/// A token delivered after it was disarmed is ignored by the coordinator,
/// so implementations need not race to cancel.
pub trait TimerPort {
    fn arm(&mut self, token: DeadlineToken, after: Duration);

    fn disarm(&mut self, token: DeadlineToken);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → observers)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists link configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Returns [`LinkConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<LinkConfig, ConfigError>;

    fn save(&self, config: &LinkConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Ambient signal source (driven adapter: OS state → monitor)
// ───────────────────────────────────────────────────────────────

/// Boolean oracle polled by the [`AmbientMonitor`](crate::ambient::AmbientMonitor).
pub trait SignalSource: Send {
    fn read(&mut self) -> anyhow::Result<bool>;
}
