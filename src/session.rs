//! Session state: what the coordinator knows about the peer right now.
//!
//! [`SessionState`] is a pure data holder.  Only FSM handlers mutate it,
//! and only in direct response to transport events.  Every failure path
//! funnels through [`SessionState::clear`] instead of resetting fields
//! one by one.
//!
//! Invariants (checked after every coordinator input):
//!
//! ```text
//!   write_target.is_some()  ⇒  connected  ⇒  peer.is_some()
//!   scanning                ⇒  !connected
//! ```

use core::fmt;

use crate::error::CommandError;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque, adapter-assigned identifier for a discovered peer.
///
/// The adapter may invalidate it on disconnect; the coordinator only ever
/// compares it against incoming events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle(u64);

impl PeerHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{:x}", self.0)
    }
}

/// The negotiated characteristic that accepts the command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTarget {
    pub service: u128,
    pub characteristic: u128,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub radio_enabled: bool,
    pub scanning: bool,
    pub connected: bool,
    pub peer: Option<PeerHandle>,
    pub write_target: Option<WriteTarget>,
    pub status_text: String,
    pub last_error: Option<CommandError>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            radio_enabled: false,
            scanning: false,
            connected: false,
            peer: None,
            write_target: None,
            status_text: "Waiting for Bluetooth".to_owned(),
            last_error: None,
        }
    }
}

impl SessionState {
    /// Drop the peer, its write target and the connected flag.
    pub fn clear(&mut self) {
        self.peer = None;
        self.write_target = None;
        self.connected = false;
    }

    /// Peer is linked and the write target is known.
    pub fn is_ready(&self) -> bool {
        self.connected && self.write_target.is_some()
    }

    pub fn set_status(&mut self, text: &str) {
        if self.status_text != text {
            text.clone_into(&mut self.status_text);
        }
    }

    /// Record a failure in both observable fields.
    pub fn record_error(&mut self, err: CommandError) {
        self.last_error = Some(err);
        self.set_status(err.status_text());
    }

    /// `true` when both session invariants hold.
    pub fn invariants_hold(&self) -> bool {
        let target_implies_link = self.write_target.is_none() || self.connected;
        let link_implies_peer = !self.connected || self.peer.is_some();
        let scan_excludes_link = !self.scanning || !self.connected;
        target_implies_link && link_implies_peer && scan_excludes_link
    }

    /// Read-only view for observers.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            radio_enabled: self.radio_enabled,
            scanning: self.scanning,
            connected: self.connected,
            status_text: self.status_text.clone(),
            last_error: self.last_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Observer view
// ---------------------------------------------------------------------------

/// The observable fields published to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub radio_enabled: bool,
    pub scanning: bool,
    pub connected: bool,
    pub status_text: String,
    pub last_error: Option<CommandError>,
}

impl SessionSnapshot {
    /// Human-readable form of `last_error`.
    pub fn last_error_text(&self) -> Option<String> {
        self.last_error.map(|e| e.to_string())
    }
}
