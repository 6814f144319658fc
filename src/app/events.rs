//! Inbound transport events and outbound application events.
//!
//! [`LinkEvent`]s are produced by a [`TransportPort`](super::ports::TransportPort)
//! adapter, marshalled onto the coordinator's serialized context and fed to
//! [`Coordinator::handle_event`](super::service::Coordinator::handle_event).
//!
//! [`AppEvent`]s flow the other way: the coordinator emits them through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them (log lines, UI refresh, alerts).

use crate::error::{CommandError, TransportError};
use crate::fsm::StateId;
use crate::session::{PeerHandle, SessionSnapshot};

/// Upper bound on attributes reported by one discovery round.
pub const MAX_DISCOVERED: usize = 16;

/// Discovered service or characteristic UUIDs.
pub type UuidList = heapless::Vec<u128, MAX_DISCOVERED>;

// ───────────────────────────────────────────────────────────────
// Radio power
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Unknown,
    Off,
    On,
    Unauthorized,
    Unsupported,
    Resetting,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound: transport → coordinator
// ───────────────────────────────────────────────────────────────

/// Asynchronous results reported by the radio stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    PowerChanged(PowerState),
    PeerDiscovered(PeerHandle),
    Connected(PeerHandle),
    ConnectFailed {
        peer: PeerHandle,
        reason: TransportError,
    },
    ServicesFound {
        peer: PeerHandle,
        services: UuidList,
    },
    ServiceDiscoveryFailed {
        peer: PeerHandle,
        reason: TransportError,
    },
    EndpointsFound {
        peer: PeerHandle,
        service: u128,
        characteristics: UuidList,
    },
    EndpointDiscoveryFailed {
        peer: PeerHandle,
        reason: TransportError,
    },
    WriteAcked(PeerHandle),
    WriteFailed {
        peer: PeerHandle,
        reason: TransportError,
    },
    Disconnected {
        peer: PeerHandle,
        reason: Option<TransportError>,
    },
}

impl LinkEvent {
    /// The peer this event is about, if any.
    pub fn peer(&self) -> Option<PeerHandle> {
        match self {
            Self::PowerChanged(_) => None,
            Self::PeerDiscovered(p) | Self::Connected(p) | Self::WriteAcked(p) => Some(*p),
            Self::ConnectFailed { peer, .. }
            | Self::ServicesFound { peer, .. }
            | Self::ServiceDiscoveryFailed { peer, .. }
            | Self::EndpointsFound { peer, .. }
            | Self::EndpointDiscoveryFailed { peer, .. }
            | Self::WriteFailed { peer, .. }
            | Self::Disconnected { peer, .. } => Some(*peer),
        }
    }

    /// Short tag for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerChanged(_) => "PowerChanged",
            Self::PeerDiscovered(_) => "PeerDiscovered",
            Self::Connected(_) => "Connected",
            Self::ConnectFailed { .. } => "ConnectFailed",
            Self::ServicesFound { .. } => "ServicesFound",
            Self::ServiceDiscoveryFailed { .. } => "ServiceDiscoveryFailed",
            Self::EndpointsFound { .. } => "EndpointsFound",
            Self::EndpointDiscoveryFailed { .. } => "EndpointDiscoveryFailed",
            Self::WriteAcked(_) => "WriteAcked",
            Self::WriteFailed { .. } => "WriteFailed",
            Self::Disconnected { .. } => "Disconnected",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Outbound: coordinator → observers
// ───────────────────────────────────────────────────────────────

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The coordinator has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// One or more observable session fields changed.
    Snapshot(SessionSnapshot),

    /// The pending command was acknowledged by the peer.
    CommandSucceeded,

    /// The pending command (or a rejected trigger) failed.
    CommandFailed(CommandError),

    /// The ambient signal flipped.
    AmbientChanged(bool),
}
