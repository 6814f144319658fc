//! Error types for the PeerLink command pipeline.
//!
//! Transport adapters report failures as [`TransportError`] tags attached to
//! their events.  The coordinator converts every one of them into a
//! [`CommandError`] at the point of occurrence, so nothing crosses the
//! coordinator boundary except a value handed to the pending caller.
//! All variants are `Copy` so they can be stored in the session snapshot
//! and passed through the FSM without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Command errors (what the caller sees)
// ---------------------------------------------------------------------------

/// Every way a `TriggerCommand` can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandError {
    /// Radio is off, unauthorized, unsupported or resetting.
    RadioUnavailable,
    /// The scan deadline elapsed without the peer showing up.
    DeviceNotFound,
    /// The link could not be established.
    ConnectFailed,
    /// Service discovery failed or the command service is absent.
    ServiceDiscoveryFailed,
    /// Endpoint discovery failed or the write characteristic is absent.
    EndpointDiscoveryFailed,
    /// The peer rejected or never acknowledged the write.
    WriteFailed,
    /// The peer dropped the link mid-pipeline.
    PeerDisconnected,
    /// Another command is still pending.
    CommandBusy,
    /// The command payload could not be built from the configured token.
    EncodingFailed,
    /// The caller stopped the scan or disconnected while the command was pending.
    Cancelled,
    /// The runtime shut down with the command still pending.
    Shutdown,
}

impl CommandError {
    /// Short, human-readable status line shown next to the error.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::RadioUnavailable => "Bluetooth unavailable",
            Self::DeviceNotFound => "Device not found",
            Self::ConnectFailed => "Connection failed",
            Self::ServiceDiscoveryFailed => "Service not found",
            Self::EndpointDiscoveryFailed => "Characteristic not found",
            Self::WriteFailed => "Command failed",
            Self::PeerDisconnected => "Disconnected",
            Self::CommandBusy => "Busy",
            Self::EncodingFailed => "Invalid command",
            Self::Cancelled => "Cancelled",
            Self::Shutdown => "Stopped",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioUnavailable => write!(f, "Bluetooth is not enabled"),
            Self::DeviceNotFound => write!(f, "Device not found (scan timed out)"),
            Self::ConnectFailed => write!(f, "Failed to connect to device"),
            Self::ServiceDiscoveryFailed => write!(f, "Command service not found on device"),
            Self::EndpointDiscoveryFailed => {
                write!(f, "Command characteristic not found on device")
            }
            Self::WriteFailed => write!(f, "Failed to write command"),
            Self::PeerDisconnected => write!(f, "Device disconnected"),
            Self::CommandBusy => write!(f, "A command is already in progress"),
            Self::EncodingFailed => write!(f, "Failed to encode command"),
            Self::Cancelled => write!(f, "Command cancelled"),
            Self::Shutdown => write!(f, "Coordinator shut down"),
        }
    }
}

impl std::error::Error for CommandError {}

/// What every caller callback receives.
pub type CommandResult = core::result::Result<(), CommandError>;

// ---------------------------------------------------------------------------
// Transport errors (what adapters attach to failure events)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The stack gave up waiting for the peer.
    Timeout,
    /// The peer or the stack refused the operation.
    Rejected,
    /// The requested attribute or peer does not exist.
    NotFound,
    /// Any other stack-level I/O failure.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Rejected => write!(f, "rejected"),
            Self::NotFound => write!(f, "not found"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations
/// and [`LinkConfig::validate`](crate::config::LinkConfig::validate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first run).
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    Io,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
