//! Inbound commands to the coordinator.
//!
//! These represent actions requested by the application layer (UI button,
//! hotkey, CLI) that the [`Coordinator`](super::service::Coordinator)
//! interprets and acts upon.

use core::fmt;

use crate::error::CommandResult;

/// Caller-supplied completion callback.
pub type CommandCallback = Box<dyn FnOnce(CommandResult) + Send + 'static>;

/// Commands that external adapters can send into the application core.
pub enum AppCommand {
    /// Send the toggle command to the peer, connecting first if needed.
    TriggerCommand(CommandCallback),

    /// Scan for the peer and bring the link up without sending anything.
    StartScan,

    /// Stop an active scan.  Fails a pending command with `Cancelled`.
    StopScan { reason: Option<String> },

    /// Drop the link to the current peer.  Fails a pending command with `Cancelled`.
    Disconnect,
}

impl fmt::Debug for AppCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TriggerCommand(_) => write!(f, "TriggerCommand(..)"),
            Self::StartScan => write!(f, "StartScan"),
            Self::StopScan { reason } => write!(f, "StopScan({reason:?})"),
            Self::Disconnect => write!(f, "Disconnect"),
        }
    }
}

/// The single in-flight caller request.
///
/// Resolving consumes the value, so a pending command can be completed
/// at most once.
pub struct PendingCommand {
    callback: CommandCallback,
}

impl PendingCommand {
    pub fn new(callback: CommandCallback) -> Self {
        Self { callback }
    }

    pub fn resolve(self, result: CommandResult) {
        (self.callback)(result);
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingCommand")
    }
}
