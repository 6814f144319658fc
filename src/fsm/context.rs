//! Shared mutable context threaded through every FSM handler.
//!
//! `LinkContext` is the single struct that state handlers read from and
//! write to.  It holds the session state, the configuration, the queue of
//! radio actions the handlers requested, and the outcome slot for the
//! pending command.  The coordinator applies the actions and resolves the
//! outcome once the FSM has settled.

use log::warn;

use crate::config::LinkConfig;
use crate::error::{CommandError, CommandResult};
use crate::protocol::CommandPayload;
use crate::session::{PeerHandle, SessionState, WriteTarget};

/// Most actions a single input can queue (exit + enter of one transition
/// plus a forced cleanup).
const MAX_ACTIONS: usize = 8;

// ---------------------------------------------------------------------------
// Scan deadline token
// ---------------------------------------------------------------------------

/// Identifies one armed scan deadline.
///
/// A fresh token is minted every time scanning starts; only the token that
/// is still armed can end a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadlineToken(u32);

impl DeadlineToken {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Radio actions (written by state handlers; applied by the coordinator)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    StartScan,
    StopScan,
    Connect(PeerHandle),
    Disconnect(PeerHandle),
    DiscoverServices(PeerHandle),
    DiscoverEndpoints(PeerHandle),
    Write(PeerHandle, WriteTarget, CommandPayload),
    ArmDeadline(DeadlineToken),
    DisarmDeadline(DeadlineToken),
}

pub type ActionQueue = heapless::Vec<LinkAction, MAX_ACTIONS>;

// ---------------------------------------------------------------------------
// LinkContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct LinkContext {
    // -- Session --
    /// Observable link state.
    pub session: SessionState,

    // -- Configuration --
    pub config: LinkConfig,

    // -- Command --
    /// A caller is waiting on the outcome of the current pipeline.
    pub command_pending: bool,
    /// Payload encoded for the next `Writing` entry.
    pub outgoing: Option<CommandPayload>,
    outcome: Option<CommandResult>,

    // -- Radio --
    /// Peer we asked the adapter to drop; its `Disconnected` reply is
    /// expected and must not touch a newer session.
    pub disconnecting: Option<PeerHandle>,
    actions: ActionQueue,
    armed_deadline: Option<DeadlineToken>,
    next_token: u32,
}

impl LinkContext {
    /// Create a new context with the given configuration.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            session: SessionState::default(),
            config,
            command_pending: false,
            outgoing: None,
            outcome: None,
            disconnecting: None,
            actions: ActionQueue::new(),
            armed_deadline: None,
            next_token: 0,
        }
    }

    /// Queue a radio action for the coordinator to apply.
    pub fn push(&mut self, action: LinkAction) {
        if let LinkAction::Disconnect(peer) = action {
            self.disconnecting = Some(peer);
        }
        if let Err(dropped) = self.actions.push(action) {
            warn!("Action queue full, dropping {:?}", dropped);
        }
    }

    /// Take every queued action, leaving the queue empty.
    pub fn drain_actions(&mut self) -> ActionQueue {
        core::mem::take(&mut self.actions)
    }

    // -- Outcome ----------------------------------------------------------

    /// Record a pipeline failure.  Resolves the pending command if any.
    pub fn fail(&mut self, err: CommandError) {
        self.settle(Err(err));
    }

    /// Record a successful write acknowledgment.
    pub fn succeed(&mut self) {
        self.settle(Ok(()));
    }

    fn settle(&mut self, result: CommandResult) {
        if self.outcome.is_some() {
            warn!("Outcome already recorded this round, keeping the first");
            return;
        }
        self.outcome = Some(result);
        self.command_pending = false;
    }

    /// Take the outcome recorded during the last input.
    pub fn take_outcome(&mut self) -> Option<CommandResult> {
        self.outcome.take()
    }

    // -- Scan deadline ----------------------------------------------------

    /// Mint a new token and ask the coordinator to arm it.
    pub fn arm_deadline(&mut self) {
        self.next_token = self.next_token.wrapping_add(1);
        let token = DeadlineToken(self.next_token);
        if let Some(stale) = self.armed_deadline.replace(token) {
            self.push(LinkAction::DisarmDeadline(stale));
        }
        self.push(LinkAction::ArmDeadline(token));
    }

    /// Invalidate the armed token, if any.
    pub fn disarm_deadline(&mut self) {
        if let Some(token) = self.armed_deadline.take() {
            self.push(LinkAction::DisarmDeadline(token));
        }
    }

    /// `true` only for the token armed by the current scan.
    pub fn is_armed(&self, token: DeadlineToken) -> bool {
        self.armed_deadline == Some(token)
    }

    pub fn armed_deadline(&self) -> Option<DeadlineToken> {
        self.armed_deadline
    }
}
