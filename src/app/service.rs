//! Command coordinator, the hexagonal core.
//!
//! [`Coordinator`] owns the FSM, the shared [`LinkContext`] and the single
//! pending-command slot.  It exposes a radio-agnostic API; all I/O flows
//! through port traits injected at call sites, so the whole pipeline is
//! testable with mock adapters.
//!
//! ```text
//!   LinkEvent ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  AppCommand ──▶ │         Coordinator          │
//!                 │  FSM · Session · Pending slot│ ──▶ TransportPort
//!  deadline   ──▶ └──────────────────────────────┘ ──▶ TimerPort
//! ```
//!
//! Every public input method runs to completion on the caller's context and
//! never blocks.  The caller is expected to serialize inputs (see
//! [`crate::runtime`]); nothing in here is shared across threads.

use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{CommandError, CommandResult};
use crate::fsm::context::{DeadlineToken, LinkAction, LinkContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId, Stimulus};
use crate::session::{SessionSnapshot, SessionState};

use super::commands::{AppCommand, CommandCallback, PendingCommand};
use super::events::{AppEvent, LinkEvent, PowerState};
use super::ports::{EventSink, TimerPort, TransportPort};

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

/// Orchestrates scan → connect → discover → write for one peer and one
/// pending command at a time.
pub struct Coordinator {
    fsm: Fsm,
    ctx: LinkContext,
    pending: Option<PendingCommand>,
    last_snapshot: Option<SessionSnapshot>,
    accepted: u64,
    resolved: u64,
}

impl Coordinator {
    /// Construct the coordinator from configuration.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: LinkContext::new(config),
            pending: None,
            last_snapshot: None,
            accepted: 0,
            resolved: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM given the radio power state reported at startup.
    ///
    /// `On` and `Unknown` start in `Idle` (only `On` enables the radio);
    /// every other state starts in `RadioDisabled`.
    pub fn start(&mut self, power: PowerState, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        self.ctx.session.radio_enabled = power.is_on();
        match power {
            PowerState::On | PowerState::Unknown => {}
            _ => {
                self.fsm
                    .force_transition(StateId::RadioDisabled, &mut self.ctx);
            }
        }
        // Nothing has touched the radio yet.
        self.ctx.drain_actions();
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!(
            "Coordinator started in {:?} (power={:?})",
            self.fsm.current_state(),
            power
        );
        self.publish_snapshot(sink);
    }

    /// Resolve a pending command with `Shutdown` and release the radio.
    pub fn shutdown(
        &mut self,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        let prev = self.fsm.current_state();
        if self.ctx.command_pending {
            self.ctx.fail(CommandError::Shutdown);
        }
        if prev != StateId::RadioDisabled {
            self.fsm.force_transition(StateId::Idle, &mut self.ctx);
        }
        info!("Coordinator shutting down from {:?}", prev);
        self.finish(prev, io, sink);
    }

    // ── Inbound commands ──────────────────────────────────────

    /// Route an [`AppCommand`] to the matching input method.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::TriggerCommand(callback) => self.trigger_command(callback, io, sink),
            AppCommand::StartScan => self.start_scan(io, sink),
            AppCommand::StopScan { reason } => self.stop_scan(reason.as_deref(), io, sink),
            AppCommand::Disconnect => self.disconnect(io, sink),
        }
    }

    /// Send the toggle command, connecting first if needed.
    ///
    /// Returns immediately.  `callback` is invoked exactly once: right away
    /// with `RadioUnavailable` or `CommandBusy`, otherwise when the pipeline
    /// reaches a terminal event.
    pub fn trigger_command(
        &mut self,
        callback: CommandCallback,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        if !self.ctx.session.radio_enabled {
            warn!("Command rejected: radio unavailable");
            self.ctx.session.record_error(CommandError::RadioUnavailable);
            sink.emit(&AppEvent::CommandFailed(CommandError::RadioUnavailable));
            callback(Err(CommandError::RadioUnavailable));
            self.publish_snapshot(sink);
            return;
        }
        if self.pending.is_some() {
            // The first caller keeps the slot and will be resolved normally.
            warn!("Command rejected: another command is pending");
            sink.emit(&AppEvent::CommandFailed(CommandError::CommandBusy));
            callback(Err(CommandError::CommandBusy));
            return;
        }

        let prev = self.fsm.current_state();
        self.pending = Some(PendingCommand::new(callback));
        self.ctx.command_pending = true;
        self.accepted += 1;
        info!("Command accepted in {}", self.fsm.current_name());

        self.fsm.dispatch(&mut self.ctx, Stimulus::Trigger);
        self.finish(prev, io, sink);
    }

    /// Scan for the peer and bring the link up without sending anything.
    pub fn start_scan(
        &mut self,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        if !self.ctx.session.radio_enabled {
            warn!("Scan request ignored: radio unavailable");
            return;
        }
        let prev = self.fsm.current_state();
        self.fsm.dispatch(&mut self.ctx, Stimulus::StartScan);
        self.finish(prev, io, sink);
    }

    /// Stop an active scan.  No-op when not scanning.
    pub fn stop_scan(
        &mut self,
        reason: Option<&str>,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        let prev = self.fsm.current_state();
        if prev != StateId::Scanning {
            debug!("Stop scan ignored in {}", self.fsm.current_name());
            return;
        }
        info!("Stopping scan ({})", reason.unwrap_or("no reason given"));
        let was_pending = self.ctx.command_pending;
        self.fsm.dispatch(&mut self.ctx, Stimulus::StopScan);
        if let (false, Some(text)) = (was_pending, reason) {
            self.ctx.session.set_status(text);
        }
        self.finish(prev, io, sink);
    }

    /// Drop the link to the held peer.  No-op when no peer is held.
    pub fn disconnect(
        &mut self,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        let Some(peer) = self.ctx.session.peer else {
            debug!("Disconnect ignored: no peer held");
            return;
        };
        let prev = self.fsm.current_state();
        info!("Disconnecting from {} in {}", peer, self.fsm.current_name());
        if self.ctx.command_pending {
            self.ctx.fail(CommandError::Cancelled);
        }
        self.fsm.force_transition(StateId::Idle, &mut self.ctx);
        self.ctx.session.set_status("Disconnected");
        self.finish(prev, io, sink);
    }

    // ── Transport events ──────────────────────────────────────

    /// Feed one transport event into the state machine.
    pub fn handle_event(
        &mut self,
        event: &LinkEvent,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        let prev = self.fsm.current_state();
        match event {
            LinkEvent::PowerChanged(power) => self.on_power(*power),
            LinkEvent::Disconnected { peer, reason } => {
                if self.ctx.disconnecting == Some(*peer) {
                    self.ctx.disconnecting = None;
                    debug!("{} disconnect confirmed", peer);
                } else if self.ctx.session.peer == Some(*peer) {
                    warn!(
                        "{} disconnected in {} ({})",
                        peer,
                        self.fsm.current_name(),
                        reason.map_or_else(|| "no reason".to_owned(), |r| r.to_string())
                    );
                    self.ctx.session.clear();
                    self.ctx.fail(CommandError::PeerDisconnected);
                    self.fsm.force_transition(StateId::Idle, &mut self.ctx);
                } else {
                    debug!("Ignoring disconnect of {} (not held)", peer);
                }
            }
            LinkEvent::PeerDiscovered(_) => {
                self.fsm.dispatch(&mut self.ctx, Stimulus::Link(event));
            }
            other => {
                if other.peer() == self.ctx.session.peer {
                    if let LinkEvent::ConnectFailed { reason, .. }
                    | LinkEvent::ServiceDiscoveryFailed { reason, .. }
                    | LinkEvent::EndpointDiscoveryFailed { reason, .. }
                    | LinkEvent::WriteFailed { reason, .. } = other
                    {
                        warn!("{} ({})", other.name(), reason);
                    }
                    self.fsm.dispatch(&mut self.ctx, Stimulus::Link(event));
                } else {
                    debug!("Ignoring stale {} for {:?}", other.name(), other.peer());
                }
            }
        }
        self.finish(prev, io, sink);
    }

    /// Deliver an elapsed scan deadline.  Tokens that are no longer armed
    /// (scan already stopped) are ignored.
    pub fn on_scan_deadline(
        &mut self,
        token: DeadlineToken,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        if !self.ctx.is_armed(token) {
            debug!("Ignoring stale scan deadline #{}", token.raw());
            return;
        }
        let prev = self.fsm.current_state();
        warn!("Scan deadline #{} elapsed", token.raw());
        self.fsm.dispatch(&mut self.ctx, Stimulus::ScanDeadline);
        self.finish(prev, io, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Read-only session view.
    pub fn session(&self) -> &SessionState {
        &self.ctx.session
    }

    /// Observable fields as published to observers.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.ctx.session.snapshot()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Scan deadline currently armed, if scanning.
    pub fn armed_deadline(&self) -> Option<DeadlineToken> {
        self.ctx.armed_deadline()
    }

    /// Commands admitted into the pending slot since startup.
    pub fn accepted_commands(&self) -> u64 {
        self.accepted
    }

    /// Admitted commands whose callback has fired.
    pub fn resolved_commands(&self) -> u64 {
        self.resolved
    }

    pub fn config(&self) -> &LinkConfig {
        &self.ctx.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_power(&mut self, power: PowerState) {
        if power.is_on() {
            if self.ctx.session.radio_enabled {
                return;
            }
            info!("Radio powered on");
            self.ctx.session.radio_enabled = true;
            self.ctx.session.last_error = None;
            if !self.fsm.force_transition(StateId::Idle, &mut self.ctx) {
                self.ctx.session.set_status("Ready");
            }
        } else if self.ctx.session.radio_enabled
            || self.fsm.current_state() != StateId::RadioDisabled
        {
            warn!("Radio unavailable ({:?})", power);
            self.ctx.session.radio_enabled = false;
            if self.ctx.command_pending {
                self.ctx.fail(CommandError::RadioUnavailable);
            }
            self.fsm
                .force_transition(StateId::RadioDisabled, &mut self.ctx);
        }
    }

    /// Apply queued radio actions, resolve the outcome, publish changes.
    fn finish(
        &mut self,
        prev: StateId,
        io: &mut (impl TransportPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        for action in self.ctx.drain_actions() {
            self.apply(action, io);
        }

        let now = self.fsm.current_state();
        if now != prev {
            sink.emit(&AppEvent::StateChanged {
                from: prev,
                to: now,
            });
        }

        if let Some(result) = self.ctx.take_outcome() {
            self.settle(result, sink);
        }

        self.check_invariants();
        self.publish_snapshot(sink);
    }

    /// Translate queued [`LinkAction`]s into port calls.
    fn apply(&self, action: LinkAction, io: &mut (impl TransportPort + TimerPort)) {
        let cfg = &self.ctx.config;
        match action {
            LinkAction::StartScan => io.start_scan(cfg.service_uuid),
            LinkAction::StopScan => io.stop_scan(),
            LinkAction::Connect(peer) => io.connect(peer),
            LinkAction::Disconnect(peer) => io.disconnect(peer),
            LinkAction::DiscoverServices(peer) => io.discover_services(peer, cfg.service_uuid),
            LinkAction::DiscoverEndpoints(peer) => {
                io.discover_endpoints(peer, cfg.service_uuid, cfg.write_char_uuid);
            }
            LinkAction::Write(peer, target, payload) => io.write(peer, target, &payload),
            LinkAction::ArmDeadline(token) => io.arm(token, cfg.scan_timeout()),
            LinkAction::DisarmDeadline(token) => io.disarm(token),
        }
    }

    /// Update the observable fields and hand the result to the waiting caller.
    fn settle(&mut self, result: CommandResult, sink: &mut impl EventSink) {
        match result {
            Ok(()) => {
                self.ctx.session.last_error = None;
                self.ctx.session.set_status("Command sent");
            }
            Err(e) => self.ctx.session.record_error(e),
        }

        let Some(pending) = self.pending.take() else {
            return;
        };
        match result {
            Ok(()) => {
                info!("Command acknowledged by peer");
                sink.emit(&AppEvent::CommandSucceeded);
            }
            Err(e) => {
                warn!("Command failed: {}", e);
                sink.emit(&AppEvent::CommandFailed(e));
            }
        }
        self.resolved += 1;
        pending.resolve(result);
    }

    fn check_invariants(&self) {
        if !self.ctx.session.invariants_hold() {
            warn!(
                "Session invariant violated in {}: {:?}",
                self.fsm.current_name(),
                self.ctx.session
            );
            debug_assert!(false, "session invariant violated");
        }
        debug_assert_eq!(self.pending.is_some(), self.ctx.command_pending);
    }

    fn publish_snapshot(&mut self, sink: &mut impl EventSink) {
        let snap = self.ctx.session.snapshot();
        if self.last_snapshot.as_ref() != Some(&snap) {
            sink.emit(&AppEvent::Snapshot(snap.clone()));
            self.last_snapshot = Some(snap);
        }
    }
}
