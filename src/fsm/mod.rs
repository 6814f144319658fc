//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern, driven by events instead of ticks:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                     │
//! │  ┌─────────────────────┬──────────┬─────────┬─────────────────┐ │
//! │  │ StateId             │ on_enter │ on_exit │ on_event        │ │
//! │  ├─────────────────────┼──────────┼─────────┼─────────────────┤ │
//! │  │ Idle                │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  │ RadioDisabled       │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  │ Scanning            │ fn(ctx)  │ fn(ctx) │ fn(ctx, s)->Opt │ │
//! │  │ Connecting          │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  │ DiscoveringServices │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  │ DiscoveringEndpoint │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  │ Writing             │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  │ Connected           │ fn(ctx)  │    -    │ fn(ctx, s)->Opt │ │
//! │  └─────────────────────┴──────────┴─────────┴─────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each input is offered to `on_event` of the **current** state.  If it
//! returns `Some(next_id)` (and `next_id` differs from the current state),
//! the engine runs `on_exit` for the current state, then `on_enter` for the
//! next.  Handlers never call the radio directly: they queue
//! [`LinkAction`](context::LinkAction)s on the shared
//! [`LinkContext`](context::LinkContext) which the coordinator applies
//! afterwards.

pub mod context;
pub mod states;

use context::LinkContext;
use log::info;

use crate::app::events::LinkEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all coordinator states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    RadioDisabled = 1,
    Scanning = 2,
    Connecting = 3,
    DiscoveringServices = 4,
    DiscoveringEndpoint = 5,
    Writing = 6,
    Connected = 7,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 8;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::RadioDisabled,
            2 => Self::Scanning,
            3 => Self::Connecting,
            4 => Self::DiscoveringServices,
            5 => Self::DiscoveringEndpoint,
            6 => Self::Writing,
            7 => Self::Connected,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stimulus
// ---------------------------------------------------------------------------

/// Everything a state handler can react to.
///
/// Radio power changes, peer loss and caller disconnects are handled by the
/// coordinator as forced transitions and never reach `on_event`.
#[derive(Debug, Clone, Copy)]
pub enum Stimulus<'a> {
    /// A transport event for the peer currently held (or a discovery).
    Link(&'a LinkEvent),
    /// A command was admitted into the pending slot.
    Trigger,
    /// The caller asked for a scan without a command.
    StartScan,
    /// The caller asked to stop scanning.
    StopScan,
    /// The armed scan deadline elapsed.
    ScanDeadline,
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut LinkContext);

/// Signature for the per-input handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateEventFn = fn(&mut LinkContext, Stimulus<'_>) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and threads a mutable [`LinkContext`] through
/// every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Number of transitions taken since construction.
    transitions: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `dispatch()`.
    pub fn start(&mut self, ctx: &mut LinkContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Offer one stimulus to the current state.
    ///
    /// Returns `true` if the FSM moved to a different state.
    pub fn dispatch(&mut self, ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> bool {
        match (self.table[self.current].on_event)(ctx, stimulus) {
            Some(next_id) if next_id as usize != self.current => {
                self.transition(next_id, ctx);
                true
            }
            _ => false,
        }
    }

    /// Force an immediate transition (used by the coordinator for radio
    /// loss, peer loss and caller disconnects).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut LinkContext) -> bool {
        if next as usize == self.current {
            return false;
        }
        self.transition(next, ctx);
        true
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// Human-readable name of the current state.
    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// Transitions taken since construction.
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut LinkContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
