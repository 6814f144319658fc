//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers with no closures or dynamic
//! dispatch.  Handlers only touch the [`LinkContext`]; radio work is queued
//! as [`LinkAction`]s.
//!
//! ```text
//!  IDLE ──[trigger/scan]──▶ SCANNING ──[peer]──▶ CONNECTING ──[link up]──▶ DISC_SERVICES
//!   ▲                           │                    │                          │
//!   │◀──────[deadline/stop]─────┘                    │                     [service]
//!   │◀──────────────[connect failed]─────────────────┘                          ▼
//!   │◀──────────────[service/endpoint missing]──────────────────────────── DISC_ENDPOINT
//!   │                                                                           │
//!   │                           ┌─────────[no command pending]──────────────────┤
//!   │                           ▼                                        [command pending]
//!   │                       CONNECTED ──[trigger]──▶ WRITING ◀──────────────────┘
//!   │                           ▲                       │
//!   │                           └───[ack / write fail]──┘
//!
//!  Any state ──[radio lost]──▶ RADIO_DISABLED ──[radio on]──▶ IDLE
//!  Any state ──[peer lost / disconnect]──▶ IDLE
//! ```

use log::debug;

use super::context::{LinkAction, LinkContext};
use super::{StateDescriptor, StateId, Stimulus};
use crate::app::events::LinkEvent;
use crate::error::CommandError;
use crate::protocol;
use crate::session::WriteTarget;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_event: idle_event,
        },
        // Index 1: RadioDisabled
        StateDescriptor {
            id: StateId::RadioDisabled,
            name: "RadioDisabled",
            on_enter: Some(radio_disabled_enter),
            on_exit: None,
            on_event: radio_disabled_event,
        },
        // Index 2: Scanning
        StateDescriptor {
            id: StateId::Scanning,
            name: "Scanning",
            on_enter: Some(scanning_enter),
            on_exit: Some(scanning_exit),
            on_event: scanning_event,
        },
        // Index 3: Connecting
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_event: connecting_event,
        },
        // Index 4: DiscoveringServices
        StateDescriptor {
            id: StateId::DiscoveringServices,
            name: "DiscoveringServices",
            on_enter: Some(discovering_services_enter),
            on_exit: None,
            on_event: discovering_services_event,
        },
        // Index 5: DiscoveringEndpoint
        StateDescriptor {
            id: StateId::DiscoveringEndpoint,
            name: "DiscoveringEndpoint",
            on_enter: Some(discovering_endpoint_enter),
            on_exit: None,
            on_event: discovering_endpoint_event,
        },
        // Index 6: Writing
        StateDescriptor {
            id: StateId::Writing,
            name: "Writing",
            on_enter: Some(writing_enter),
            on_exit: None,
            on_event: writing_event,
        },
        // Index 7: Connected
        StateDescriptor {
            id: StateId::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_exit: None,
            on_event: connected_event,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

fn ignore(state: &str, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Link(ev) => debug!("{}: ignoring {}", state, ev.name()),
        other => debug!("{}: ignoring {:?}", state, other),
    }
    None
}

/// Encode the command and move to `Writing`, or fail and stay linked.
fn begin_write(ctx: &mut LinkContext) -> StateId {
    match protocol::encode_command(&ctx.config.command_token, ctx.config.max_payload_len) {
        Ok(payload) => {
            ctx.outgoing = Some(payload);
            StateId::Writing
        }
        Err(e) => {
            ctx.fail(e);
            StateId::Connected
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut LinkContext) {
    // A half-built link (service or endpoint missing) is torn down here.
    if let Some(peer) = ctx.session.peer {
        ctx.push(LinkAction::Disconnect(peer));
    }
    ctx.session.clear();
    ctx.outgoing = None;
    ctx.session.set_status("Ready");
}

fn idle_event(_ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Trigger | Stimulus::StartScan => Some(StateId::Scanning),
        other => ignore("Idle", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RADIO DISABLED
// ═══════════════════════════════════════════════════════════════════════════

fn radio_disabled_enter(ctx: &mut LinkContext) {
    ctx.session.clear();
    ctx.session.scanning = false;
    ctx.outgoing = None;
    // The adapter drops every link with the radio; no reply will come.
    ctx.disconnecting = None;
    ctx.session.set_status("Bluetooth unavailable");
}

fn radio_disabled_event(_ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    // Power-on is handled by the coordinator as a forced transition.
    ignore("RadioDisabled", stimulus)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCANNING
// ═══════════════════════════════════════════════════════════════════════════

fn scanning_enter(ctx: &mut LinkContext) {
    ctx.session.clear();
    ctx.session.scanning = true;
    ctx.session.last_error = None;
    ctx.session.set_status("Scanning for device");
    ctx.push(LinkAction::StartScan);
    ctx.arm_deadline();
}

fn scanning_exit(ctx: &mut LinkContext) {
    ctx.session.scanning = false;
    ctx.disarm_deadline();
    if ctx.session.radio_enabled {
        ctx.push(LinkAction::StopScan);
    }
}

fn scanning_event(ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Link(LinkEvent::PeerDiscovered(peer)) => {
            ctx.session.peer = Some(*peer);
            Some(StateId::Connecting)
        }
        Stimulus::ScanDeadline => {
            ctx.fail(CommandError::DeviceNotFound);
            Some(StateId::Idle)
        }
        Stimulus::StopScan => {
            if ctx.command_pending {
                ctx.fail(CommandError::Cancelled);
            }
            Some(StateId::Idle)
        }
        // Trigger while a bare scan runs: the command rides the same scan.
        Stimulus::Trigger | Stimulus::StartScan => None,
        other => ignore("Scanning", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut LinkContext) {
    ctx.session.set_status("Connecting");
    if let Some(peer) = ctx.session.peer {
        ctx.push(LinkAction::Connect(peer));
    }
}

fn connecting_event(ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Link(LinkEvent::Connected(_)) => {
            ctx.session.connected = true;
            Some(StateId::DiscoveringServices)
        }
        Stimulus::Link(LinkEvent::ConnectFailed { .. }) => {
            ctx.fail(CommandError::ConnectFailed);
            // Never linked, so there is nothing to tear down.
            ctx.session.peer = None;
            Some(StateId::Idle)
        }
        Stimulus::Trigger | Stimulus::StartScan => None,
        other => ignore("Connecting", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCOVERING SERVICES
// ═══════════════════════════════════════════════════════════════════════════

fn discovering_services_enter(ctx: &mut LinkContext) {
    ctx.session.set_status("Discovering services");
    if let Some(peer) = ctx.session.peer {
        ctx.push(LinkAction::DiscoverServices(peer));
    }
}

fn discovering_services_event(ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Link(LinkEvent::ServicesFound { services, .. }) => {
            if services.contains(&ctx.config.service_uuid) {
                Some(StateId::DiscoveringEndpoint)
            } else {
                ctx.fail(CommandError::ServiceDiscoveryFailed);
                Some(StateId::Idle)
            }
        }
        Stimulus::Link(LinkEvent::ServiceDiscoveryFailed { .. }) => {
            ctx.fail(CommandError::ServiceDiscoveryFailed);
            Some(StateId::Idle)
        }
        Stimulus::Trigger | Stimulus::StartScan => None,
        other => ignore("DiscoveringServices", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCOVERING ENDPOINT
// ═══════════════════════════════════════════════════════════════════════════

fn discovering_endpoint_enter(ctx: &mut LinkContext) {
    ctx.session.set_status("Discovering characteristics");
    if let Some(peer) = ctx.session.peer {
        ctx.push(LinkAction::DiscoverEndpoints(peer));
    }
}

fn discovering_endpoint_event(ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Link(LinkEvent::EndpointsFound {
            service,
            characteristics,
            ..
        }) => {
            let wanted = ctx.config.write_char_uuid;
            if *service != ctx.config.service_uuid || !characteristics.contains(&wanted) {
                ctx.fail(CommandError::EndpointDiscoveryFailed);
                return Some(StateId::Idle);
            }
            ctx.session.write_target = Some(WriteTarget {
                service: *service,
                characteristic: wanted,
            });
            if ctx.command_pending {
                Some(begin_write(ctx))
            } else {
                Some(StateId::Connected)
            }
        }
        Stimulus::Link(LinkEvent::EndpointDiscoveryFailed { .. }) => {
            ctx.fail(CommandError::EndpointDiscoveryFailed);
            Some(StateId::Idle)
        }
        Stimulus::Trigger | Stimulus::StartScan => None,
        other => ignore("DiscoveringEndpoint", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  WRITING
// ═══════════════════════════════════════════════════════════════════════════

fn writing_enter(ctx: &mut LinkContext) {
    ctx.session.last_error = None;
    ctx.session.set_status("Sending command");
    // Writing is only entered through begin_write, after the target is known.
    if let (Some(peer), Some(target), Some(payload)) = (
        ctx.session.peer,
        ctx.session.write_target,
        ctx.outgoing.take(),
    ) {
        ctx.push(LinkAction::Write(peer, target, payload));
    } else {
        debug_assert!(false, "Writing entered without peer, target or payload");
    }
}

fn writing_event(ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Link(LinkEvent::WriteAcked(_)) => {
            ctx.succeed();
            Some(StateId::Connected)
        }
        Stimulus::Link(LinkEvent::WriteFailed { .. }) => {
            ctx.fail(CommandError::WriteFailed);
            Some(StateId::Connected)
        }
        other => ignore("Writing", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut LinkContext) {
    ctx.session.set_status("Connected");
}

fn connected_event(ctx: &mut LinkContext, stimulus: Stimulus<'_>) -> Option<StateId> {
    match stimulus {
        Stimulus::Trigger => Some(begin_write(ctx)),
        other => ignore("Connected", other),
    }
}
