//! End-to-end command scenarios against the mock radio.
//!
//! Each test walks one caller-visible story from `TriggerCommand` to the
//! callback, asserting on the transport requests issued along the way.

use crate::mock_link::{Harness, LinkCall, PEER};

use peerlink::app::events::{AppEvent, LinkEvent, PowerState};
use peerlink::error::{CommandError, TransportError};
use peerlink::fsm::StateId;

// ── Radio off ─────────────────────────────────────────────────

#[test]
fn radio_off_fails_fast_without_scanning() {
    let mut h = Harness::new(PowerState::Off);
    assert_eq!(h.link.state(), StateId::RadioDisabled);

    h.trigger(1);

    let results = h.outcomes.for_id(1);
    assert_eq!(results, vec![Err(CommandError::RadioUnavailable)]);
    assert_eq!(
        results[0].unwrap_err().to_string(),
        "Bluetooth is not enabled"
    );
    assert_eq!(h.io.scans_started(), 0);
    assert!(h.io.calls.is_empty());
    assert!(!h.link.has_pending());
    assert_eq!(h.snapshot().last_error, Some(CommandError::RadioUnavailable));
}

// ── Scan timeout ──────────────────────────────────────────────

#[test]
fn scan_timeout_fails_with_device_not_found() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);

    assert_eq!(h.link.state(), StateId::Scanning);
    assert!(h.snapshot().scanning);
    assert!(h.io.contains(&LinkCall::StartScan(h.link.config().service_uuid)));
    assert!(
        h.io.calls
            .iter()
            .any(|c| matches!(c, LinkCall::Arm(_, d) if *d == h.link.config().scan_timeout()))
    );
    assert!(h.outcomes.for_id(1).is_empty(), "must not resolve early");

    h.fire_deadline();

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::DeviceNotFound)]);
    assert_eq!(h.link.state(), StateId::Idle);
    assert!(!h.snapshot().scanning);
    assert!(h.io.contains(&LinkCall::StopScan));
    assert_eq!(h.snapshot().status_text, "Device not found");
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn full_pipeline_acknowledged_write_succeeds() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.bring_up_link();

    assert_eq!(h.link.state(), StateId::Writing);
    assert_eq!(h.io.writes(), vec![b"TOGGLE".to_vec()]);
    assert!(h.outcomes.for_id(1).is_empty());

    h.event(LinkEvent::WriteAcked(PEER));

    assert_eq!(h.outcomes.for_id(1), vec![Ok(())]);
    assert_eq!(h.link.state(), StateId::Connected);
    let session = h.link.session();
    assert!(session.connected);
    assert!(session.write_target.is_some());
    assert_eq!(session.peer, Some(PEER));
    assert_eq!(h.sink.successes(), 1);
    assert_eq!(h.snapshot().status_text, "Command sent");
    assert_eq!(h.snapshot().last_error, None);
}

#[test]
fn pipeline_requests_follow_handshake_order() {
    let mut h = Harness::new(PowerState::On);
    let svc = h.link.config().service_uuid;
    let chr = h.link.config().write_char_uuid;
    h.trigger(1);
    h.bring_up_link();

    let order: Vec<_> = h
        .io
        .calls
        .iter()
        .filter(|c| !matches!(c, LinkCall::Arm(..) | LinkCall::Disarm(_)))
        .cloned()
        .collect();
    assert_eq!(order[0], LinkCall::StartScan(svc));
    assert_eq!(order[1], LinkCall::StopScan);
    assert_eq!(order[2], LinkCall::Connect(PEER));
    assert_eq!(order[3], LinkCall::DiscoverServices(PEER, svc));
    assert_eq!(order[4], LinkCall::DiscoverEndpoints(PEER, svc, chr));
    assert!(matches!(&order[5], LinkCall::Write(p, t, _) if *p == PEER && t.characteristic == chr));
}

// ── Linked session reuse ──────────────────────────────────────

#[test]
fn second_trigger_on_linked_session_writes_directly() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.bring_up_link();
    h.event(LinkEvent::WriteAcked(PEER));
    h.io.clear();

    h.trigger(2);

    assert_eq!(h.link.state(), StateId::Writing);
    assert_eq!(h.io.scans_started(), 0, "no scan restart");
    assert_eq!(h.io.writes().len(), 1);

    h.event(LinkEvent::WriteAcked(PEER));
    assert_eq!(h.outcomes.for_id(2), vec![Ok(())]);
    assert_eq!(h.outcomes.for_id(1), vec![Ok(())]);
}

// ── Peer loss mid-pipeline ────────────────────────────────────

#[test]
fn disconnect_during_service_discovery_fails_pending() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::Connected(PEER));
    assert_eq!(h.link.state(), StateId::DiscoveringServices);

    h.event(LinkEvent::Disconnected {
        peer: PEER,
        reason: Some(TransportError::Io),
    });

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::PeerDisconnected)]);
    assert_eq!(h.link.state(), StateId::Idle);
    let session = h.link.session();
    assert_eq!(session.peer, None);
    assert!(!session.connected);
    assert!(session.write_target.is_none());
}

// ── Busy rejection ────────────────────────────────────────────

#[test]
fn second_trigger_while_pending_is_rejected_busy() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));

    h.trigger(2);
    assert_eq!(h.outcomes.for_id(2), vec![Err(CommandError::CommandBusy)]);
    assert!(h.outcomes.for_id(1).is_empty());
    assert!(h.link.has_pending());
    assert_eq!(h.link.state(), StateId::Connecting, "session untouched");

    h.event(LinkEvent::Connected(PEER));
    h.services_found();
    h.endpoints_found();
    h.event(LinkEvent::WriteAcked(PEER));

    assert_eq!(h.outcomes.for_id(1), vec![Ok(())]);
    assert_eq!(h.outcomes.for_id(2).len(), 1, "busy caller resolved once");
    assert_eq!(h.io.writes().len(), 1);
    assert!(
        h.sink
            .events
            .contains(&AppEvent::CommandFailed(CommandError::CommandBusy))
    );
}
