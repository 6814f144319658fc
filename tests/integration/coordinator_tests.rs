//! Integration tests for the remaining coordinator transitions: radio
//! power changes, caller cancellation, discovery failures and stale events.

use crate::mock_link::{Harness, LinkCall, OTHER_PEER, PEER, uuids};

use peerlink::app::events::{AppEvent, LinkEvent, PowerState};
use peerlink::config::LinkConfig;
use peerlink::error::{CommandError, TransportError};
use peerlink::fsm::StateId;

// ── Idempotence ───────────────────────────────────────────────

#[test]
fn stop_and_disconnect_when_idle_change_nothing() {
    let mut h = Harness::new(PowerState::On);
    let before = h.snapshot();
    h.sink.clear();

    h.stop_scan(None);
    h.disconnect();
    h.stop_scan(Some("again"));
    h.disconnect();

    assert_eq!(h.snapshot(), before);
    assert!(h.io.calls.is_empty());
    assert!(h.sink.events.is_empty());
}

// ── Radio power ───────────────────────────────────────────────

#[test]
fn radio_loss_mid_pipeline_fails_pending_and_disables() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::Connected(PEER));
    h.io.clear();

    h.event(LinkEvent::PowerChanged(PowerState::Resetting));

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::RadioUnavailable)]);
    assert_eq!(h.link.state(), StateId::RadioDisabled);
    let snap = h.snapshot();
    assert!(!snap.radio_enabled);
    assert!(!snap.connected);
    assert_eq!(snap.last_error, Some(CommandError::RadioUnavailable));
    assert!(h.link.session().peer.is_none());
}

#[test]
fn radio_loss_while_scanning_does_not_stop_dead_radio() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    let token = h.link.armed_deadline().expect("scan deadline armed");
    h.io.clear();

    h.event(LinkEvent::PowerChanged(PowerState::Off));

    assert!(!h.io.contains(&LinkCall::StopScan));
    assert!(h.io.contains(&LinkCall::Disarm(token)));
    assert!(!h.snapshot().scanning);
    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::RadioUnavailable)]);

    // The old deadline can no longer fire anything.
    h.fire_token(token);
    assert_eq!(h.outcomes.len(), 1);
    assert_eq!(h.link.state(), StateId::RadioDisabled);
}

#[test]
fn radio_back_on_clears_error_and_idles() {
    let mut h = Harness::new(PowerState::Off);
    h.trigger(1);
    assert!(h.snapshot().last_error.is_some());

    h.event(LinkEvent::PowerChanged(PowerState::On));

    assert_eq!(h.link.state(), StateId::Idle);
    let snap = h.snapshot();
    assert!(snap.radio_enabled);
    assert_eq!(snap.last_error, None);
    assert_eq!(snap.status_text, "Ready");

    h.trigger(2);
    assert_eq!(h.link.state(), StateId::Scanning);
}

#[test]
fn unknown_power_at_startup_rejects_commands() {
    let mut h = Harness::new(PowerState::Unknown);
    assert_eq!(h.link.state(), StateId::Idle);
    h.trigger(1);
    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::RadioUnavailable)]);
    assert_eq!(h.io.scans_started(), 0);
}

#[test]
fn repeated_power_on_is_ignored() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.sink.clear();

    h.event(LinkEvent::PowerChanged(PowerState::On));

    assert_eq!(h.link.state(), StateId::Scanning);
    assert!(h.link.has_pending());
    assert!(h.sink.events.is_empty());
}

// ── Caller cancellation ───────────────────────────────────────

#[test]
fn stop_scan_cancels_pending_command() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);

    h.stop_scan(Some("user"));

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::Cancelled)]);
    assert_eq!(h.link.state(), StateId::Idle);
    assert!(h.io.contains(&LinkCall::StopScan));
    assert_eq!(h.link.armed_deadline(), None);
}

#[test]
fn stop_scan_without_command_reports_reason() {
    let mut h = Harness::new(PowerState::On);
    h.start_scan();
    h.stop_scan(Some("Scan stopped by user"));

    assert_eq!(h.link.state(), StateId::Idle);
    assert_eq!(h.snapshot().status_text, "Scan stopped by user");
    assert_eq!(h.snapshot().last_error, None);
    assert_eq!(h.outcomes.len(), 0);
}

#[test]
fn disconnect_while_writing_cancels_and_drops_link() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.bring_up_link();
    assert_eq!(h.link.state(), StateId::Writing);

    h.disconnect();

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::Cancelled)]);
    assert!(h.io.contains(&LinkCall::Disconnect(PEER)));
    assert_eq!(h.link.state(), StateId::Idle);
    assert!(h.link.session().peer.is_none());

    // The late ack belongs to a link we no longer hold.
    h.event(LinkEvent::WriteAcked(PEER));
    assert_eq!(h.outcomes.len(), 1);
}

#[test]
fn disconnect_when_linked_without_command_reports_status() {
    let mut h = Harness::new(PowerState::On);
    h.start_scan();
    h.bring_up_link();
    assert_eq!(h.link.state(), StateId::Connected);

    h.disconnect();

    assert_eq!(h.snapshot().status_text, "Disconnected");
    assert!(!h.snapshot().connected);
    assert_eq!(h.outcomes.len(), 0);
}

#[test]
fn shutdown_resolves_pending_with_shutdown() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));

    h.shutdown();

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::Shutdown)]);
    assert!(h.io.contains(&LinkCall::Disconnect(PEER)));
    assert!(!h.link.has_pending());
}

#[test]
fn late_reply_to_our_disconnect_spares_the_next_session() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.bring_up_link();
    h.event(LinkEvent::WriteAcked(PEER));
    h.disconnect();
    assert!(h.io.contains(&LinkCall::Disconnect(PEER)));

    // Same peer rediscovered before the adapter confirms the drop.
    h.trigger(2);
    h.event(LinkEvent::PeerDiscovered(PEER));
    assert_eq!(h.link.state(), StateId::Connecting);
    h.event(LinkEvent::Disconnected {
        peer: PEER,
        reason: None,
    });
    assert_eq!(h.link.state(), StateId::Connecting);
    assert!(h.outcomes.for_id(2).is_empty());

    h.event(LinkEvent::Connected(PEER));
    h.services_found();
    h.endpoints_found();
    h.event(LinkEvent::WriteAcked(PEER));
    assert_eq!(h.outcomes.for_id(2), vec![Ok(())]);

    // A drop we did not ask for still fails the session.
    h.trigger(3);
    h.event(LinkEvent::Disconnected {
        peer: PEER,
        reason: Some(TransportError::Timeout),
    });
    assert_eq!(h.outcomes.for_id(3), vec![Err(CommandError::PeerDisconnected)]);
    assert_eq!(h.link.state(), StateId::Idle);
}

// ── Discovery failures ────────────────────────────────────────

#[test]
fn connect_failure_returns_to_idle() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::ConnectFailed {
        peer: PEER,
        reason: TransportError::Timeout,
    });

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::ConnectFailed)]);
    assert_eq!(h.link.state(), StateId::Idle);
    assert!(h.link.session().peer.is_none());
    assert_eq!(h.snapshot().status_text, "Connection failed");
}

#[test]
fn connect_failure_sends_no_disconnect() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::ConnectFailed {
        peer: PEER,
        reason: TransportError::Rejected,
    });
    assert!(!h.io.contains(&LinkCall::Disconnect(PEER)));
}

#[test]
fn missing_service_fails_and_tears_down() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::Connected(PEER));
    h.event(LinkEvent::ServicesFound {
        peer: PEER,
        services: uuids(&[0x1800, 0x180A]),
    });

    assert_eq!(
        h.outcomes.for_id(1),
        vec![Err(CommandError::ServiceDiscoveryFailed)]
    );
    assert!(h.io.contains(&LinkCall::Disconnect(PEER)));
    assert_eq!(h.link.state(), StateId::Idle);
}

#[test]
fn service_discovery_error_fails() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::Connected(PEER));
    h.event(LinkEvent::ServiceDiscoveryFailed {
        peer: PEER,
        reason: TransportError::Io,
    });
    assert_eq!(
        h.outcomes.for_id(1),
        vec![Err(CommandError::ServiceDiscoveryFailed)]
    );
}

#[test]
fn missing_endpoint_fails() {
    let mut h = Harness::new(PowerState::On);
    let svc = h.link.config().service_uuid;
    h.trigger(1);
    h.event(LinkEvent::PeerDiscovered(PEER));
    h.event(LinkEvent::Connected(PEER));
    h.services_found();
    h.event(LinkEvent::EndpointsFound {
        peer: PEER,
        service: svc,
        characteristics: uuids(&[0x2A00]),
    });

    assert_eq!(
        h.outcomes.for_id(1),
        vec![Err(CommandError::EndpointDiscoveryFailed)]
    );
    assert_eq!(h.link.state(), StateId::Idle);
    assert!(h.link.session().write_target.is_none());
}

#[test]
fn write_failure_keeps_link_for_retry() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.bring_up_link();
    h.event(LinkEvent::WriteFailed {
        peer: PEER,
        reason: TransportError::Rejected,
    });

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::WriteFailed)]);
    assert_eq!(h.link.state(), StateId::Connected);
    assert!(h.link.session().write_target.is_some());
    assert_eq!(h.snapshot().last_error, Some(CommandError::WriteFailed));

    h.io.clear();
    h.trigger(2);
    h.event(LinkEvent::WriteAcked(PEER));
    assert_eq!(h.outcomes.for_id(2), vec![Ok(())]);
    assert_eq!(h.io.scans_started(), 0);
    assert_eq!(h.snapshot().last_error, None);
}

#[test]
fn unencodable_token_fails_but_keeps_link() {
    let config = LinkConfig {
        command_token: String::new(),
        ..LinkConfig::default()
    };
    let mut h = Harness::with_config(config, PowerState::On);
    h.trigger(1);
    h.bring_up_link();

    assert_eq!(h.outcomes.for_id(1), vec![Err(CommandError::EncodingFailed)]);
    assert_eq!(h.link.state(), StateId::Connected);
    assert!(h.io.writes().is_empty());
}

// ── Scan-only and adoption ────────────────────────────────────

#[test]
fn start_scan_links_without_writing() {
    let mut h = Harness::new(PowerState::On);
    h.start_scan();
    h.bring_up_link();

    assert_eq!(h.link.state(), StateId::Connected);
    assert!(h.io.writes().is_empty());
    assert_eq!(h.outcomes.len(), 0);
    assert_eq!(h.snapshot().status_text, "Connected");
}

#[test]
fn trigger_during_bare_scan_rides_the_same_scan() {
    let mut h = Harness::new(PowerState::On);
    h.start_scan();
    h.trigger(1);
    assert_eq!(h.io.scans_started(), 1);

    h.bring_up_link();
    h.event(LinkEvent::WriteAcked(PEER));
    assert_eq!(h.outcomes.for_id(1), vec![Ok(())]);
}

#[test]
fn start_scan_ignored_when_radio_off() {
    let mut h = Harness::new(PowerState::Unauthorized);
    h.start_scan();
    assert_eq!(h.link.state(), StateId::RadioDisabled);
    assert!(h.io.calls.is_empty());
}

// ── Stale and foreign events ──────────────────────────────────

#[test]
fn deadline_after_discovery_is_ignored() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    let token = h.link.armed_deadline().expect("armed");
    h.event(LinkEvent::PeerDiscovered(PEER));

    h.fire_token(token);

    assert_eq!(h.link.state(), StateId::Connecting);
    assert!(h.outcomes.for_id(1).is_empty());
}

#[test]
fn deadline_from_previous_scan_does_not_end_new_scan() {
    let mut h = Harness::new(PowerState::On);
    h.start_scan();
    let old = h.link.armed_deadline().expect("armed");
    h.stop_scan(None);
    h.start_scan();

    h.fire_token(old);

    assert_eq!(h.link.state(), StateId::Scanning);
    assert!(h.snapshot().scanning);
}

#[test]
fn events_for_other_peer_are_ignored() {
    let mut h = Harness::new(PowerState::On);
    h.trigger(1);
    h.bring_up_link();

    h.event(LinkEvent::WriteAcked(OTHER_PEER));
    h.event(LinkEvent::Disconnected {
        peer: OTHER_PEER,
        reason: None,
    });

    assert_eq!(h.link.state(), StateId::Writing);
    assert!(h.outcomes.for_id(1).is_empty());
}

#[test]
fn discovery_outside_scanning_is_ignored() {
    let mut h = Harness::new(PowerState::On);
    h.event(LinkEvent::PeerDiscovered(PEER));
    assert_eq!(h.link.state(), StateId::Idle);
    assert!(h.link.session().peer.is_none());
    assert!(h.io.calls.is_empty());
}

// ── Observer stream ───────────────────────────────────────────

#[test]
fn state_changes_and_snapshots_are_published() {
    let mut h = Harness::new(PowerState::On);
    assert!(matches!(
        h.sink.events.first(),
        Some(AppEvent::Started(StateId::Idle))
    ));
    h.sink.clear();

    h.trigger(1);

    assert!(h.sink.events.contains(&AppEvent::StateChanged {
        from: StateId::Idle,
        to: StateId::Scanning,
    }));
    let snap = h.sink.last_snapshot().expect("snapshot emitted");
    assert!(snap.scanning);
    assert_eq!(snap.status_text, "Scanning for device");
}
