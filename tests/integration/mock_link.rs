//! Mock radio adapter for integration tests.
//!
//! Records every transport and timer call so tests can assert on the full
//! request history without a BLE stack, and wraps a [`Coordinator`] in a
//! small harness that feeds it events the way the runtime would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use peerlink::app::commands::CommandCallback;
use peerlink::app::events::{AppEvent, LinkEvent, PowerState, UuidList};
use peerlink::app::ports::{EventSink, TimerPort, TransportPort};
use peerlink::app::service::Coordinator;
use peerlink::config::LinkConfig;
use peerlink::error::CommandResult;
use peerlink::fsm::context::DeadlineToken;
use peerlink::session::{PeerHandle, SessionSnapshot, WriteTarget};

pub const PEER: PeerHandle = PeerHandle::new(0xB0B);
pub const OTHER_PEER: PeerHandle = PeerHandle::new(0xE7E);

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    StartScan(u128),
    StopScan,
    Connect(PeerHandle),
    Disconnect(PeerHandle),
    DiscoverServices(PeerHandle, u128),
    DiscoverEndpoints(PeerHandle, u128, u128),
    Write(PeerHandle, WriteTarget, Vec<u8>),
    Arm(DeadlineToken, Duration),
    Disarm(DeadlineToken),
}

// ── MockLink ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub calls: Vec<LinkCall>,
    pub armed: Option<DeadlineToken>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&LinkCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn scans_started(&self) -> usize {
        self.count(|c| matches!(c, LinkCall::StartScan(_)))
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                LinkCall::Write(_, _, payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, call: &LinkCall) -> bool {
        self.calls.contains(call)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl TransportPort for MockLink {
    fn start_scan(&mut self, service_filter: u128) {
        self.calls.push(LinkCall::StartScan(service_filter));
    }

    fn stop_scan(&mut self) {
        self.calls.push(LinkCall::StopScan);
    }

    fn connect(&mut self, peer: PeerHandle) {
        self.calls.push(LinkCall::Connect(peer));
    }

    fn disconnect(&mut self, peer: PeerHandle) {
        self.calls.push(LinkCall::Disconnect(peer));
    }

    fn discover_services(&mut self, peer: PeerHandle, filter: u128) {
        self.calls.push(LinkCall::DiscoverServices(peer, filter));
    }

    fn discover_endpoints(&mut self, peer: PeerHandle, service: u128, filter: u128) {
        self.calls
            .push(LinkCall::DiscoverEndpoints(peer, service, filter));
    }

    fn write(&mut self, peer: PeerHandle, target: WriteTarget, payload: &[u8]) {
        self.calls
            .push(LinkCall::Write(peer, target, payload.to_vec()));
    }
}

impl TimerPort for MockLink {
    fn arm(&mut self, token: DeadlineToken, after: Duration) {
        self.armed = Some(token);
        self.calls.push(LinkCall::Arm(token, after));
    }

    fn disarm(&mut self, token: DeadlineToken) {
        if self.armed == Some(token) {
            self.armed = None;
        }
        self.calls.push(LinkCall::Disarm(token));
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn last_snapshot(&self) -> Option<&SessionSnapshot> {
        self.events.iter().rev().find_map(|e| match e {
            AppEvent::Snapshot(s) => Some(s),
            _ => None,
        })
    }

    pub fn successes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::CommandSucceeded))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Callback recorder ─────────────────────────────────────────

/// Collects `(caller id, result)` pairs from command callbacks.
#[derive(Clone, Default)]
pub struct Outcomes(Arc<Mutex<Vec<(usize, CommandResult)>>>);

#[allow(dead_code)]
impl Outcomes {
    pub fn callback(&self, id: usize) -> CommandCallback {
        let log = self.0.clone();
        Box::new(move |result| log.lock().unwrap().push((id, result)))
    }

    pub fn for_id(&self, id: usize) -> Vec<CommandResult> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| *i == id)
            .map(|(_, r)| *r)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub link: Coordinator,
    pub io: MockLink,
    pub sink: RecordingSink,
    pub outcomes: Outcomes,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(power: PowerState) -> Self {
        Self::with_config(LinkConfig::default(), power)
    }

    pub fn with_config(config: LinkConfig, power: PowerState) -> Self {
        let mut link = Coordinator::new(config);
        let mut sink = RecordingSink::default();
        link.start(power, &mut sink);
        Self {
            link,
            io: MockLink::new(),
            sink,
            outcomes: Outcomes::default(),
        }
    }

    pub fn trigger(&mut self, id: usize) {
        let cb = self.outcomes.callback(id);
        self.link.trigger_command(cb, &mut self.io, &mut self.sink);
    }

    pub fn event(&mut self, event: LinkEvent) {
        self.link.handle_event(&event, &mut self.io, &mut self.sink);
    }

    pub fn start_scan(&mut self) {
        self.link.start_scan(&mut self.io, &mut self.sink);
    }

    pub fn stop_scan(&mut self, reason: Option<&str>) {
        self.link.stop_scan(reason, &mut self.io, &mut self.sink);
    }

    pub fn disconnect(&mut self) {
        self.link.disconnect(&mut self.io, &mut self.sink);
    }

    pub fn shutdown(&mut self) {
        self.link.shutdown(&mut self.io, &mut self.sink);
    }

    /// Fire whichever deadline the mock timer holds, as the runtime would.
    pub fn fire_deadline(&mut self) {
        let token = self.io.armed.take().expect("no deadline armed");
        self.link
            .on_scan_deadline(token, &mut self.io, &mut self.sink);
    }

    pub fn fire_token(&mut self, token: DeadlineToken) {
        self.link
            .on_scan_deadline(token, &mut self.io, &mut self.sink);
    }

    pub fn services_found(&mut self) {
        let svc = self.link.config().service_uuid;
        self.event(LinkEvent::ServicesFound {
            peer: PEER,
            services: uuids(&[0x1800, svc]),
        });
    }

    pub fn endpoints_found(&mut self) {
        let svc = self.link.config().service_uuid;
        let chr = self.link.config().write_char_uuid;
        self.event(LinkEvent::EndpointsFound {
            peer: PEER,
            service: svc,
            characteristics: uuids(&[chr]),
        });
    }

    /// Peer appears, links and exposes the write target.
    pub fn bring_up_link(&mut self) {
        self.event(LinkEvent::PeerDiscovered(PEER));
        self.event(LinkEvent::Connected(PEER));
        self.services_found();
        self.endpoints_found();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.link.snapshot()
    }
}

pub fn uuids(list: &[u128]) -> UuidList {
    UuidList::from_slice(list).unwrap()
}
