//! Simulated radio transport.
//!
//! Implements [`TransportPort`] without hardware by answering every request
//! with the event a well-behaved stack would deliver, posted back through a
//! [`LinkHandle`] after a short latency.  [`SimScript`] knobs inject the
//! failures the coordinator must survive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info};

use crate::app::events::{LinkEvent, UuidList};
use crate::app::ports::TransportPort;
use crate::error::TransportError;
use crate::protocol::Uuid128;
use crate::runtime::LinkHandle;
use crate::session::{PeerHandle, WriteTarget};

/// Generic Access, always present on a real peer.
const GAP_SERVICE: u128 = 0x0000_1800_0000_1000_8000_0080_5f9b_34fb;
/// Device Information, advertised when the command service is absent.
const DEVICE_INFO_SERVICE: u128 = 0x0000_180a_0000_1000_8000_0080_5f9b_34fb;

/// How the simulated peer behaves.
#[derive(Debug, Clone)]
pub struct SimScript {
    /// Delay before the peer shows up in a scan; `None` = never.
    pub discover_after: Option<Duration>,
    /// Delay applied to every other response.
    pub latency: Duration,
    pub connect_fails: bool,
    pub service_present: bool,
    pub write_fails: bool,
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            discover_after: Some(Duration::from_millis(300)),
            latency: Duration::from_millis(40),
            connect_fails: false,
            service_present: true,
            write_fails: false,
        }
    }
}

/// Transport adapter backed by a scripted peer.
pub struct SimTransport {
    link: LinkHandle,
    script: SimScript,
    peer: PeerHandle,
    /// Bumped on every scan start/stop; stale discoveries check it.
    scan_generation: Arc<AtomicU64>,
    writes: u64,
}

impl SimTransport {
    pub fn new(link: LinkHandle, script: SimScript) -> Self {
        Self {
            link,
            script,
            peer: PeerHandle::new(0x5eed),
            scan_generation: Arc::new(AtomicU64::new(0)),
            writes: 0,
        }
    }

    /// The handle the simulated peer is reported under.
    pub fn peer(&self) -> PeerHandle {
        self.peer
    }

    /// Payloads written so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Reply from a helper thread; the runtime thread must never post.
    fn post_after(&self, delay: Duration, event: LinkEvent) {
        let link = self.link.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            link.post(event);
        });
    }

    fn uuids(list: &[u128]) -> UuidList {
        list.iter().copied().collect()
    }
}

impl TransportPort for SimTransport {
    fn start_scan(&mut self, service_filter: u128) {
        let generation = self.scan_generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!("SIM: scanning for service {}", Uuid128(service_filter));
        let Some(delay) = self.script.discover_after else {
            debug!("SIM: peer will not advertise");
            return;
        };
        let link = self.link.clone();
        let current = self.scan_generation.clone();
        let peer = self.peer;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if current.load(Ordering::Acquire) == generation {
                link.post(LinkEvent::PeerDiscovered(peer));
            }
        });
    }

    fn stop_scan(&mut self) {
        self.scan_generation.fetch_add(1, Ordering::AcqRel);
        debug!("SIM: scan stopped");
    }

    fn connect(&mut self, peer: PeerHandle) {
        let event = if self.script.connect_fails {
            LinkEvent::ConnectFailed {
                peer,
                reason: TransportError::Timeout,
            }
        } else {
            LinkEvent::Connected(peer)
        };
        self.post_after(self.script.latency, event);
    }

    fn disconnect(&mut self, peer: PeerHandle) {
        debug!("SIM: disconnecting {}", peer);
        self.post_after(
            self.script.latency,
            LinkEvent::Disconnected { peer, reason: None },
        );
    }

    fn discover_services(&mut self, peer: PeerHandle, filter: u128) {
        let services = if self.script.service_present {
            Self::uuids(&[GAP_SERVICE, filter])
        } else {
            Self::uuids(&[GAP_SERVICE, DEVICE_INFO_SERVICE])
        };
        self.post_after(
            self.script.latency,
            LinkEvent::ServicesFound { peer, services },
        );
    }

    fn discover_endpoints(&mut self, peer: PeerHandle, service: u128, filter: u128) {
        self.post_after(
            self.script.latency,
            LinkEvent::EndpointsFound {
                peer,
                service,
                characteristics: Self::uuids(&[filter]),
            },
        );
    }

    fn write(&mut self, peer: PeerHandle, target: WriteTarget, payload: &[u8]) {
        self.writes += 1;
        info!(
            "SIM: write {:?} to {} on {}",
            String::from_utf8_lossy(payload),
            Uuid128(target.characteristic),
            peer
        );
        let event = if self.script.write_fails {
            LinkEvent::WriteFailed {
                peer,
                reason: TransportError::Rejected,
            }
        } else {
            LinkEvent::WriteAcked(peer)
        };
        self.post_after(self.script.latency, event);
    }
}
