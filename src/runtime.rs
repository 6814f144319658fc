//! Serialized event context: the single owner of the coordinator and its timer.
//!
//! Adapter callbacks and caller commands are marshalled into a bounded
//! `embassy-sync` inbox.  A single loop drains it and feeds the
//! [`Coordinator`], racing the receive against the armed scan deadline:
//!
//! ```text
//!  ┌──────────────┐  Input   ┌──────────────────────────────────────┐
//!  │  LinkHandle  │────────▶│  LinkRuntime::run                    │
//!  │  (any thread)│          │  ┌────────────┐   ┌───────────────┐  │
//!  └──────────────┘          │  │ inbox recv │ or│ scan deadline │  │
//!  ┌──────────────┐  post()  │  └─────┬──────┘   └──────┬────────┘  │
//!  │  Transport   │────────▶│        └──── Coordinator ◀┘           │
//!  │  callbacks   │          └──────────────────────────────────────┘
//!  └──────────────┘
//! ```
//!
//! Whichever of "deadline fires" and "peer discovered" the loop sees first
//! wins.  The loser is harmless: a late deadline carries a token that is no
//! longer armed and is dropped by the coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, info, warn};

use crate::app::commands::AppCommand;
use crate::app::events::{LinkEvent, PowerState};
use crate::app::ports::{EventSink, TimerPort, TransportPort};
use crate::app::service::Coordinator;
use crate::config::LinkConfig;
use crate::error::{CommandError, CommandResult};
use crate::fsm::context::DeadlineToken;
use crate::session::{PeerHandle, WriteTarget};

/// Inbox depth shared by commands and transport events.
pub const INBOX_DEPTH: usize = 16;

/// How often a blocked [`LinkHandle::post`] checks for shutdown.
const STOP_POLL: Duration = Duration::from_millis(10);

/// Everything the loop can receive.
pub enum Input {
    Command(AppCommand),
    Link(LinkEvent),
    Shutdown,
}

type Inbox = Channel<CriticalSectionRawMutex, Input, INBOX_DEPTH>;

struct Shared {
    inbox: Inbox,
    stopping: AtomicBool,
}

impl Shared {
    /// Resolve every trigger still sitting in the inbox with `Shutdown`.
    fn resolve_leftovers(&self) -> usize {
        let mut resolved = 0;
        while let Ok(input) = self.inbox.try_receive() {
            if let Input::Command(AppCommand::TriggerCommand(callback)) = input {
                callback(Err(CommandError::Shutdown));
                resolved += 1;
            }
        }
        resolved
    }
}

impl Drop for Shared {
    // Last handle gone: nothing will ever receive what is still queued.
    fn drop(&mut self) {
        let resolved = self.resolve_leftovers();
        if resolved > 0 {
            debug!("Resolved {} queued command(s) on teardown", resolved);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// LinkHandle: inbound API, callable from any thread
// ───────────────────────────────────────────────────────────────

/// Cloneable sender side of the runtime.
///
/// None of these calls block; results arrive later through the command
/// callback or the runtime's [`EventSink`].
#[derive(Clone)]
pub struct LinkHandle {
    shared: Arc<Shared>,
}

impl Default for LinkHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inbox: Channel::new(),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a toggle command.  `on_result` runs exactly once, on the
    /// runtime thread (or right here if the command cannot be queued).
    /// Triggers that slip in behind a shutdown are resolved when the last
    /// handle is dropped.
    pub fn trigger_command<F>(&self, on_result: F)
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        if self.shared.stopping.load(Ordering::Acquire) {
            on_result(Err(CommandError::Shutdown));
            return;
        }
        let input = Input::Command(AppCommand::TriggerCommand(Box::new(on_result)));
        if let Err(TrySendError::Full(input)) = self.shared.inbox.try_send(input) {
            warn!("Inbox full, rejecting command");
            if let Input::Command(AppCommand::TriggerCommand(callback)) = input {
                callback(Err(CommandError::CommandBusy));
            }
        }
    }

    pub fn start_scan(&self) {
        self.send(Input::Command(AppCommand::StartScan), "start scan");
    }

    pub fn stop_scan(&self, reason: Option<&str>) {
        let reason = reason.map(str::to_owned);
        self.send(Input::Command(AppCommand::StopScan { reason }), "stop scan");
    }

    pub fn disconnect(&self) {
        self.send(Input::Command(AppCommand::Disconnect), "disconnect");
    }

    /// Marshal a transport callback onto the runtime.
    ///
    /// Waits for a free slot when the inbox is full, so results are never
    /// lost.  Returns `false` only if the runtime is shutting down.  Must be
    /// called from an adapter thread, never from the runtime loop itself.
    pub fn post(&self, event: LinkEvent) -> bool {
        let name = event.name();
        let input = match self.shared.inbox.try_send(Input::Link(event)) {
            Ok(()) => return true,
            Err(TrySendError::Full(input)) => input,
        };
        debug!("Inbox full, waiting to post {}", name);

        let shared = &self.shared;
        let delivered = futures_lite::future::block_on(futures_lite::future::or(
            async {
                shared.inbox.send(input).await;
                true
            },
            async {
                while !shared.stopping.load(Ordering::Acquire) {
                    async_io_mini::Timer::after(STOP_POLL).await;
                }
                false
            },
        ));
        if !delivered {
            warn!("Runtime stopping, dropping {}", name);
        }
        delivered
    }

    /// Ask the loop to stop.  A pending command resolves with `Shutdown`.
    pub fn shutdown(&self) {
        self.shared.stopping.store(true, Ordering::Release);
        // The flag alone stops the loop after its next input.
        let _ = self.shared.inbox.try_send(Input::Shutdown);
    }

    fn send(&self, input: Input, what: &str) {
        if self.shared.inbox.try_send(input).is_err() {
            warn!("Inbox full, dropping {} request", what);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Scan deadline clock
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct DeadlineClock {
    armed: Option<(DeadlineToken, Instant)>,
}

impl TimerPort for DeadlineClock {
    fn arm(&mut self, token: DeadlineToken, after: Duration) {
        debug!("Scan deadline #{} armed for {:?}", token.raw(), after);
        self.armed = Some((token, Instant::now() + after));
    }

    fn disarm(&mut self, token: DeadlineToken) {
        if matches!(self.armed, Some((armed, _)) if armed == token) {
            debug!("Scan deadline #{} disarmed", token.raw());
            self.armed = None;
        }
    }
}

/// Transport plus clock, handed to the coordinator as one I/O bundle.
struct RuntimeIo<'a, T> {
    transport: &'a mut T,
    clock: &'a mut DeadlineClock,
}

impl<T: TransportPort> TransportPort for RuntimeIo<'_, T> {
    fn start_scan(&mut self, service_filter: u128) {
        self.transport.start_scan(service_filter);
    }

    fn stop_scan(&mut self) {
        self.transport.stop_scan();
    }

    fn connect(&mut self, peer: PeerHandle) {
        self.transport.connect(peer);
    }

    fn disconnect(&mut self, peer: PeerHandle) {
        self.transport.disconnect(peer);
    }

    fn discover_services(&mut self, peer: PeerHandle, filter: u128) {
        self.transport.discover_services(peer, filter);
    }

    fn discover_endpoints(&mut self, peer: PeerHandle, service: u128, filter: u128) {
        self.transport.discover_endpoints(peer, service, filter);
    }

    fn write(&mut self, peer: PeerHandle, target: WriteTarget, payload: &[u8]) {
        self.transport.write(peer, target, payload);
    }
}

impl<T> TimerPort for RuntimeIo<'_, T> {
    fn arm(&mut self, token: DeadlineToken, after: Duration) {
        self.clock.arm(token, after);
    }

    fn disarm(&mut self, token: DeadlineToken) {
        self.clock.disarm(token);
    }
}

// ───────────────────────────────────────────────────────────────
// LinkRuntime: the serialized loop
// ───────────────────────────────────────────────────────────────

enum Wake {
    Input(Input),
    Deadline(DeadlineToken),
}

async fn next_wake(inbox: &Inbox, armed: Option<(DeadlineToken, Instant)>) -> Wake {
    let receive = async { Wake::Input(inbox.receive().await) };
    match armed {
        None => receive.await,
        Some((token, at)) => {
            let fire = async move {
                async_io_mini::Timer::after(at.saturating_duration_since(Instant::now())).await;
                Wake::Deadline(token)
            };
            futures_lite::future::or(receive, fire).await
        }
    }
}

/// Owns the coordinator and its adapters; runs until shut down.
pub struct LinkRuntime<T, S> {
    coordinator: Coordinator,
    transport: T,
    sink: S,
    clock: DeadlineClock,
    shared: Arc<Shared>,
}

impl<T: TransportPort, S: EventSink> LinkRuntime<T, S> {
    /// Bind a coordinator to the inbox behind `handle`.
    pub fn new(config: LinkConfig, handle: &LinkHandle, transport: T, sink: S) -> Self {
        Self {
            coordinator: Coordinator::new(config),
            transport,
            sink,
            clock: DeadlineClock::default(),
            shared: handle.shared.clone(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Give the adapters back after the loop has stopped.
    pub fn into_parts(self) -> (T, S) {
        (self.transport, self.sink)
    }

    /// Process inputs until [`LinkHandle::shutdown`] is called.
    pub async fn run(&mut self, power: PowerState) {
        self.coordinator.start(power, &mut self.sink);
        let shared = self.shared.clone();

        loop {
            let wake = next_wake(&shared.inbox, self.clock.armed).await;

            let Self {
                coordinator,
                transport,
                sink,
                clock,
                ..
            } = self;
            let mut io = RuntimeIo { transport, clock };

            match wake {
                Wake::Deadline(token) => {
                    io.clock.armed = None;
                    coordinator.on_scan_deadline(token, &mut io, sink);
                }
                Wake::Input(Input::Command(cmd)) => coordinator.handle_command(cmd, &mut io, sink),
                Wake::Input(Input::Link(event)) => coordinator.handle_event(&event, &mut io, sink),
                Wake::Input(Input::Shutdown) => break,
            }

            if shared.stopping.load(Ordering::Acquire) {
                break;
            }
        }

        let mut io = RuntimeIo {
            transport: &mut self.transport,
            clock: &mut self.clock,
        };
        self.coordinator.shutdown(&mut io, &mut self.sink);
        self.shared.resolve_leftovers();
        info!(
            "Link runtime stopped ({} commands accepted, {} resolved)",
            self.coordinator.accepted_commands(),
            self.coordinator.resolved_commands()
        );
    }

    /// Drive [`run`](Self::run) to completion on the current thread.
    pub fn run_blocking(&mut self, power: PowerState) {
        let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
        futures_lite::future::block_on(executor.run(self.run(power)));
    }
}
