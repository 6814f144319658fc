//! PeerLink library.
//!
//! Locates one peer over BLE, links to it and writes a single toggle
//! command, resolving the caller exactly once.  Exposes the pure-logic
//! modules for integration testing; radio stacks plug in through
//! [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod ambient;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod protocol;
pub mod runtime;
pub mod session;
