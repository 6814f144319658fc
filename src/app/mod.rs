//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the command pipeline rules: FSM orchestration,
//! the single pending-command slot and event routing.  All interaction
//! with the radio happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without a BLE stack.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
