//! GATT identifiers and command payload encoding.
//!
//! ## GATT Service Layout (peer side)
//!
//! | Item            | UUID                                   | Perms |
//! |-----------------|----------------------------------------|-------|
//! | Command service | `7a1c0001-5e2b-4d8e-9f31-2b6c8e4d0a17` |       |
//! | Command write   | `7a1c0002-5e2b-4d8e-9f31-2b6c8e4d0a17` | Write |
//!
//! The payload is a short ASCII token (default `TOGGLE`) written in a
//! single ATT write, so it must fit in `mtu - 3` bytes.

use core::fmt;

use crate::error::CommandError;

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x7a1c0001_5e2b_4d8e_9f31_2b6c8e4d0a17;
pub const CHAR_COMMAND_WRITE: u128 = 0x7a1c0002_5e2b_4d8e_9f31_2b6c8e4d0a17;

/// Token understood by the peer as "toggle".
pub const TOGGLE_TOKEN: &str = "TOGGLE";

const DEFAULT_MTU: usize = 23;
const ATT_HEADER_SIZE: usize = 3;

/// Largest payload that fits a single write at the default MTU.
pub const MAX_PAYLOAD_LEN: usize = DEFAULT_MTU - ATT_HEADER_SIZE;

/// Encoded command, ready for a single characteristic write.
pub type CommandPayload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

// ── Encoding ─────────────────────────────────────────────────

/// Build the write payload for `token`.
///
/// The token must be non-empty printable ASCII no longer than
/// `max_len` (itself capped at [`MAX_PAYLOAD_LEN`]).
pub fn encode_command(token: &str, max_len: usize) -> Result<CommandPayload, CommandError> {
    let limit = max_len.min(MAX_PAYLOAD_LEN);
    if token.is_empty() || token.len() > limit {
        return Err(CommandError::EncodingFailed);
    }
    if !token.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(CommandError::EncodingFailed);
    }
    CommandPayload::from_slice(token.as_bytes()).map_err(|()| CommandError::EncodingFailed)
}

// ── UUID formatting ──────────────────────────────────────────

/// Display adapter that renders a `u128` in canonical 8-4-4-4-12 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uuid128(pub u128);

impl fmt::Display for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}
