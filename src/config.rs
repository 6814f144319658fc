//! Link configuration parameters
//!
//! All tunable parameters for the PeerLink coordinator and the ambient
//! signal monitor.  Values can be overridden from a JSON file through
//! [`FileConfigAdapter`](crate::adapters::file_config::FileConfigAdapter).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::{self, CHAR_COMMAND_WRITE, MAX_PAYLOAD_LEN, SERVICE_UUID, TOGGLE_TOKEN};

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- GATT ---
    /// Service UUID used as the scan filter and for service discovery
    pub service_uuid: u128,
    /// Characteristic UUID that accepts the command payload
    pub write_char_uuid: u128,
    /// ASCII token written to the peer
    pub command_token: String,
    /// Largest payload a single write may carry (bytes)
    pub max_payload_len: usize,

    // --- Timing ---
    /// Scan deadline (milliseconds)
    pub scan_timeout_ms: u64,

    // --- Ambient signal ---
    /// Assertions file watched by the ambient monitor (disabled if `None`)
    pub ambient_path: Option<PathBuf>,
    /// Ambient poll interval (milliseconds)
    pub ambient_poll_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // GATT
            service_uuid: SERVICE_UUID,
            write_char_uuid: CHAR_COMMAND_WRITE,
            command_token: TOGGLE_TOKEN.to_owned(),
            max_payload_len: MAX_PAYLOAD_LEN,

            // Timing
            scan_timeout_ms: 10_000, // 10 s

            // Ambient
            ambient_path: None,
            ambient_poll_ms: 2_000,
        }
    }
}

impl LinkConfig {
    /// Scan deadline as a [`Duration`].
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// Ambient poll interval as a [`Duration`].
    pub fn ambient_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ambient_poll_ms)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("scan_timeout_ms must be > 0"));
        }
        if self.ambient_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("ambient_poll_ms must be > 0"));
        }
        if self.service_uuid == self.write_char_uuid {
            return Err(ConfigError::ValidationFailed(
                "service_uuid and write_char_uuid must differ",
            ));
        }
        if self.max_payload_len == 0 || self.max_payload_len > MAX_PAYLOAD_LEN {
            return Err(ConfigError::ValidationFailed(
                "max_payload_len must be within 1..=20",
            ));
        }
        if protocol::encode_command(&self.command_token, self.max_payload_len).is_err() {
            return Err(ConfigError::ValidationFailed(
                "command_token must be printable ASCII within max_payload_len",
            ));
        }
        Ok(())
    }
}
