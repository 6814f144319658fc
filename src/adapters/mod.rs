//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements     | Connects to                    |
//! |----------------|----------------|--------------------------------|
//! | `file_config`  | ConfigPort     | JSON file on disk              |
//! | `log_sink`     | EventSink      | `log` facade / stderr          |
//! | `sim`          | TransportPort  | Scripted peer (host, tests)    |
//!
//! The scan-deadline [`TimerPort`](crate::app::ports::TimerPort) lives in
//! [`runtime`](crate::runtime), next to the loop that races it.

pub mod file_config;
pub mod log_sink;
pub mod sim;
