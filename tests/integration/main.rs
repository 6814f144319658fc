//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the coordinator against
//! the recording mock radio.  All tests run on the host with no BLE stack.

mod coordinator_tests;
mod mock_link;
mod scenario_tests;
