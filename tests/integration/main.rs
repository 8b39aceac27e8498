//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters and the simulated agent.  All tests run on the
//! host with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod link_tests;
mod mock_hw;
mod service_tests;
