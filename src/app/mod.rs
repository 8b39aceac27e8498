//! Application core: pure domain logic, zero I/O.
//!
//! Loop orchestration, screen composition and outbound events for the
//! force gauge.  All interaction with hardware and the micro-ROS client
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod presentation;
pub mod service;
