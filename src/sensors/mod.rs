//! Sensor subsystem: the ADC driver and the signal chain behind it.

pub mod mcp3428;
pub mod signal;
