//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements      | Connects to                         |
//! |--------------|-----------------|-------------------------------------|
//! | `hardware`   | SensorPort      | MCP3428 over any embedded-hal I2C   |
//! | `display`    | DisplayPort     | embedded-graphics target / log      |
//! | `log_sink`   | EventSink       | Serial log output                   |
//! | `micro_ros`  | MiddlewarePort  | rclc + XRCE-DDS over UART (target)  |
//! | `sim_agent`  | MiddlewarePort  | In-memory agent (host)              |

pub mod display;
pub mod hardware;
pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod micro_ros;
#[cfg(not(target_os = "espidf"))]
pub mod sim_agent;
