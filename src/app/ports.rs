//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ InstrumentService (domain)
//! ```
//!
//! Driven adapters (ADC, display, middleware client, event sinks) implement
//! these traits.  The [`InstrumentService`](super::service::InstrumentService)
//! consumes them via generics, so the domain core never touches hardware or
//! the micro-ROS client library directly.
//!
//! Every port call either returns a success/failure indicator that the caller
//! consumes immediately, or is fire-and-forget.  Nothing panics across the
//! boundary and nothing blocks beyond its own timeout.

use heapless::Vec;

use crate::error::{MiddlewareError, SensorError};
use crate::sensors::mcp3428::AdcSettings;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the force ADC.
pub trait SensorPort {
    /// Lightweight bus-level presence check (address ACK).
    fn probe(&mut self) -> bool;

    /// Program channel, resolution, gain and conversion mode.
    fn configure(&mut self, settings: AdcSettings) -> Result<(), SensorError>;

    /// Read one signed output code using the last applied settings.
    fn read_raw(&mut self) -> Result<i16, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → panel)
// ───────────────────────────────────────────────────────────────

/// Colours used by the status screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
    Red,
    Green,
    Yellow,
}

/// Fire-and-forget text drawing.  Coordinates are the text centre.
pub trait DisplayPort {
    /// Fill the whole panel with black.
    fn clear(&mut self);

    /// Draw `text` centred on (`x`, `y`) at integer scale `size`.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: u8, color: Color);

    fn width(&self) -> u32;

    fn height(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Middleware port (driven adapter: domain ↔ micro-ROS client)
// ───────────────────────────────────────────────────────────────

/// Opaque handles into the middleware client.  A handle is only valid for
/// the session it was created in; adapters reject stale ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SupportHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublisherHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutorHandle(pub u32);

/// Upper bound on timers the executor can report from one spin.
pub const MAX_TIMER_FIRES: usize = 4;

/// Timers whose callbacks became due during a spin, in firing order.
pub type TimerFires = Vec<TimerHandle, MAX_TIMER_FIRES>;

/// The micro-ROS client substrate, reduced to the calls the link needs.
///
/// The `init_*` calls are only ever made through
/// [`TelemetryEntities::create`](crate::link::entities::TelemetryEntities::create),
/// which guarantees all-or-nothing construction; the `fini_*` calls only
/// through its single teardown path.
pub trait MiddlewarePort {
    /// Bounded reachability check.  `false` on timeout; never an error.
    fn ping_agent(&mut self, timeout_ms: u32, attempts: u8) -> bool;

    fn init_support(&mut self) -> Result<SupportHandle, MiddlewareError>;

    fn init_node(
        &mut self,
        support: SupportHandle,
        name: &str,
        namespace: &str,
    ) -> Result<NodeHandle, MiddlewareError>;

    /// Best-effort `std_msgs/Float32` publisher on `topic`.
    fn init_publisher(
        &mut self,
        node: NodeHandle,
        topic: &str,
    ) -> Result<PublisherHandle, MiddlewareError>;

    fn init_timer(
        &mut self,
        support: SupportHandle,
        period_ms: u32,
    ) -> Result<TimerHandle, MiddlewareError>;

    /// Executor with room for `timer` and the timer already registered.
    fn init_executor(
        &mut self,
        support: SupportHandle,
        timer: TimerHandle,
    ) -> Result<ExecutorHandle, MiddlewareError>;

    /// Single best-effort publish; no retry, no queue.
    fn publish(&mut self, publisher: PublisherHandle, value: f32) -> Result<(), MiddlewareError>;

    /// Give the executor up to `budget_ms` to notice due timers.
    fn spin_executor(
        &mut self,
        executor: ExecutorHandle,
        budget_ms: u32,
    ) -> Result<TimerFires, MiddlewareError>;

    fn fini_executor(&mut self, executor: ExecutorHandle);

    fn fini_timer(&mut self, timer: TimerHandle);

    fn fini_publisher(&mut self, publisher: PublisherHandle, node: NodeHandle);

    fn fini_node(&mut self, node: NodeHandle);

    fn fini_support(&mut self, support: SupportHandle);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The override could not be parsed.
    Malformed,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "config malformed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
