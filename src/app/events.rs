//! Outbound application events.
//!
//! The [`InstrumentService`](super::service::InstrumentService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them; the default one writes them to
//! the log.

use crate::error::Error;
use crate::link::ConnectionState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries initial link state).
    Started(ConnectionState),

    /// The agent link moved between states.
    LinkChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Building the telemetry entities failed; `attempt` counts
    /// consecutive failures.
    EntityCreationFailed { error: Error, attempt: u32 },

    /// A supervised restart was requested after repeated failures.
    RestartRequested { failures: u32 },

    /// The ADC appeared on (`true`) or vanished from (`false`) the bus.
    SensorPresence(bool),

    /// Per-tick snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time snapshot suitable for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryData {
    pub tick: u64,
    pub link: ConnectionState,
    pub sensor_present: bool,
    /// Force in newtons, `None` while the sensor is absent.
    pub force: Option<f32>,
    pub millivolts: Option<f32>,
    /// Publishes accepted by the transport this tick.
    pub published: u32,
}
