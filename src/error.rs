//! Unified error types for the ForceGauge firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the link state machine and the event sink without
//! allocation.
//!
//! None of these are fatal after boot: the control loop consumes every
//! failure immediately and either retries next tick or skips the work.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The ADC could not be reached or returned no conversion.
    Sensor(SensorError),
    /// A middleware (micro-ROS) call failed.
    Middleware(MiddlewareError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Middleware(e) => write!(f, "middleware: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<crate::app::ports::ConfigError> for Error {
    fn from(e: crate::app::ports::ConfigError) -> Self {
        match e {
            crate::app::ports::ConfigError::Malformed => Self::Config("malformed override"),
            crate::app::ports::ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No ACK from the device address.
    NotPresent,
    /// An I2C transaction failed mid-transfer.
    Bus,
    /// The ready bit never cleared within the polling budget.
    ConversionTimeout,
    /// Requested channel/resolution/gain is not supported by the device.
    InvalidSetting,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => write!(f, "ADC not present on bus"),
            Self::Bus => write!(f, "I2C bus error"),
            Self::ConversionTimeout => write!(f, "ADC conversion timed out"),
            Self::InvalidSetting => write!(f, "invalid ADC setting"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Middleware errors
// ---------------------------------------------------------------------------

/// The stage of the entity bundle that failed to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStage {
    Support,
    Node,
    Publisher,
    Timer,
    Executor,
}

impl fmt::Display for EntityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Support => "support",
            Self::Node => "node",
            Self::Publisher => "publisher",
            Self::Timer => "timer",
            Self::Executor => "executor",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewareError {
    /// An `init_*` call failed (return code from the client library).
    InitFailed { stage: EntityStage, code: i32 },
    /// A publish attempt was rejected by the transport.
    PublishFailed(i32),
    /// Spinning the executor returned an error.
    SpinFailed(i32),
    /// A handle from a previous session was used after teardown.
    StaleHandle,
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed { stage, code } => write!(f, "{stage} init failed (rc={code})"),
            Self::PublishFailed(rc) => write!(f, "publish failed (rc={rc})"),
            Self::SpinFailed(rc) => write!(f, "executor spin failed (rc={rc})"),
            Self::StaleHandle => write!(f, "stale entity handle"),
        }
    }
}

impl From<MiddlewareError> for Error {
    fn from(e: MiddlewareError) -> Self {
        Self::Middleware(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
