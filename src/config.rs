//! Instrument configuration
//!
//! Identity of the telemetry node, ADC wiring, calibration, and the
//! reconnect policy.  Defaults match the shipped hardware; a JSON override
//! can be baked in at build time through `FORCEGAUGE_CONFIG_JSON`.
//!
//! Loop timing is fixed and lives in the constants below, not in the
//! struct.

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::sensors::mcp3428::{AdcSettings, DEFAULT_ADDRESS};
use crate::sensors::signal::Scaling;

// --- Timing (fixed) ---

/// End-of-loop delay; bounds the tick rate.
pub const LOOP_PERIOD_MS: u32 = 500;
/// Nominal publish period of the telemetry timer.
pub const PUBLISH_PERIOD_MS: u32 = 500;
/// Upper bound on one agent reachability probe.
pub const AGENT_PROBE_TIMEOUT_MS: u32 = 100;
pub const AGENT_PROBE_ATTEMPTS: u8 = 1;
/// Time slice granted to the executor each connected tick.
pub const EXECUTOR_SPIN_BUDGET_MS: u32 = 100;

/// Capacity of the name/namespace/topic strings.
pub const NAME_CAPACITY: usize = 32;

pub type Name = String<NAME_CAPACITY>;

/// Core instrument configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    // --- Telemetry identity ---
    pub node_name: Name,
    /// Empty means the root namespace.
    pub namespace: Name,
    pub topic: Name,

    // --- ADC ---
    /// 7-bit I2C address of the MCP3428
    pub adc_address: u8,
    pub adc: AdcSettings,

    // --- Calibration ---
    pub scaling: Scaling,

    // --- Reconnect policy ---
    /// Longest probe pause (in ticks) after repeated entity-creation failures.
    /// 0 disables backoff.
    pub create_backoff_max_ticks: u32,
    /// Request a supervised restart after this many consecutive
    /// entity-creation failures.  0 = never.
    pub restart_after_failures: u32,
}

fn name(s: &str) -> Name {
    let mut n = Name::new();
    // Literals below are all shorter than NAME_CAPACITY.
    let _ = n.push_str(s);
    n
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            node_name: name("force_sensor_node"),
            namespace: Name::new(),
            topic: name("force_sensor_data"),

            adc_address: DEFAULT_ADDRESS,
            adc: AdcSettings::default(),

            scaling: Scaling::default(),

            create_backoff_max_ticks: 8,
            restart_after_failures: 0,
        }
    }
}

/// JSON override baked in at build time, if any.
pub const BUILD_OVERRIDE: Option<&str> = option_env!("FORCEGAUGE_CONFIG_JSON");

impl InstrumentConfig {
    /// Defaults, or `json` if it parses and validates.  A bad override is
    /// logged and ignored so the instrument still boots.
    pub fn with_override(json: Option<&str>) -> Self {
        let Some(json) = json else {
            return Self::default();
        };
        match Self::from_json(json.as_bytes()) {
            Ok(config) => {
                info!("Config: build-time override applied");
                config
            }
            Err(e) => {
                warn!("Config: override rejected ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse a JSON override.  Missing fields take their defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the firmware cannot run with.  Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_ros_name(&self.node_name) {
            return Err(ConfigError::ValidationFailed(
                "node_name must be non-empty [A-Za-z0-9_] not starting with a digit",
            ));
        }
        let mut segments = self.namespace.split('/').filter(|s| !s.is_empty());
        if !segments.all(is_ros_name) {
            return Err(ConfigError::ValidationFailed("namespace has an invalid segment"));
        }
        if !is_ros_name(self.topic.trim_start_matches('/')) {
            return Err(ConfigError::ValidationFailed("topic must be a valid name"));
        }
        if !(0x08..=0x77).contains(&self.adc_address) {
            return Err(ConfigError::ValidationFailed("adc_address outside 7-bit range"));
        }
        self.adc
            .config_byte()
            .map_err(|_| ConfigError::ValidationFailed("adc channel must be 1-4"))?;
        if self.create_backoff_max_ticks > 120 {
            return Err(ConfigError::ValidationFailed(
                "create_backoff_max_ticks above 120 (one minute)",
            ));
        }
        Ok(())
    }
}

fn is_ros_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
