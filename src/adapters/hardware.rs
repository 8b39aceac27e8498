//! Hardware adapter: bridges the ADC driver to the domain sensor port.
//!
//! Generic over any `embedded-hal` 1.0 bus and delay, so the same adapter
//! runs on the ESP32 `I2cDriver` and on host test doubles.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::sensors::mcp3428::{AdcSettings, Mcp3428};

/// Force ADC exposed through [`SensorPort`].
pub struct HardwareAdapter<I2C, D> {
    adc: Mcp3428<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> HardwareAdapter<I2C, D> {
    pub fn new(adc: Mcp3428<I2C, D>) -> Self {
        Self { adc }
    }

    pub fn into_inner(self) -> Mcp3428<I2C, D> {
        self.adc
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I2C: I2c, D: DelayNs> SensorPort for HardwareAdapter<I2C, D> {
    fn probe(&mut self) -> bool {
        self.adc.probe()
    }

    fn configure(&mut self, settings: AdcSettings) -> Result<(), SensorError> {
        self.adc.configure(settings)
    }

    fn read_raw(&mut self) -> Result<i16, SensorError> {
        self.adc.read_raw()
    }
}
