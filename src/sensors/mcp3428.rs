//! Microchip MCP3428 4-channel 16-bit delta-sigma ADC driver.
//!
//! Generic over any `embedded-hal` 1.0 I2C bus and delay provider, so the
//! same driver runs on the ESP-IDF `I2cDriver` and on host mocks.
//!
//! ## Configuration register
//!
//! ```text
//!  bit  7     6  5    4     3  2    1  0
//!      RDY  C1 C0   O/C   S1 S0   G1 G0
//!       │     │      │      │       └── PGA gain  x1/x2/x4/x8
//!       │     │      │      └────────── 12/14/16-bit (240/60/15 SPS)
//!       │     │      └───────────────── 1 = continuous, 0 = one-shot
//!       │     └──────────────────────── channel 1..=4
//!       └────────────────────────────── write 1: start one-shot
//!                                       read 0: result is fresh
//! ```
//!
//! Output codes are big-endian and already sign-extended for 12/14-bit, so
//! every resolution decodes with `i16::from_be_bytes`.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;

/// Factory-default address with both address pins floating.
pub const DEFAULT_ADDRESS: u8 = 0x68;

const RDY_BIT: u8 = 0b1000_0000;
const CONTINUOUS_BIT: u8 = 0b0001_0000;

/// Interval between ready-bit polls once the nominal conversion time elapsed.
const POLL_INTERVAL_MS: u32 = 5;

/// Serialised as its bit count (12, 14, 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Resolution {
    Bits12,
    Bits14,
    Bits16,
}

impl Resolution {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            12 => Some(Self::Bits12),
            14 => Some(Self::Bits14),
            16 => Some(Self::Bits16),
            _ => None,
        }
    }

    fn rate_bits(self) -> u8 {
        match self {
            Self::Bits12 => 0b00,
            Self::Bits14 => 0b01,
            Self::Bits16 => 0b10,
        }
    }

    /// Nominal conversion time rounded up (240, 60, 15 SPS).
    pub fn conversion_ms(self) -> u32 {
        match self {
            Self::Bits12 => 5,
            Self::Bits14 => 17,
            Self::Bits16 => 67,
        }
    }

    /// LSB size at unity gain: 4.096 V / 2^N.
    fn lsb_mv(self) -> f32 {
        match self {
            Self::Bits12 => 1.0,
            Self::Bits14 => 0.25,
            Self::Bits16 => 0.0625,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Gain {
    X1,
    X2,
    X4,
    X8,
}

impl Gain {
    pub fn from_factor(factor: u8) -> Option<Self> {
        match factor {
            1 => Some(Self::X1),
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            8 => Some(Self::X8),
            _ => None,
        }
    }

    fn pga_bits(self) -> u8 {
        match self {
            Self::X1 => 0b00,
            Self::X2 => 0b01,
            Self::X4 => 0b10,
            Self::X8 => 0b11,
        }
    }

    fn factor(self) -> f32 {
        match self {
            Self::X1 => 1.0,
            Self::X2 => 2.0,
            Self::X4 => 4.0,
            Self::X8 => 8.0,
        }
    }
}

impl TryFrom<u8> for Resolution {
    type Error = &'static str;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(bits).ok_or("resolution must be 12, 14 or 16")
    }
}

impl From<Resolution> for u8 {
    fn from(r: Resolution) -> u8 {
        match r {
            Resolution::Bits12 => 12,
            Resolution::Bits14 => 14,
            Resolution::Bits16 => 16,
        }
    }
}

impl TryFrom<u8> for Gain {
    type Error = &'static str;

    fn try_from(factor: u8) -> Result<Self, Self::Error> {
        Self::from_factor(factor).ok_or("gain must be 1, 2, 4 or 8")
    }
}

impl From<Gain> for u8 {
    fn from(g: Gain) -> u8 {
        g.factor() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMode {
    OneShot,
    Continuous,
}

/// Channel, resolution, gain and mode for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdcSettings {
    /// Input channel, 1..=4.
    pub channel: u8,
    pub resolution: Resolution,
    pub gain: Gain,
    pub mode: ConversionMode,
}

impl Default for AdcSettings {
    fn default() -> Self {
        Self {
            channel: 1,
            resolution: Resolution::Bits16,
            gain: Gain::X1,
            mode: ConversionMode::OneShot,
        }
    }
}

impl AdcSettings {
    /// Encode into the configuration register (RDY bit clear).
    pub fn config_byte(&self) -> Result<u8, SensorError> {
        if !(1..=4).contains(&self.channel) {
            return Err(SensorError::InvalidSetting);
        }
        let mode = match self.mode {
            ConversionMode::Continuous => CONTINUOUS_BIT,
            ConversionMode::OneShot => 0,
        };
        Ok(((self.channel - 1) << 5)
            | mode
            | (self.resolution.rate_bits() << 2)
            | self.gain.pga_bits())
    }

    /// Millivolts represented by one output code.
    pub fn mv_per_code(&self) -> f32 {
        self.resolution.lsb_mv() / self.gain.factor()
    }
}

/// MCP3428 on an I2C bus.
pub struct Mcp3428<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    settings: AdcSettings,
}

impl<I2C: I2c, D: DelayNs> Mcp3428<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            settings: AdcSettings::default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn settings(&self) -> &AdcSettings {
        &self.settings
    }

    /// Address-only write; `true` if the device ACKs.
    pub fn probe(&mut self) -> bool {
        self.i2c.write(self.address, &[]).is_ok()
    }

    /// Write the configuration register.
    pub fn configure(&mut self, settings: AdcSettings) -> Result<(), SensorError> {
        let byte = settings.config_byte()?;
        self.i2c.write(self.address, &[byte]).map_err(|e| {
            warn!("MCP3428: config write failed: {:?}", e.kind());
            SensorError::Bus
        })?;
        self.settings = settings;
        debug!("MCP3428: configured 0x{:02x} ({:?})", byte, settings);
        Ok(())
    }

    /// Read one output code.
    ///
    /// In one-shot mode this starts a conversion, waits the nominal
    /// conversion time, then polls the ready bit for at most as long again.
    pub fn read_raw(&mut self) -> Result<i16, SensorError> {
        let byte = self.settings.config_byte()?;
        if self.settings.mode == ConversionMode::OneShot {
            self.i2c
                .write(self.address, &[byte | RDY_BIT])
                .map_err(|_| SensorError::Bus)?;
        }

        let conversion_ms = self.settings.resolution.conversion_ms();
        self.delay.delay_ms(conversion_ms);

        let max_polls = conversion_ms.div_ceil(POLL_INTERVAL_MS) + 1;
        let mut buf = [0u8; 3];
        for attempt in 0..max_polls {
            self.i2c
                .read(self.address, &mut buf)
                .map_err(|_| SensorError::Bus)?;
            if buf[2] & RDY_BIT == 0 {
                return Ok(i16::from_be_bytes([buf[0], buf[1]]));
            }
            if attempt + 1 < max_polls {
                self.delay.delay_ms(POLL_INTERVAL_MS);
            }
        }
        warn!("MCP3428: ready bit still set after {} polls", max_polls);
        Err(SensorError::ConversionTimeout)
    }

    /// Release the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}
