//! ForceGauge Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   Mirrored<Panel> MicroRosClient  LogEventSink│
//! │  (SensorPort)      (DisplayPort)   (MiddlewarePort) (EventSink)│
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          InstrumentService (pure logic)                │    │
//! │  │  Link FSM · TelemetryEntities · SignalProcessor        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single cooperative loop: one service tick, feed the watchdog, sleep.
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::{Delay, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriverConfig, config::Config as SpiConfig};
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};
use mipidsi::Builder;
use mipidsi::interface::SpiInterface;
use mipidsi::models::ST7789;
use mipidsi::options::{ColorInversion, Orientation, Rotation};

use forcegauge::adapters::display::{GraphicsDisplay, Mirrored};
use forcegauge::adapters::hardware::HardwareAdapter;
use forcegauge::adapters::log_sink::LogEventSink;
use forcegauge::adapters::micro_ros::MicroRosClient;
use forcegauge::app::ports::DisplayPort;
use forcegauge::app::service::InstrumentService;
use forcegauge::config::{BUILD_OVERRIDE, InstrumentConfig, LOOP_PERIOD_MS};
use forcegauge::drivers::watchdog::Watchdog;
use forcegauge::pins;
use forcegauge::sensors::mcp3428::Mcp3428;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ForceGauge v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = InstrumentConfig::with_override(BUILD_OVERRIDE);
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => error!("Config: cannot serialise ({})", e),
    }

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_BAUD_HZ));
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        unsafe { AnyIOPin::new(pins::I2C_SDA_GPIO) },
        unsafe { AnyIOPin::new(pins::I2C_SCL_GPIO) },
        &i2c_config,
    )?;
    let adc = Mcp3428::new(i2c, Delay::new_default(), config.adc_address);
    info!(
        "MCP3428 on I2C0 (sda={}, scl={}) at 0x{:02x}",
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        config.adc_address
    );

    let spi = SpiDeviceDriver::new_single(
        peripherals.spi2,
        unsafe { AnyIOPin::new(pins::PANEL_SCLK_GPIO) },
        unsafe { AnyIOPin::new(pins::PANEL_MOSI_GPIO) },
        None::<AnyIOPin>,
        Some(unsafe { AnyIOPin::new(pins::PANEL_CS_GPIO) }),
        &SpiDriverConfig::new(),
        &SpiConfig::new().baudrate(Hertz(pins::PANEL_SPI_HZ)),
    )?;
    let dc = PinDriver::output(unsafe { AnyOutputPin::new(pins::PANEL_DC_GPIO) })?;
    let rst = PinDriver::output(unsafe { AnyOutputPin::new(pins::PANEL_RST_GPIO) })?;
    let mut backlight = PinDriver::output(unsafe { AnyOutputPin::new(pins::PANEL_BL_GPIO) })?;

    let mut spi_buffer = [0u8; 512];
    let panel = Builder::new(ST7789, SpiInterface::new(spi, dc, &mut spi_buffer))
        .display_size(pins::PANEL_NATIVE_WIDTH, pins::PANEL_NATIVE_HEIGHT)
        .display_offset(pins::PANEL_COLUMN_OFFSET, 0)
        .invert_colors(ColorInversion::Inverted)
        .orientation(Orientation::new().rotate(Rotation::Deg90))
        .reset_pin(rst)
        .init(&mut Delay::new_default())
        .map_err(|e| anyhow!("ST7789 init failed: {:?}", e))?;
    backlight.set_high()?;

    // ── 4. Adapters ───────────────────────────────────────────
    let mut sensor = HardwareAdapter::new(adc);
    let mut display = Mirrored::new(GraphicsDisplay::new(panel));
    if (display.width(), display.height()) != (pins::DISPLAY_WIDTH, pins::DISPLAY_HEIGHT) {
        warn!(
            "Panel reports {}x{}, layout expects {}x{}",
            display.width(),
            display.height(),
            pins::DISPLAY_WIDTH,
            pins::DISPLAY_HEIGHT
        );
    }
    info!("ST7789 on SPI2 ({}x{})", display.width(), display.height());
    let mut sink = LogEventSink::new();
    let mut middleware = MicroRosClient::new()?;
    let mut watchdog = Watchdog::new();

    // ── 5. Service ────────────────────────────────────────────
    let mut service = InstrumentService::new(config);
    service.start(&mut display, &mut sink);

    info!("System ready. Entering control loop ({} ms).", LOOP_PERIOD_MS);

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let report = service.tick(&mut middleware, &mut sensor, &mut display, &mut sink);
        watchdog.feed();

        if report.restart_requested {
            service.shutdown(&mut middleware);
            watchdog.restart("entity creation keeps failing");
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
