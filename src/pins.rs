//! GPIO / peripheral pin assignments for the force gauge board.
//!
//! Single source of truth: drivers reference this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I²C bus (MCP3428 ADC)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
/// Standard-mode is plenty for one 3-byte read per tick.
pub const I2C_BAUD_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// UART (micro-ROS serial transport to the agent)
// ---------------------------------------------------------------------------

/// UART1; the log console stays on USB-Serial-JTAG so it never
/// interleaves with XRCE-DDS frames.
pub const AGENT_UART_PORT: i32 = 1;
pub const AGENT_UART_TX_GPIO: i32 = 17;
pub const AGENT_UART_RX_GPIO: i32 = 18;
pub const AGENT_UART_BAUD: i32 = 115_200;

// ---------------------------------------------------------------------------
// SPI panel (ST7789, 1.9" 170x320 IPS)
// ---------------------------------------------------------------------------

pub const PANEL_SCLK_GPIO: i32 = 12;
pub const PANEL_MOSI_GPIO: i32 = 11;
pub const PANEL_CS_GPIO: i32 = 10;
pub const PANEL_DC_GPIO: i32 = 13;
pub const PANEL_RST_GPIO: i32 = 14;
/// Active high.
pub const PANEL_BL_GPIO: i32 = 15;
pub const PANEL_SPI_HZ: u32 = 40_000_000;

/// Native (portrait) size; the panel is rotated 90° at init.
pub const PANEL_NATIVE_WIDTH: u16 = 170;
pub const PANEL_NATIVE_HEIGHT: u16 = 320;
/// The 170 visible columns sit in the middle of the controller's 240.
pub const PANEL_COLUMN_OFFSET: u16 = 35;

/// Landscape geometry after rotation.
pub const DISPLAY_WIDTH: u32 = 320;
pub const DISPLAY_HEIGHT: u32 = 170;
