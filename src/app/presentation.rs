//! Screen composition.
//!
//! Every tick redraws the whole panel:
//!
//! ```text
//!  ┌──────────────────────────────┐
//!  │       ROS Connected!         │  h/8   status line (link)
//!  │                              │
//!  │          5.62 N              │  h/3   force, yellow
//!  │                              │
//!  │         ADC: 400             │  2h/3  millivolts, green
//!  └──────────────────────────────┘
//! ```
//!
//! With the ADC absent the two readout lines are replaced by a single
//! centred "MCP3428 Disconnected!"; with the ADC answering on the bus but
//! failing to configure or convert, by a red "ADC read error".  Text is made bold by overdrawing it at
//! four one-pixel offsets around the anchor.

use core::fmt::Write;

use heapless::String;

use super::ports::{Color, DisplayPort};
use crate::link::{ConnectionState, StepOutcome};
use crate::sensors::signal::Sample;

/// Scale of the readout lines and the boot banner.
pub const TEXT_SIZE: u8 = 2;
/// Scale of the link status line.
pub const STATUS_SIZE: u8 = 1;

const BOLD_OFFSETS: [(i32, i32); 5] = [(0, 0), (1, 0), (0, 1), (-1, 0), (0, -1)];

pub const SENSOR_ABSENT_TEXT: &str = "MCP3428 Disconnected!";
pub const READ_ERROR_TEXT: &str = "ADC read error";

/// What the readout area shows this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Readout<'a> {
    /// No ACK on the bus.
    Absent,
    /// ACKed, but configure or conversion failed.
    ReadError,
    Value(&'a Sample),
}

impl<'a> Readout<'a> {
    pub fn new(present: bool, sample: Option<&'a Sample>) -> Self {
        match (present, sample) {
            (false, _) => Self::Absent,
            (true, None) => Self::ReadError,
            (true, Some(s)) => Self::Value(s),
        }
    }
}

/// Draw `text` five times around (`x`, `y`) for a heavier stroke.
pub fn draw_bold<D: DisplayPort + ?Sized>(
    display: &mut D,
    text: &str,
    x: i32,
    y: i32,
    size: u8,
    color: Color,
) {
    for (dx, dy) in BOLD_OFFSETS {
        display.draw_text(text, x + dx, y + dy, size, color);
    }
}

/// What the status line says about the agent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    WaitingForAgent,
    AgentFound,
    Connected,
    Disconnected,
    /// Entity creation failed this tick; retry pending.
    AgentError,
}

impl LinkStatus {
    pub fn for_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::WaitingForAgent => Self::WaitingForAgent,
            ConnectionState::AgentAvailable => Self::AgentFound,
            ConnectionState::Connected => Self::Connected,
            ConnectionState::Disconnected => Self::Disconnected,
        }
    }

    /// A creation failure overrides the plain state for the tick it happens.
    pub fn for_step(outcome: &StepOutcome) -> Self {
        if outcome.creation_error.is_some() {
            Self::AgentError
        } else {
            Self::for_state(outcome.to)
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::WaitingForAgent => "Waiting for Agent...",
            Self::AgentFound => "Agent found",
            Self::Connected => "ROS Connected!",
            Self::Disconnected => "ROS Disconnected!",
            Self::AgentError => "Agent error, retrying",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::WaitingForAgent | Self::AgentFound => Color::White,
            Self::Connected => Color::Green,
            Self::Disconnected | Self::AgentError => Color::Red,
        }
    }
}

/// "5.62 N"
pub fn force_text(sample: &Sample) -> String<24> {
    let mut s = String::new();
    // Force never exceeds FULL_SCALE_LIMIT_N, so "#####.## N" always fits.
    let _ = write!(s, "{:.2} N", sample.force);
    s
}

/// "ADC: 400"; millivolts truncated toward zero.
pub fn adc_text(sample: &Sample) -> String<24> {
    let mut s = String::new();
    let _ = write!(s, "ADC: {}", sample.millivolts as i32);
    s
}

/// Boot banner shown before the first tick.
pub fn render_boot<D: DisplayPort + ?Sized>(display: &mut D) {
    let (cx, cy) = center(display);
    display.clear();
    draw_bold(
        display,
        LinkStatus::WaitingForAgent.text(),
        cx,
        cy,
        TEXT_SIZE,
        Color::White,
    );
}

/// Full frame for one tick.
pub fn render_frame<D: DisplayPort + ?Sized>(
    display: &mut D,
    status: LinkStatus,
    readout: Readout<'_>,
) {
    let (cx, cy) = center(display);
    let h = display.height() as i32;

    display.clear();
    draw_bold(display, status.text(), cx, h / 8, STATUS_SIZE, status.color());

    match readout {
        Readout::Value(s) => {
            draw_bold(display, &force_text(s), cx, h / 3, TEXT_SIZE, Color::Yellow);
            draw_bold(display, &adc_text(s), cx, h * 2 / 3, TEXT_SIZE, Color::Green);
        }
        Readout::ReadError => draw_bold(display, READ_ERROR_TEXT, cx, cy, TEXT_SIZE, Color::Red),
        Readout::Absent => draw_bold(display, SENSOR_ABSENT_TEXT, cx, cy, TEXT_SIZE, Color::White),
    }
}

fn center<D: DisplayPort + ?Sized>(display: &D) -> (i32, i32) {
    (display.width() as i32 / 2, display.height() as i32 / 2)
}
