//! Mock adapters for integration tests.
//!
//! Record every port call so tests can assert on the full history without
//! touching a real I2C bus or panel.

use std::collections::VecDeque;

use forcegauge::app::events::AppEvent;
use forcegauge::app::ports::{Color, DisplayPort, EventSink, SensorPort};
use forcegauge::error::SensorError;
use forcegauge::sensors::mcp3428::AdcSettings;

// ── MockSensor ────────────────────────────────────────────────

pub struct MockSensor {
    pub present: bool,
    /// Codes served by `read_raw`; the last one repeats.
    pub codes: VecDeque<i16>,
    last_code: i16,
    pub fail_reads: u32,
    pub fail_configures: u32,
    pub probes: u32,
    pub configured: Vec<AdcSettings>,
    pub reads: u32,
}

#[allow(dead_code)]
impl MockSensor {
    /// A present ADC that always reads `code`.
    pub fn reading(code: i16) -> Self {
        Self {
            present: true,
            codes: VecDeque::new(),
            last_code: code,
            fail_reads: 0,
            fail_configures: 0,
            probes: 0,
            configured: Vec::new(),
            reads: 0,
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::reading(0)
        }
    }

    pub fn queue(&mut self, codes: impl IntoIterator<Item = i16>) {
        self.codes.extend(codes);
    }
}

impl SensorPort for MockSensor {
    fn probe(&mut self) -> bool {
        self.probes += 1;
        self.present
    }

    fn configure(&mut self, settings: AdcSettings) -> Result<(), SensorError> {
        if !self.present {
            return Err(SensorError::NotPresent);
        }
        if self.fail_configures > 0 {
            self.fail_configures -= 1;
            return Err(SensorError::Bus);
        }
        self.configured.push(settings);
        Ok(())
    }

    fn read_raw(&mut self) -> Result<i16, SensorError> {
        if !self.present {
            return Err(SensorError::NotPresent);
        }
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(SensorError::ConversionTimeout);
        }
        self.reads += 1;
        if let Some(code) = self.codes.pop_front() {
            self.last_code = code;
        }
        Ok(self.last_code)
    }
}

// ── RecordingDisplay ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DrawnText {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub size: u8,
    pub color: Color,
}

/// Keeps every frame (draws between two clears).
pub struct RecordingDisplay {
    pub frames: Vec<Vec<DrawnText>>,
}

#[allow(dead_code)]
impl RecordingDisplay {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Distinct strings of the latest frame, in draw order.
    pub fn last_lines(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(frame) = self.frames.last() {
            for t in frame {
                if !out.contains(&t.text.as_str()) {
                    out.push(&t.text);
                }
            }
        }
        out
    }

    pub fn last_color_of(&self, text: &str) -> Option<Color> {
        self.frames
            .last()?
            .iter()
            .find(|t| t.text == text)
            .map(|t| t.color)
    }
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayPort for RecordingDisplay {
    fn clear(&mut self) {
        self.frames.push(Vec::new());
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: u8, color: Color) {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.push(DrawnText {
                text: text.to_string(),
                x,
                y,
                size,
                color,
            });
        }
    }

    fn width(&self) -> u32 {
        320
    }

    fn height(&self) -> u32 {
        240
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}
