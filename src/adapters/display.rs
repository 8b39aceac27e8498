//! Display adapters.
//!
//! - [`GraphicsDisplay`] draws onto any `embedded-graphics` target with
//!   RGB565 pixels (SPI/parallel TFT drivers, framebuffers).
//! - [`LogDisplay`] mirrors each frame to the log.
//! - [`Mirrored`] drives a panel and the log mirror together; this is what
//!   the firmware runs with.

use core::fmt::Write as _;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_10X20};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use heapless::{String, Vec};
use log::{debug, info};

use crate::app::ports::{Color, DisplayPort};

fn rgb565(color: Color) -> Rgb565 {
    match color {
        Color::Black => Rgb565::BLACK,
        Color::White => Rgb565::WHITE,
        Color::Red => Rgb565::RED,
        Color::Green => Rgb565::GREEN,
        Color::Yellow => Rgb565::YELLOW,
    }
}

// ───────────────────────────────────────────────────────────────
// embedded-graphics panel
// ───────────────────────────────────────────────────────────────

/// [`DisplayPort`] over an `embedded-graphics` draw target.
///
/// Text size 1 uses the 6x10 font, anything larger the 10x20 font.
pub struct GraphicsDisplay<D> {
    target: D,
    errors: u32,
}

impl<D> GraphicsDisplay<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    pub fn new(target: D) -> Self {
        Self { target, errors: 0 }
    }

    /// Draw calls the target rejected.
    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn into_inner(self) -> D {
        self.target
    }

    fn note<T>(&mut self, r: Result<T, D::Error>) {
        if let Err(e) = r {
            self.errors = self.errors.wrapping_add(1);
            debug!("Display draw failed: {:?}", e);
        }
    }
}

impl<D> DisplayPort for GraphicsDisplay<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    fn clear(&mut self) {
        let r = self.target.clear(Rgb565::BLACK);
        self.note(r);
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: u8, color: Color) {
        let font = if size <= 1 { &FONT_6X10 } else { &FONT_10X20 };
        let character_style = MonoTextStyle::new(font, rgb565(color));
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        let r = Text::with_text_style(text, Point::new(x, y), character_style, text_style)
            .draw(&mut self.target);
        self.note(r);
    }

    fn width(&self) -> u32 {
        self.target.bounding_box().size.width
    }

    fn height(&self) -> u32 {
        self.target.bounding_box().size.height
    }
}

// ───────────────────────────────────────────────────────────────
// Console mirror
// ───────────────────────────────────────────────────────────────

const MAX_LINES: usize = 4;

type Line = String<32>;

/// Logs a frame when it differs from the previous one.  A frame is
/// everything drawn between two `clear()` calls; bold overdraw collapses
/// to one line.
pub struct LogDisplay {
    width: u32,
    height: u32,
    frame: Vec<Line, MAX_LINES>,
    shown: Vec<Line, MAX_LINES>,
}

impl LogDisplay {
    /// Geometry of the panel being mirrored.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: Vec::new(),
            shown: Vec::new(),
        }
    }

    /// Lines of the frame being drawn.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.frame.iter().map(|l| l.as_str())
    }

    /// Emit the pending frame if it changed.
    pub fn flush(&mut self) {
        if self.frame.is_empty() || self.frame == self.shown {
            return;
        }
        let mut out: String<160> = String::new();
        for (i, line) in self.frame.iter().enumerate() {
            if i > 0 {
                let _ = out.push_str(" | ");
            }
            let _ = out.push_str(line);
        }
        info!("LCD   | {}", out);
        self.shown = self.frame.clone();
    }
}

impl DisplayPort for LogDisplay {
    fn clear(&mut self) {
        self.flush();
        self.frame.clear();
    }

    fn draw_text(&mut self, text: &str, _x: i32, _y: i32, _size: u8, _color: Color) {
        if self.frame.iter().any(|l| l.as_str() == text) {
            return;
        }
        let mut line = Line::new();
        // Longer text is truncated at capacity.
        for c in text.chars() {
            if line.write_char(c).is_err() {
                break;
            }
        }
        let _ = self.frame.push(line);
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ───────────────────────────────────────────────────────────────
// Panel + console
// ───────────────────────────────────────────────────────────────

/// Forwards every call to a panel and to a [`LogDisplay`] of the same
/// geometry.
pub struct Mirrored<P> {
    panel: P,
    log: LogDisplay,
}

impl<P: DisplayPort> Mirrored<P> {
    pub fn new(panel: P) -> Self {
        let log = LogDisplay::new(panel.width(), panel.height());
        Self { panel, log }
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn log(&self) -> &LogDisplay {
        &self.log
    }
}

impl<P: DisplayPort> DisplayPort for Mirrored<P> {
    fn clear(&mut self) {
        self.panel.clear();
        self.log.clear();
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: u8, color: Color) {
        self.panel.draw_text(text, x, y, size, color);
        self.log.draw_text(text, x, y, size, color);
    }

    fn width(&self) -> u32 {
        self.panel.width()
    }

    fn height(&self) -> u32 {
        self.panel.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::presentation::{self, LinkStatus, Readout};
    use embedded_graphics::mock_display::MockDisplay;
    use embedded_graphics::primitives::Rectangle;

    /// Panel whose bus rejects every transfer.
    struct DeadPanel;

    #[derive(Debug)]
    struct BusFault;

    impl Dimensions for DeadPanel {
        fn bounding_box(&self) -> Rectangle {
            Rectangle::new(Point::zero(), Size::new(320, 170))
        }
    }

    impl DrawTarget for DeadPanel {
        type Color = Rgb565;
        type Error = BusFault;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Err(BusFault)
        }
    }

    fn mock() -> MockDisplay<Rgb565> {
        let mut d = MockDisplay::new();
        d.set_allow_overdraw(true);
        d.set_allow_out_of_bounds_drawing(true);
        d
    }

    fn has_pixel(d: &MockDisplay<Rgb565>, color: Rgb565) -> bool {
        (0..64).any(|y| (0..64).any(|x| d.get_pixel(Point::new(x, y)) == Some(color)))
    }

    #[test]
    fn draws_text_in_requested_colour() {
        let mut d = GraphicsDisplay::new(mock());
        d.draw_text("8", 32, 32, 1, Color::Yellow);
        assert!(has_pixel(d.target(), Rgb565::YELLOW));
        assert!(!has_pixel(d.target(), Rgb565::RED));
        assert_eq!(d.errors(), 0);
    }

    #[test]
    fn clear_paints_black() {
        let mut d = GraphicsDisplay::new(mock());
        d.draw_text("8", 32, 32, 2, Color::Green);
        d.clear();
        assert!(!has_pixel(d.target(), Rgb565::GREEN));
        assert_eq!(d.target().get_pixel(Point::new(0, 0)), Some(Rgb565::BLACK));
    }

    #[test]
    fn geometry_comes_from_target() {
        let d = GraphicsDisplay::new(mock());
        assert_eq!((d.width(), d.height()), (64, 64));
    }

    #[test]
    fn log_display_collapses_bold_overdraw() {
        let mut d = LogDisplay::new(320, 240);
        presentation::render_frame(&mut d, LinkStatus::WaitingForAgent, Readout::Absent);
        let lines: std::vec::Vec<_> = d.lines().collect();
        assert_eq!(lines, vec!["Waiting for Agent...", "MCP3428 Disconnected!"]);
    }

    #[test]
    fn log_display_truncates_long_text() {
        let mut d = LogDisplay::new(320, 240);
        d.draw_text("0123456789012345678901234567890123456789", 0, 0, 1, Color::White);
        assert_eq!(d.lines().next().map(str::len), Some(32));
    }

    #[test]
    fn rejected_draws_are_counted_not_fatal() {
        let mut d = GraphicsDisplay::new(DeadPanel);
        d.clear();
        d.draw_text("ROS Connected!", 160, 20, 1, Color::Green);
        assert_eq!(d.errors(), 2);
        assert_eq!((d.width(), d.height()), (320, 170));
    }

    #[test]
    fn mirrored_draws_on_panel_and_log() {
        let mut d = Mirrored::new(GraphicsDisplay::new(mock()));
        assert_eq!((d.width(), d.height()), (64, 64));
        presentation::render_frame(&mut d, LinkStatus::Connected, Readout::ReadError);
        assert!(has_pixel(d.panel().target(), Rgb565::RED));
        let lines: std::vec::Vec<_> = d.log().lines().collect();
        assert_eq!(lines, vec!["ROS Connected!", "ADC read error"]);
    }
}
