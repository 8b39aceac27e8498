//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on target, stderr on host).

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => match (t.force, t.millivolts) {
                (Some(force), Some(mv)) => debug!(
                    "TELEM | tick={} | link={} | F={:.2}N | adc={:.1}mV | published={}",
                    t.tick, t.link, force, mv, t.published
                ),
                _ => debug!(
                    "TELEM | tick={} | link={} | sensor=absent | published={}",
                    t.tick, t.link, t.published
                ),
            },
            AppEvent::LinkChanged { from, to } => {
                info!("LINK  | {} -> {}", from, to);
            }
            AppEvent::EntityCreationFailed { error, attempt } => {
                warn!("LINK  | entity creation failed (attempt {}): {}", attempt, error);
            }
            AppEvent::RestartRequested { failures } => {
                error!("LINK  | restart requested after {} failures", failures);
            }
            AppEvent::SensorPresence(present) => {
                if *present {
                    info!("ADC   | MCP3428 present");
                } else {
                    warn!("ADC   | MCP3428 not responding");
                }
            }
            AppEvent::Started(state) => {
                info!("START | link={}", state);
            }
        }
    }
}
