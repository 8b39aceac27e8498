//! Application service: the hexagonal core.
//!
//! [`InstrumentService`] owns the link state machine, the signal chain and
//! the latest sample.  All I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!   SensorPort ──▶ ┌──────────────────────────┐ ──▶ DisplayPort
//!                  │    InstrumentService     │
//! MiddlewarePort ◀▶│  Link FSM · Signal chain │ ──▶ EventSink
//!                  └──────────────────────────┘
//! ```
//!
//! One [`tick`](InstrumentService::tick) is: link step, then sample, then
//! render.  The link step publishes the most recent sample (the one taken
//! on the previous tick) if its timer is due.  Sampling and rendering run
//! on every tick whatever the link is doing.

use log::{debug, info, warn};

use crate::config::InstrumentConfig;
use crate::link::{ConnectionState, ConnectionStateMachine, StepOutcome};
use crate::sensors::mcp3428::AdcSettings;
use crate::sensors::signal::{Sample, SignalProcessor};

use super::events::{AppEvent, TelemetryData};
use super::ports::{DisplayPort, EventSink, MiddlewarePort, SensorPort};
use super::presentation::{self, LinkStatus, Readout};

/// Result of one control-loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub link: StepOutcome,
    pub sensor_present: bool,
    pub sample: Option<Sample>,
    /// The caller should perform a supervised restart.
    pub restart_requested: bool,
}

/// The application service orchestrates all domain logic.
pub struct InstrumentService {
    link: ConnectionStateMachine,
    processor: SignalProcessor,
    adc: AdcSettings,
    /// `None` until the first presence probe.
    sensor_present: Option<bool>,
    /// ADC settings have been written since it last (re)appeared.
    adc_configured: bool,
    /// Last-write-wins; overwritten every tick.
    sample: Option<Sample>,
    tick_count: u64,
}

impl InstrumentService {
    pub fn new(config: InstrumentConfig) -> Self {
        let processor = SignalProcessor::new(config.scaling, config.adc.mv_per_code());
        let adc = config.adc;
        Self {
            link: ConnectionStateMachine::new(config),
            processor,
            adc,
            sensor_present: None,
            adc_configured: false,
            sample: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Show the boot banner and announce the initial state.
    pub fn start(&mut self, display: &mut impl DisplayPort, sink: &mut impl EventSink) {
        presentation::render_boot(display);
        sink.emit(&AppEvent::Started(self.link.state()));
        info!("InstrumentService started in {}", self.link.state());
    }

    /// Release network resources ahead of a restart.
    pub fn shutdown(&mut self, mw: &mut impl MiddlewarePort) {
        self.link.release(mw);
        info!("InstrumentService shut down");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: link step → sample → render.
    pub fn tick(
        &mut self,
        mw: &mut impl MiddlewarePort,
        sensor: &mut impl SensorPort,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) -> TickReport {
        self.tick_count = self.tick_count.wrapping_add(1);

        // 1. Link
        let outcome = self.link.step(mw, self.sample.as_ref());
        self.emit_link_events(&outcome, sink);

        // 2. Sample
        let present = self.acquire(sensor, sink);

        // 3. Render
        presentation::render_frame(
            display,
            LinkStatus::for_step(&outcome),
            Readout::new(present, self.sample.as_ref()),
        );

        sink.emit(&AppEvent::Telemetry(TelemetryData {
            tick: self.tick_count,
            link: outcome.to,
            sensor_present: present,
            force: self.sample.map(|s| s.force),
            millivolts: self.sample.map(|s| s.millivolts),
            published: outcome.spin.map_or(0, |r| r.published),
        }));

        TickReport {
            link: outcome,
            sensor_present: present,
            sample: self.sample,
            restart_requested: outcome.restart_requested,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn link_state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn link(&self) -> &ConnectionStateMachine {
        &self.link
    }

    pub fn sample(&self) -> Option<&Sample> {
        self.sample.as_ref()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn emit_link_events(&self, outcome: &StepOutcome, sink: &mut impl EventSink) {
        if outcome.changed() {
            sink.emit(&AppEvent::LinkChanged {
                from: outcome.from,
                to: outcome.to,
            });
        }
        if let Some(error) = outcome.creation_error {
            sink.emit(&AppEvent::EntityCreationFailed {
                error,
                attempt: self.link.consecutive_failures(),
            });
        }
        if outcome.restart_requested {
            sink.emit(&AppEvent::RestartRequested {
                failures: self.link.consecutive_failures(),
            });
        }
    }

    /// Probe, (re)configure if needed, read and convert.  Leaves
    /// `self.sample` as `None` on any failure.  Returns bus presence.
    fn acquire(&mut self, sensor: &mut impl SensorPort, sink: &mut impl EventSink) -> bool {
        let present = sensor.probe();
        if self.sensor_present != Some(present) {
            sink.emit(&AppEvent::SensorPresence(present));
            self.sensor_present = Some(present);
        }

        self.sample = None;
        if !present {
            self.adc_configured = false;
            return false;
        }

        if !self.adc_configured {
            match sensor.configure(self.adc) {
                Ok(()) => {
                    debug!("ADC configured: {:?}", self.adc);
                    self.adc_configured = true;
                }
                Err(e) => {
                    warn!("ADC configure failed: {}", e);
                    return true;
                }
            }
        }

        match sensor.read_raw() {
            Ok(raw) => self.sample = Some(self.processor.process(raw)),
            Err(e) => {
                warn!("ADC read failed: {}", e);
                self.adc_configured = false;
            }
        }
        true
    }
}
