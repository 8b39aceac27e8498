//! Integration tests for the InstrumentService tick pipeline:
//! link step → sample → render, against the simulated agent.

use super::mock_hw::{MockSensor, RecordingDisplay, RecordingSink};

use forcegauge::adapters::sim_agent::{FailPoint, SimAgent};
use forcegauge::app::events::AppEvent;
use forcegauge::app::ports::Color;
use forcegauge::app::service::{InstrumentService, TickReport};
use forcegauge::config::{InstrumentConfig, LOOP_PERIOD_MS};
use forcegauge::error::EntityStage;
use forcegauge::link::ConnectionState;

/// 6400 codes × 0.0625 mV = 400 mV → ≈ 5.62 N
const CODE_400_MV: i16 = 6400;

struct Rig {
    app: InstrumentService,
    mw: SimAgent,
    sensor: MockSensor,
    display: RecordingDisplay,
    sink: RecordingSink,
}

impl Rig {
    fn new(mw: SimAgent, sensor: MockSensor) -> Self {
        Self::with_config(InstrumentConfig::default(), mw, sensor)
    }

    fn with_config(config: InstrumentConfig, mw: SimAgent, sensor: MockSensor) -> Self {
        let mut rig = Self {
            app: InstrumentService::new(config),
            mw,
            sensor,
            display: RecordingDisplay::new(),
            sink: RecordingSink::new(),
        };
        rig.app.start(&mut rig.display, &mut rig.sink);
        rig
    }

    /// One loop iteration including the end-of-loop delay.
    fn tick(&mut self) -> TickReport {
        let report = self
            .app
            .tick(&mut self.mw, &mut self.sensor, &mut self.display, &mut self.sink);
        self.mw.advance_ms(LOOP_PERIOD_MS);
        report
    }

    fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }
}

#[test]
fn boot_shows_waiting_banner_and_announces_start() {
    let rig = Rig::new(SimAgent::absent(), MockSensor::reading(CODE_400_MV));
    assert_eq!(rig.display.last_lines(), vec!["Waiting for Agent..."]);
    assert_eq!(
        rig.sink.events.first(),
        Some(&AppEvent::Started(ConnectionState::WaitingForAgent))
    );
}

#[test]
fn agent_absent_display_still_updates_every_tick() {
    let mut rig = Rig::new(SimAgent::absent(), MockSensor::reading(CODE_400_MV));
    let boot_frames = rig.display.frame_count();

    for i in 1..=20 {
        let report = rig.tick();
        assert_eq!(report.link.to, ConnectionState::WaitingForAgent);
        assert!(report.sample.is_some());
        assert_eq!(rig.display.frame_count(), boot_frames + i);
        assert_eq!(
            rig.display.last_lines(),
            vec!["Waiting for Agent...", "5.62 N", "ADC: 400"]
        );
    }
    assert_eq!(rig.sensor.probes, 20);
    assert_eq!(rig.sensor.reads, 20);
    assert_eq!(rig.mw.probes(), 20);
    assert_eq!(rig.mw.live_entities(), 0);
}

#[test]
fn connects_then_publishes_latest_sample() {
    let mut rig = Rig::new(SimAgent::new(), MockSensor::reading(CODE_400_MV));

    assert_eq!(rig.tick().link.to, ConnectionState::AgentAvailable);
    let report = rig.tick();
    assert_eq!(report.link.to, ConnectionState::Connected);
    assert_eq!(rig.display.last_lines()[0], "ROS Connected!");
    assert_eq!(rig.display.last_color_of("ROS Connected!"), Some(Color::Green));

    // Timer is due after one loop period; the fire sends the previous tick's sample.
    let report = rig.tick();
    assert_eq!(report.link.spin.map(|s| s.published), Some(1));
    let published = rig.mw.published();
    assert_eq!(published.len(), 1);
    assert!((published[0] - 5.62).abs() < 0.01);
}

#[test]
fn latest_sample_wins() {
    let mut sensor = MockSensor::reading(CODE_400_MV);
    // 800 mV on the tick right before the fire.
    sensor.queue([CODE_400_MV, 12_800]);
    let mut rig = Rig::new(SimAgent::new(), sensor);
    rig.ticks(3);

    let expected = (800.0 - 185.0) * 20.0 / (950.0 - 185.0);
    let published = rig.mw.published();
    assert_eq!(published.len(), 1);
    assert!((published[0] - expected).abs() < 1e-3);
}

#[test]
fn disconnect_renders_status_and_tears_down_once() {
    let mut rig = Rig::new(SimAgent::new(), MockSensor::reading(CODE_400_MV));
    rig.ticks(3);
    assert_eq!(rig.app.link_state(), ConnectionState::Connected);

    rig.mw.set_reachable(false);
    let report = rig.tick();
    assert_eq!(report.link.to, ConnectionState::Disconnected);
    assert_eq!(rig.display.last_color_of("ROS Disconnected!"), Some(Color::Red));

    let report = rig.tick();
    assert_eq!(report.link.to, ConnectionState::WaitingForAgent);
    assert_eq!(rig.mw.sessions_closed(), 1);
    assert_eq!(rig.mw.live_entities(), 0);

    let changes: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::LinkChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes[changes.len() - 2..],
        [
            (ConnectionState::Connected, ConnectionState::Disconnected),
            (ConnectionState::Disconnected, ConnectionState::WaitingForAgent),
        ]
    );
}

#[test]
fn sensor_unplug_and_replug() {
    let mut rig = Rig::new(SimAgent::absent(), MockSensor::reading(CODE_400_MV));
    rig.tick();
    assert_eq!(rig.sensor.configured.len(), 1);

    rig.sensor.present = false;
    let report = rig.tick();
    assert!(!report.sensor_present);
    assert!(report.sample.is_none());
    assert_eq!(
        rig.display.last_lines(),
        vec!["Waiting for Agent...", "MCP3428 Disconnected!"]
    );
    assert_eq!(rig.display.last_color_of("MCP3428 Disconnected!"), Some(Color::White));
    rig.tick();

    rig.sensor.present = true;
    rig.tick();
    assert_eq!(rig.sensor.configured.len(), 2, "reconfigured on reappearance");

    let presence: Vec<bool> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::SensorPresence(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(presence, vec![true, false, true]);
}

#[test]
fn absent_sensor_skips_publish() {
    let mut rig = Rig::new(SimAgent::new(), MockSensor::absent());
    rig.ticks(3);
    assert_eq!(rig.app.link_state(), ConnectionState::Connected);
    assert!(rig.mw.published().is_empty());
}

#[test]
fn read_failure_forces_reconfigure() {
    let mut sensor = MockSensor::reading(CODE_400_MV);
    sensor.fail_reads = 1;
    let mut rig = Rig::new(SimAgent::absent(), sensor);

    let report = rig.tick();
    assert!(report.sensor_present);
    assert!(report.sample.is_none());
    assert_eq!(
        rig.display.last_lines(),
        vec!["Waiting for Agent...", "ADC read error"]
    );
    assert_eq!(rig.display.last_color_of("ADC read error"), Some(Color::Red));

    let report = rig.tick();
    assert!(report.sample.is_some());
    assert_eq!(rig.sensor.configured.len(), 2);
    assert_eq!(
        rig.display.last_lines(),
        vec!["Waiting for Agent...", "5.62 N", "ADC: 400"]
    );
}

#[test]
fn configure_failure_shows_read_error_not_disconnected() {
    let mut sensor = MockSensor::reading(CODE_400_MV);
    sensor.fail_configures = 1;
    let mut rig = Rig::new(SimAgent::absent(), sensor);

    let report = rig.tick();
    assert!(report.sensor_present);
    assert!(report.sample.is_none());
    assert_eq!(rig.sensor.reads, 0);
    assert_eq!(
        rig.display.last_lines(),
        vec!["Waiting for Agent...", "ADC read error"]
    );

    // Retried on the next tick.
    assert!(rig.tick().sample.is_some());
    assert_eq!(rig.sensor.configured.len(), 1);
}

#[test]
fn creation_failure_is_shown_and_reported() {
    let mut mw = SimAgent::new();
    mw.fail_next(FailPoint::Init(EntityStage::Publisher));
    let mut rig = Rig::new(mw, MockSensor::reading(CODE_400_MV));

    rig.tick();
    let report = rig.tick();
    assert_eq!(report.link.to, ConnectionState::WaitingForAgent);
    assert_eq!(rig.display.last_lines()[0], "Agent error, retrying");
    assert_eq!(rig.display.last_color_of("Agent error, retrying"), Some(Color::Red));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::EntityCreationFailed { attempt: 1, .. })),
        1
    );

    // Retries on its own and gets there.
    rig.ticks(2);
    assert_eq!(rig.app.link_state(), ConnectionState::Connected);
}

#[test]
fn repeated_failures_request_restart() {
    let mut config = InstrumentConfig::default();
    config.restart_after_failures = 3;
    config.create_backoff_max_ticks = 0;
    let mut mw = SimAgent::new();
    mw.fail_always(FailPoint::Init(EntityStage::Executor));
    let mut rig = Rig::with_config(config, mw, MockSensor::reading(CODE_400_MV));

    let mut restart_at = None;
    for i in 1..=10 {
        if rig.tick().restart_requested {
            restart_at = Some(i);
            break;
        }
    }
    assert_eq!(restart_at, Some(6));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::RestartRequested { failures: 3 })),
        1
    );
    assert_eq!(rig.mw.live_entities(), 0);

    rig.app.shutdown(&mut rig.mw);
    assert_eq!(rig.mw.stale_calls(), 0);
}

#[test]
fn telemetry_event_every_tick() {
    let mut rig = Rig::new(SimAgent::absent(), MockSensor::reading(CODE_400_MV));
    rig.ticks(5);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 5);
    assert_eq!(rig.app.tick_count(), 5);
}
