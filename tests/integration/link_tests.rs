//! Link state machine scenarios against the simulated agent.

use forcegauge::adapters::sim_agent::SimAgent;
use forcegauge::config::{EXECUTOR_SPIN_BUDGET_MS, InstrumentConfig, PUBLISH_PERIOD_MS};
use forcegauge::link::entities::TelemetryEntities;
use forcegauge::link::{ConnectionState, ConnectionStateMachine};
use forcegauge::sensors::signal::{DEFAULT_SCALING, SignalProcessor};

use ConnectionState::*;

fn machine() -> ConnectionStateMachine {
    ConnectionStateMachine::new(InstrumentConfig::default())
}

#[test]
fn probe_sequence_fail_fail_ok_reaches_connected() {
    let mut mw = SimAgent::absent();
    mw.script_probes([false, false, true]);
    let mut m = machine();

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(m.step(&mut mw, None).to);
    }
    assert_eq!(seen, vec![WaitingForAgent, WaitingForAgent, AgentAvailable, Connected]);
}

#[test]
fn agent_available_resolves_within_one_step() {
    let mut mw = SimAgent::new();
    let mut m = machine();
    m.step(&mut mw, None);
    assert_eq!(m.state(), AgentAvailable);
    let next = m.step(&mut mw, None).to;
    assert!(matches!(next, Connected | WaitingForAgent));
}

#[test]
fn many_cycles_leave_no_residue() {
    let mut mw = SimAgent::new();
    let mut m = machine();

    for cycle in 1..=5 {
        mw.set_reachable(true);
        while m.state() != Connected {
            m.step(&mut mw, None);
        }
        assert_eq!(mw.live_entities(), 5);
        assert_eq!(mw.topics(), vec!["force_sensor_data".to_string()]);
        assert_eq!(mw.live_timers(), 1);

        mw.set_reachable(false);
        m.step(&mut mw, None);
        m.step(&mut mw, None);
        assert_eq!(m.state(), WaitingForAgent);
        assert_eq!(mw.live_entities(), 0);
        assert_eq!(mw.sessions_closed(), cycle);
    }
    assert_eq!(m.sessions_established(), 5);
    assert_eq!(mw.stale_calls(), 0);
}

#[test]
fn publish_cadence_follows_timer_not_loop() {
    let mut mw = SimAgent::new();
    let mut m = machine();
    m.step(&mut mw, None);
    m.step(&mut mw, None);

    let p = SignalProcessor::new(DEFAULT_SCALING, 0.0625);
    let sample = p.process(6400);

    // Ticks of a quarter publish period, spin slice included: one publish
    // per four ticks.
    for _ in 0..16 {
        mw.advance_ms(PUBLISH_PERIOD_MS / 4 - EXECUTOR_SPIN_BUDGET_MS);
        m.step(&mut mw, Some(&sample));
    }
    assert_eq!(mw.published().len(), 4);
}

#[test]
fn entities_built_directly_share_the_same_contract() {
    let mut mw = SimAgent::new();
    let config = InstrumentConfig::default();
    let a = TelemetryEntities::create(&mut mw, &config).unwrap();
    a.destroy(&mut mw);
    let b = TelemetryEntities::create(&mut mw, &config).unwrap();
    assert_eq!(mw.topics().len(), 1);
    b.destroy(&mut mw);
    assert_eq!(mw.live_entities(), 0);
}
