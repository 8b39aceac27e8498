//! Agent link lifecycle.
//!
//! ```text
//!                 probe ok                 create ok
//!  WaitingForAgent ───────▶ AgentAvailable ─────────▶ Connected ◀─┐
//!        ▲   ▲                    │ create failed        │   │    │ probe ok:
//!        │   └────────────────────┘ (backoff)            │   └────┘ spin executor
//!        │                                   probe failed│
//!        └──────────────── Disconnected ◀────────────────┘
//!            destroy entities
//! ```
//!
//! The session is a tagged enum: the entity bundle lives *inside* the
//! `Connected` and `Disconnected` variants, so it cannot exist in any other
//! state and cannot be dropped without going through the teardown arm.
//! `Disconnected` lasts exactly one step; the bundle is only held there
//! until that step destroys it, it is never spun or published from.

pub mod entities;

use core::fmt;
use core::mem;

use log::{debug, error, info, warn};

use crate::app::ports::MiddlewarePort;
use crate::config::{AGENT_PROBE_ATTEMPTS, AGENT_PROBE_TIMEOUT_MS, InstrumentConfig};
use crate::error::Error;
use crate::sensors::signal::Sample;
use entities::{SpinReport, TelemetryEntities};

/// Observable lifecycle state of the agent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    WaitingForAgent = 0,
    AgentAvailable = 1,
    Connected = 2,
    Disconnected = 3,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::WaitingForAgent => "WaitingForAgent",
            Self::AgentAvailable => "AgentAvailable",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Session {
    /// `cooldown` ticks of probing left to skip.
    Waiting { cooldown: u32 },
    Available,
    Connected(TelemetryEntities),
    Disconnected(TelemetryEntities),
}

impl Session {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Waiting { .. } => ConnectionState::WaitingForAgent,
            Self::Available => ConnectionState::AgentAvailable,
            Self::Connected(_) => ConnectionState::Connected,
            Self::Disconnected(_) => ConnectionState::Disconnected,
        }
    }
}

/// What one [`ConnectionStateMachine::step`] did.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub from: ConnectionState,
    pub to: ConnectionState,
    /// Probe result, if a probe was issued this step.
    pub probe: Option<bool>,
    /// Executor slice result while connected.
    pub spin: Option<SpinReport>,
    /// Entity-set creation failed this step.
    pub creation_error: Option<Error>,
    /// Consecutive creation failures reached the configured restart limit.
    pub restart_requested: bool,
}

impl StepOutcome {
    fn new(from: ConnectionState) -> Self {
        Self {
            from,
            to: from,
            probe: None,
            spin: None,
            creation_error: None,
            restart_requested: false,
        }
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Sole owner of the link state and the telemetry entities.
pub struct ConnectionStateMachine {
    session: Session,
    config: InstrumentConfig,
    consecutive_failures: u32,
    sessions_established: u32,
    steps: u64,
}

impl ConnectionStateMachine {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            session: Session::Waiting { cooldown: 0 },
            config,
            consecutive_failures: 0,
            sessions_established: 0,
            steps: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Entities exist and are being serviced (spun, published from).
    pub fn entities_active(&self) -> bool {
        matches!(self.session, Session::Connected(_))
    }

    /// Entities exist, including the one step they wait for teardown.
    pub fn entities_held(&self) -> bool {
        matches!(self.session, Session::Connected(_) | Session::Disconnected(_))
    }

    /// Value most recently handed to the publisher, while connected.
    pub fn outgoing(&self) -> Option<f32> {
        match &self.session {
            Session::Connected(set) => Some(set.outgoing()),
            _ => None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Number of times `Connected` has been entered.
    pub fn sessions_established(&self) -> u32 {
        self.sessions_established
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance by one tick.  `current` is the sample a due timer will publish.
    pub fn step<M: MiddlewarePort>(&mut self, mw: &mut M, current: Option<&Sample>) -> StepOutcome {
        self.steps = self.steps.wrapping_add(1);
        let mut outcome = StepOutcome::new(self.state());

        let session = mem::replace(&mut self.session, Session::Waiting { cooldown: 0 });
        self.session = match session {
            Session::Waiting { cooldown } if cooldown > 0 => {
                debug!("Probe deferred, {} tick(s) of backoff left", cooldown);
                Session::Waiting {
                    cooldown: cooldown - 1,
                }
            }
            Session::Waiting { .. } => {
                let reachable = mw.ping_agent(AGENT_PROBE_TIMEOUT_MS, AGENT_PROBE_ATTEMPTS);
                outcome.probe = Some(reachable);
                if reachable {
                    Session::Available
                } else {
                    Session::Waiting { cooldown: 0 }
                }
            }
            Session::Available => match TelemetryEntities::create(mw, &self.config) {
                Ok(set) => {
                    self.consecutive_failures = 0;
                    self.sessions_established = self.sessions_established.wrapping_add(1);
                    Session::Connected(set)
                }
                Err(e) => {
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    let cooldown = self.backoff_ticks();
                    warn!(
                        "Entity creation failed ({}), attempt {}, next probe in {} tick(s)",
                        e,
                        self.consecutive_failures,
                        cooldown + 1
                    );
                    outcome.creation_error = Some(e);
                    let limit = self.config.restart_after_failures;
                    if limit > 0 && self.consecutive_failures >= limit {
                        error!(
                            "{} consecutive entity creation failures, requesting restart",
                            self.consecutive_failures
                        );
                        outcome.restart_requested = true;
                    }
                    Session::Waiting { cooldown }
                }
            },
            Session::Connected(mut set) => {
                let reachable = mw.ping_agent(AGENT_PROBE_TIMEOUT_MS, AGENT_PROBE_ATTEMPTS);
                outcome.probe = Some(reachable);
                if reachable {
                    match set.spin(mw, current) {
                        Ok(report) => outcome.spin = Some(report),
                        Err(e) => warn!("Executor spin failed: {}", e),
                    }
                    Session::Connected(set)
                } else {
                    Session::Disconnected(set)
                }
            }
            Session::Disconnected(set) => {
                set.destroy(mw);
                Session::Waiting { cooldown: 0 }
            }
        };

        outcome.to = self.state();
        if outcome.changed() {
            info!("LINK transition: {} -> {}", outcome.from, outcome.to);
        }
        outcome
    }

    /// Tear down any held entities and return to `WaitingForAgent`.
    /// Used before a supervised restart.
    pub fn release<M: MiddlewarePort>(&mut self, mw: &mut M) {
        let session = mem::replace(&mut self.session, Session::Waiting { cooldown: 0 });
        if let Session::Connected(set) | Session::Disconnected(set) = session {
            set.destroy(mw);
        }
    }

    /// Ticks to skip probing after the current run of creation failures:
    /// 1, 2, 4, … capped at `create_backoff_max_ticks`, minus the tick
    /// that returns to `WaitingForAgent`.
    fn backoff_ticks(&self) -> u32 {
        let n = self.consecutive_failures;
        if n == 0 {
            return 0;
        }
        let exp = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
        exp.min(self.config.create_backoff_max_ticks).saturating_sub(1)
    }
}
