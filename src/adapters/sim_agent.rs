//! Simulated micro-ROS client and agent for host builds.
//!
//! Implements [`MiddlewarePort`] entirely in memory so the link state
//! machine and the control loop can be exercised without a serial agent.
//!
//! - Reachability is a flag, optionally overridden by a scripted sequence
//!   of probe outcomes.
//! - Time is virtual: [`SimAgent::advance_ms`] moves every timer forward,
//!   and `spin_executor` advances time up to its budget or until the next
//!   timer is due, whichever comes first.
//! - Every handle is unique across sessions, so reusing a handle after
//!   teardown is detected and counted instead of silently succeeding.
//! - Failures can be injected one-shot or persistently per [`FailPoint`].

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};

use crate::app::ports::{
    ExecutorHandle, MiddlewarePort, NodeHandle, PublisherHandle, SupportHandle, TimerFires,
    TimerHandle,
};
use crate::error::{EntityStage, MiddlewareError};

/// Where to inject a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Init(EntityStage),
    Publish,
    Spin,
}

#[derive(Debug)]
struct SimTimer {
    period_ms: u32,
    elapsed_ms: u32,
}

/// In-memory middleware substrate.
#[derive(Debug, Default)]
pub struct SimAgent {
    reachable: bool,
    probe_script: VecDeque<bool>,
    probes: u32,

    next_id: u32,
    live: HashSet<u32>,
    topics: HashMap<u32, String>,
    timers: HashMap<u32, SimTimer>,
    executors: HashMap<u32, u32>,

    fail_once: Vec<FailPoint>,
    fail_always: Vec<FailPoint>,

    published: Vec<f32>,
    sessions_opened: u32,
    sessions_closed: u32,
    stale_calls: u32,
}

impl SimAgent {
    /// An agent that is reachable and accepts everything.
    pub fn new() -> Self {
        Self {
            reachable: true,
            next_id: 1,
            ..Self::default()
        }
    }

    /// An agent that never answers probes.
    pub fn absent() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Queue probe outcomes; consumed before falling back to the flag.
    pub fn script_probes(&mut self, outcomes: impl IntoIterator<Item = bool>) {
        self.probe_script.extend(outcomes);
    }

    pub fn fail_next(&mut self, point: FailPoint) {
        self.fail_once.push(point);
    }

    pub fn fail_always(&mut self, point: FailPoint) {
        self.fail_always.push(point);
    }

    pub fn clear_failures(&mut self) {
        self.fail_once.clear();
        self.fail_always.clear();
    }

    /// Move every timer forward by `ms` of wall time.
    pub fn advance_ms(&mut self, ms: u32) {
        for t in self.timers.values_mut() {
            t.elapsed_ms = t.elapsed_ms.saturating_add(ms);
        }
    }

    /// Handles currently alive across all kinds.
    pub fn live_entities(&self) -> usize {
        self.live.len()
    }

    /// Topics with a live publisher.
    pub fn topics(&self) -> Vec<String> {
        self.topics.values().cloned().collect()
    }

    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    /// Values the agent received, in order.
    pub fn published(&self) -> &[f32] {
        &self.published
    }

    pub fn probes(&self) -> u32 {
        self.probes
    }

    /// Successful `init_support` calls.
    pub fn sessions_opened(&self) -> u32 {
        self.sessions_opened
    }

    /// `fini_support` calls on a live support handle.
    pub fn sessions_closed(&self) -> u32 {
        self.sessions_closed
    }

    /// Calls that referenced a handle which was not alive.
    pub fn stale_calls(&self) -> u32 {
        self.stale_calls
    }

    // ── Internal ──────────────────────────────────────────────

    fn should_fail(&mut self, point: FailPoint) -> bool {
        if self.fail_always.contains(&point) {
            return true;
        }
        if let Some(i) = self.fail_once.iter().position(|p| *p == point) {
            self.fail_once.remove(i);
            return true;
        }
        false
    }

    fn init(&mut self, stage: EntityStage) -> Result<u32, MiddlewareError> {
        if self.should_fail(FailPoint::Init(stage)) {
            debug!("SimAgent: injected {} init failure", stage);
            return Err(MiddlewareError::InitFailed { stage, code: 1 });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        Ok(id)
    }

    fn check_live(&mut self, id: u32) -> Result<(), MiddlewareError> {
        if self.live.contains(&id) {
            Ok(())
        } else {
            self.stale_calls += 1;
            Err(MiddlewareError::StaleHandle)
        }
    }

    fn release(&mut self, id: u32, what: &str) -> bool {
        if self.live.remove(&id) {
            true
        } else {
            warn!("SimAgent: fini of dead {} handle {}", what, id);
            self.stale_calls += 1;
            false
        }
    }
}

impl MiddlewarePort for SimAgent {
    fn ping_agent(&mut self, _timeout_ms: u32, _attempts: u8) -> bool {
        self.probes += 1;
        self.probe_script.pop_front().unwrap_or(self.reachable)
    }

    fn init_support(&mut self) -> Result<SupportHandle, MiddlewareError> {
        let id = self.init(EntityStage::Support)?;
        self.sessions_opened += 1;
        Ok(SupportHandle(id))
    }

    fn init_node(
        &mut self,
        support: SupportHandle,
        _name: &str,
        _namespace: &str,
    ) -> Result<NodeHandle, MiddlewareError> {
        self.check_live(support.0)?;
        self.init(EntityStage::Node).map(NodeHandle)
    }

    fn init_publisher(
        &mut self,
        node: NodeHandle,
        topic: &str,
    ) -> Result<PublisherHandle, MiddlewareError> {
        self.check_live(node.0)?;
        let id = self.init(EntityStage::Publisher)?;
        self.topics.insert(id, topic.to_string());
        Ok(PublisherHandle(id))
    }

    fn init_timer(
        &mut self,
        support: SupportHandle,
        period_ms: u32,
    ) -> Result<TimerHandle, MiddlewareError> {
        self.check_live(support.0)?;
        let id = self.init(EntityStage::Timer)?;
        self.timers.insert(
            id,
            SimTimer {
                period_ms,
                elapsed_ms: 0,
            },
        );
        Ok(TimerHandle(id))
    }

    fn init_executor(
        &mut self,
        support: SupportHandle,
        timer: TimerHandle,
    ) -> Result<ExecutorHandle, MiddlewareError> {
        self.check_live(support.0)?;
        self.check_live(timer.0)?;
        let id = self.init(EntityStage::Executor)?;
        self.executors.insert(id, timer.0);
        Ok(ExecutorHandle(id))
    }

    fn publish(&mut self, publisher: PublisherHandle, value: f32) -> Result<(), MiddlewareError> {
        self.check_live(publisher.0)?;
        if self.should_fail(FailPoint::Publish) || !self.reachable {
            return Err(MiddlewareError::PublishFailed(1));
        }
        self.published.push(value);
        Ok(())
    }

    fn spin_executor(
        &mut self,
        executor: ExecutorHandle,
        budget_ms: u32,
    ) -> Result<TimerFires, MiddlewareError> {
        self.check_live(executor.0)?;
        if self.should_fail(FailPoint::Spin) {
            return Err(MiddlewareError::SpinFailed(1));
        }
        let mut fires = TimerFires::new();
        let Some(&timer_id) = self.executors.get(&executor.0) else {
            return Ok(fires);
        };
        if let Some(t) = self.timers.get_mut(&timer_id) {
            let step = budget_ms.min(t.period_ms.saturating_sub(t.elapsed_ms));
            t.elapsed_ms += step;
            if t.period_ms > 0 && t.elapsed_ms >= t.period_ms {
                t.elapsed_ms = (t.elapsed_ms - t.period_ms) % t.period_ms;
                // Capacity is MAX_TIMER_FIRES; one fire per spin cannot overflow.
                let _ = fires.push(TimerHandle(timer_id));
            }
        }
        Ok(fires)
    }

    fn fini_executor(&mut self, executor: ExecutorHandle) {
        if self.release(executor.0, "executor") {
            self.executors.remove(&executor.0);
        }
    }

    fn fini_timer(&mut self, timer: TimerHandle) {
        if self.release(timer.0, "timer") {
            self.timers.remove(&timer.0);
        }
    }

    fn fini_publisher(&mut self, publisher: PublisherHandle, _node: NodeHandle) {
        if self.release(publisher.0, "publisher") {
            self.topics.remove(&publisher.0);
        }
    }

    fn fini_node(&mut self, node: NodeHandle) {
        self.release(node.0, "node");
    }

    fn fini_support(&mut self, support: SupportHandle) {
        if self.release(support.0, "support") {
            self.sessions_closed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_probes_take_precedence() {
        let mut a = SimAgent::absent();
        a.script_probes([true, false]);
        assert!(a.ping_agent(100, 1));
        assert!(!a.ping_agent(100, 1));
        assert!(!a.ping_agent(100, 1));
        assert_eq!(a.probes(), 3);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut a = SimAgent::new();
        let s1 = a.init_support().unwrap();
        a.fini_support(s1);
        let s2 = a.init_support().unwrap();
        assert_ne!(s1, s2);
        assert!(a.init_node(s1, "n", "").is_err());
        assert_eq!(a.stale_calls(), 1);
    }

    #[test]
    fn double_fini_is_counted() {
        let mut a = SimAgent::new();
        let s = a.init_support().unwrap();
        a.fini_support(s);
        a.fini_support(s);
        assert_eq!(a.sessions_closed(), 1);
        assert_eq!(a.stale_calls(), 1);
    }
}
