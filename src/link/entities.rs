//! The telemetry entity bundle: support, node, publisher, timer, executor.
//!
//! [`TelemetryEntities`] is either fully built or does not exist.  If any
//! `init_*` step fails, [`TelemetryEntities::create`] tears down the steps
//! that already succeeded (reverse order) before returning the error.
//! [`TelemetryEntities::destroy`] consumes the bundle, so a set can be torn
//! down at most once and no handle outlives its session.

use log::{debug, info, warn};

use crate::app::ports::{
    ExecutorHandle, MiddlewarePort, NodeHandle, PublisherHandle, SupportHandle, TimerHandle,
};
use crate::config::{EXECUTOR_SPIN_BUDGET_MS, InstrumentConfig, PUBLISH_PERIOD_MS};
use crate::error::{MiddlewareError, Result};
use crate::sensors::signal::Sample;

/// Result of giving the executor one time slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpinReport {
    /// Timer callbacks that ran.
    pub fired: u32,
    /// Publishes the transport accepted.
    pub published: u32,
    /// Publishes that failed and were dropped.
    pub failed: u32,
    /// Fires with no current sample to send.
    pub skipped: u32,
}

/// Handles for one connected session.
#[derive(Debug)]
pub struct TelemetryEntities {
    support: SupportHandle,
    node: NodeHandle,
    publisher: PublisherHandle,
    timer: TimerHandle,
    executor: ExecutorHandle,
    /// Last value handed to the publisher; reset to 0 on creation.
    outgoing: f32,
}

impl TelemetryEntities {
    /// Build the whole bundle or nothing.
    pub fn create<M: MiddlewarePort>(mw: &mut M, config: &InstrumentConfig) -> Result<Self> {
        let support = mw.init_support()?;

        let node = match mw.init_node(support, &config.node_name, &config.namespace) {
            Ok(n) => n,
            Err(e) => {
                mw.fini_support(support);
                return Err(e.into());
            }
        };

        let publisher = match mw.init_publisher(node, &config.topic) {
            Ok(p) => p,
            Err(e) => {
                mw.fini_node(node);
                mw.fini_support(support);
                return Err(e.into());
            }
        };

        let timer = match mw.init_timer(support, PUBLISH_PERIOD_MS) {
            Ok(t) => t,
            Err(e) => {
                mw.fini_publisher(publisher, node);
                mw.fini_node(node);
                mw.fini_support(support);
                return Err(e.into());
            }
        };

        let executor = match mw.init_executor(support, timer) {
            Ok(x) => x,
            Err(e) => {
                mw.fini_timer(timer);
                mw.fini_publisher(publisher, node);
                mw.fini_node(node);
                mw.fini_support(support);
                return Err(e.into());
            }
        };

        info!(
            "Entities created: node '{}' publishing '{}' every {} ms",
            config.node_name, config.topic, PUBLISH_PERIOD_MS
        );
        Ok(Self {
            support,
            node,
            publisher,
            timer,
            executor,
            outgoing: 0.0,
        })
    }

    /// Grant the executor one bounded slice and publish on every due fire.
    ///
    /// `current` is the most recent sample; `None` means the sensor was
    /// absent this tick and the fire is skipped.  Publish failures are
    /// counted and dropped.
    pub fn spin<M: MiddlewarePort>(
        &mut self,
        mw: &mut M,
        current: Option<&Sample>,
    ) -> core::result::Result<SpinReport, MiddlewareError> {
        let fires = mw.spin_executor(self.executor, EXECUTOR_SPIN_BUDGET_MS)?;
        let mut report = SpinReport::default();

        for timer in fires {
            if timer != self.timer {
                warn!("Executor reported foreign timer {:?}", timer);
                continue;
            }
            report.fired += 1;
            let Some(sample) = current else {
                report.skipped += 1;
                continue;
            };
            self.outgoing = sample.force;
            match mw.publish(self.publisher, self.outgoing) {
                Ok(()) => report.published += 1,
                Err(e) => {
                    debug!("Publish dropped: {}", e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Last value handed to the publisher.
    pub fn outgoing(&self) -> f32 {
        self.outgoing
    }

    pub fn publisher(&self) -> PublisherHandle {
        self.publisher
    }

    pub fn timer(&self) -> TimerHandle {
        self.timer
    }

    /// Release every handle in reverse construction order.
    pub fn destroy<M: MiddlewarePort>(self, mw: &mut M) {
        mw.fini_executor(self.executor);
        mw.fini_timer(self.timer);
        mw.fini_publisher(self.publisher, self.node);
        mw.fini_node(self.node);
        mw.fini_support(self.support);
        info!("Entities destroyed");
    }
}
