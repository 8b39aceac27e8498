//! micro-ROS client adapter (ESP-IDF only).
//!
//! Implements [`MiddlewarePort`] over the rclc C API generated into
//! `esp_idf_sys::uros` from the micro-ROS ESP-IDF component.
//!
//! The rcl structs are self-referential once initialised (the executor
//! keeps pointers to the context, the allocator and the timer), so each one
//! lives in its own `Box` and is never moved until it is finalised.  At most
//! one bundle exists at a time; every handle carries the generation number
//! of the support it was created under and is rejected once that support
//! has been finalised.
//!
//! The transport is a framed serial link on [`AGENT_UART_PORT`] driven by
//! the four custom-transport callbacks at the bottom of this file.

use core::ffi::{c_char, c_void};
use core::ptr;
use core::sync::atomic::{AtomicU32, Ordering};
use std::ffi::CString;

use esp_idf_sys as sys;
use esp_idf_sys::uros::*;
use log::{debug, info, warn};

use crate::app::ports::{
    ExecutorHandle, MAX_TIMER_FIRES, MiddlewarePort, NodeHandle, PublisherHandle, SupportHandle,
    TimerFires, TimerHandle,
};
use crate::error::{EntityStage, Error, MiddlewareError};
use crate::pins::{AGENT_UART_BAUD, AGENT_UART_PORT, AGENT_UART_RX_GPIO, AGENT_UART_TX_GPIO};

const RET_OK: i32 = 0;
const NS_PER_MS: u64 = 1_000_000;
const UART_BUFFER_SIZE: i32 = 2048;

/// Timer callbacks since the last spin.  Written from inside
/// `rclc_executor_spin_some`, which runs on the calling task.
static TIMER_FIRES: AtomicU32 = AtomicU32::new(0);

/// Handed to the transport callbacks as their `args` pointer.
static TRANSPORT_PORT: i32 = AGENT_UART_PORT;

unsafe extern "C" fn on_publish_timer(timer: *mut rcl_timer_t, _last_call_time: i64) {
    if !timer.is_null() {
        TIMER_FIRES.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owner of every rcl object for the current session.
pub struct MicroRosClient {
    allocator: Box<rcl_allocator_t>,
    generation: u32,
    support: Option<Box<rclc_support_t>>,
    node: Option<Box<rcl_node_t>>,
    publisher: Option<Box<rcl_publisher_t>>,
    timer: Option<Box<rcl_timer_t>>,
    executor: Option<Box<rclc_executor_t>>,
    msg: std_msgs__msg__Float32,
}

impl MicroRosClient {
    /// Register the UART transport.  Must run once before the first probe.
    pub fn new() -> crate::error::Result<Self> {
        let rc = unsafe {
            rmw_uros_set_custom_transport(
                true,
                ptr::addr_of!(TRANSPORT_PORT) as *mut c_void,
                Some(uart_open),
                Some(uart_close),
                Some(uart_write),
                Some(uart_read),
            )
        };
        if rc as i32 != RET_OK {
            return Err(Error::Init("micro-ROS custom transport"));
        }
        info!(
            "micro-ROS transport: UART{} @ {} baud (tx={}, rx={})",
            AGENT_UART_PORT, AGENT_UART_BAUD, AGENT_UART_TX_GPIO, AGENT_UART_RX_GPIO
        );
        Ok(Self {
            allocator: Box::new(unsafe { rcutils_get_default_allocator() }),
            generation: 0,
            support: None,
            node: None,
            publisher: None,
            timer: None,
            executor: None,
            msg: std_msgs__msg__Float32 { data: 0.0 },
        })
    }

    fn current(&self, id: u32) -> Result<(), MiddlewareError> {
        if id == self.generation && self.support.is_some() {
            Ok(())
        } else {
            Err(MiddlewareError::StaleHandle)
        }
    }

    fn check(stage: EntityStage, rc: rcl_ret_t) -> Result<(), MiddlewareError> {
        if rc as i32 == RET_OK {
            Ok(())
        } else {
            unsafe { rcutils_reset_error() };
            Err(MiddlewareError::InitFailed {
                stage,
                code: rc as i32,
            })
        }
    }

    fn c_name(stage: EntityStage, s: &str) -> Result<CString, MiddlewareError> {
        CString::new(s).map_err(|_| MiddlewareError::InitFailed { stage, code: -1 })
    }

    fn fini_rc(what: &str, rc: rcl_ret_t) {
        if rc as i32 != RET_OK {
            debug!("micro-ROS: {} fini returned {}", what, rc);
            unsafe { rcutils_reset_error() };
        }
    }
}

impl MiddlewarePort for MicroRosClient {
    fn ping_agent(&mut self, timeout_ms: u32, attempts: u8) -> bool {
        let rc = unsafe { rmw_uros_ping_agent(timeout_ms as i32, attempts) };
        rc as i32 == RET_OK
    }

    fn init_support(&mut self) -> Result<SupportHandle, MiddlewareError> {
        let mut support: Box<rclc_support_t> = Box::new(unsafe { core::mem::zeroed() });
        let rc = unsafe {
            rclc_support_init(&mut *support, 0, ptr::null(), &mut *self.allocator)
        };
        Self::check(EntityStage::Support, rc)?;
        self.generation = self.generation.wrapping_add(1);
        self.support = Some(support);
        Ok(SupportHandle(self.generation))
    }

    fn init_node(
        &mut self,
        support: SupportHandle,
        name: &str,
        namespace: &str,
    ) -> Result<NodeHandle, MiddlewareError> {
        self.current(support.0)?;
        let name = Self::c_name(EntityStage::Node, name)?;
        let namespace = Self::c_name(EntityStage::Node, namespace)?;
        let Some(sup) = self.support.as_deref_mut() else {
            return Err(MiddlewareError::StaleHandle);
        };
        let mut node = Box::new(unsafe { rcl_get_zero_initialized_node() });
        let rc = unsafe {
            rclc_node_init_default(
                &mut *node,
                name.as_ptr() as *const c_char,
                namespace.as_ptr() as *const c_char,
                sup,
            )
        };
        Self::check(EntityStage::Node, rc)?;
        self.node = Some(node);
        Ok(NodeHandle(self.generation))
    }

    fn init_publisher(
        &mut self,
        node: NodeHandle,
        topic: &str,
    ) -> Result<PublisherHandle, MiddlewareError> {
        self.current(node.0)?;
        let topic = Self::c_name(EntityStage::Publisher, topic)?;
        let Some(n) = self.node.as_deref() else {
            return Err(MiddlewareError::StaleHandle);
        };
        let mut publisher = Box::new(unsafe { rcl_get_zero_initialized_publisher() });
        let rc = unsafe {
            rclc_publisher_init_best_effort(
                &mut *publisher,
                n,
                rosidl_typesupport_c__get_message_type_support_handle__std_msgs__msg__Float32(),
                topic.as_ptr() as *const c_char,
            )
        };
        Self::check(EntityStage::Publisher, rc)?;
        self.msg.data = 0.0;
        self.publisher = Some(publisher);
        Ok(PublisherHandle(self.generation))
    }

    fn init_timer(
        &mut self,
        support: SupportHandle,
        period_ms: u32,
    ) -> Result<TimerHandle, MiddlewareError> {
        self.current(support.0)?;
        let Some(sup) = self.support.as_deref_mut() else {
            return Err(MiddlewareError::StaleHandle);
        };
        let mut timer = Box::new(unsafe { rcl_get_zero_initialized_timer() });
        let rc = unsafe {
            rclc_timer_init_default(
                &mut *timer,
                sup,
                u64::from(period_ms) * NS_PER_MS,
                Some(on_publish_timer),
            )
        };
        Self::check(EntityStage::Timer, rc)?;
        self.timer = Some(timer);
        Ok(TimerHandle(self.generation))
    }

    fn init_executor(
        &mut self,
        support: SupportHandle,
        timer: TimerHandle,
    ) -> Result<ExecutorHandle, MiddlewareError> {
        self.current(support.0)?;
        self.current(timer.0)?;
        let (Some(sup), Some(t)) = (self.support.as_deref_mut(), self.timer.as_deref_mut()) else {
            return Err(MiddlewareError::StaleHandle);
        };
        let mut executor = Box::new(unsafe { rclc_executor_get_zero_initialized_executor() });
        let rc = unsafe { rclc_executor_init(&mut *executor, &mut sup.context, 1, &*self.allocator) };
        Self::check(EntityStage::Executor, rc)?;
        let rc = unsafe { rclc_executor_add_timer(&mut *executor, t) };
        if let Err(e) = Self::check(EntityStage::Executor, rc) {
            Self::fini_rc("executor", unsafe { rclc_executor_fini(&mut *executor) });
            return Err(e);
        }
        TIMER_FIRES.store(0, Ordering::Relaxed);
        self.executor = Some(executor);
        Ok(ExecutorHandle(self.generation))
    }

    fn publish(&mut self, publisher: PublisherHandle, value: f32) -> Result<(), MiddlewareError> {
        self.current(publisher.0)?;
        let Some(p) = self.publisher.as_deref() else {
            return Err(MiddlewareError::StaleHandle);
        };
        self.msg.data = value;
        let rc = unsafe {
            rcl_publish(p, ptr::addr_of!(self.msg) as *const c_void, ptr::null_mut())
        };
        if rc as i32 == RET_OK {
            Ok(())
        } else {
            unsafe { rcutils_reset_error() };
            Err(MiddlewareError::PublishFailed(rc as i32))
        }
    }

    fn spin_executor(
        &mut self,
        executor: ExecutorHandle,
        budget_ms: u32,
    ) -> Result<TimerFires, MiddlewareError> {
        self.current(executor.0)?;
        let Some(x) = self.executor.as_deref_mut() else {
            return Err(MiddlewareError::StaleHandle);
        };
        let rc = unsafe { rclc_executor_spin_some(x, u64::from(budget_ms) * NS_PER_MS) };
        // RCL_RET_TIMEOUT just means nothing was ready.
        if rc as i32 != RET_OK && rc as i32 != RCL_RET_TIMEOUT as i32 {
            unsafe { rcutils_reset_error() };
            return Err(MiddlewareError::SpinFailed(rc as i32));
        }

        let fired = TIMER_FIRES.swap(0, Ordering::Relaxed) as usize;
        let mut fires = TimerFires::new();
        for _ in 0..fired.min(MAX_TIMER_FIRES) {
            let _ = fires.push(TimerHandle(self.generation));
        }
        Ok(fires)
    }

    fn fini_executor(&mut self, executor: ExecutorHandle) {
        if self.current(executor.0).is_err() {
            warn!("micro-ROS: stale executor handle on fini");
            return;
        }
        if let Some(mut x) = self.executor.take() {
            Self::fini_rc("executor", unsafe { rclc_executor_fini(&mut *x) });
        }
    }

    fn fini_timer(&mut self, timer: TimerHandle) {
        if self.current(timer.0).is_err() {
            warn!("micro-ROS: stale timer handle on fini");
            return;
        }
        if let Some(mut t) = self.timer.take() {
            Self::fini_rc("timer", unsafe { rcl_timer_fini(&mut *t) });
        }
    }

    fn fini_publisher(&mut self, publisher: PublisherHandle, node: NodeHandle) {
        if self.current(publisher.0).is_err() || self.current(node.0).is_err() {
            warn!("micro-ROS: stale publisher handle on fini");
            return;
        }
        let Some(mut p) = self.publisher.take() else {
            return;
        };
        match self.node.as_deref_mut() {
            Some(n) => Self::fini_rc("publisher", unsafe { rcl_publisher_fini(&mut *p, n) }),
            None => warn!("micro-ROS: publisher outlived its node"),
        }
    }

    fn fini_node(&mut self, node: NodeHandle) {
        if self.current(node.0).is_err() {
            warn!("micro-ROS: stale node handle on fini");
            return;
        }
        if let Some(mut n) = self.node.take() {
            Self::fini_rc("node", unsafe { rcl_node_fini(&mut *n) });
        }
    }

    fn fini_support(&mut self, support: SupportHandle) {
        if self.current(support.0).is_err() {
            warn!("micro-ROS: stale support handle on fini");
            return;
        }
        if let Some(mut s) = self.support.take() {
            Self::fini_rc("support", unsafe { rclc_support_fini(&mut *s) });
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Custom serial transport (XRCE-DDS framing is done by the client)
// ───────────────────────────────────────────────────────────────

unsafe fn port_of(transport: *mut uxrCustomTransport) -> sys::uart_port_t {
    unsafe { *((*transport).args as *const i32) as sys::uart_port_t }
}

unsafe extern "C" fn uart_open(transport: *mut uxrCustomTransport) -> bool {
    let port = unsafe { port_of(transport) };
    let mut cfg: sys::uart_config_t = unsafe { core::mem::zeroed() };
    cfg.baud_rate = AGENT_UART_BAUD;
    cfg.data_bits = sys::uart_word_length_t_UART_DATA_8_BITS;
    cfg.parity = sys::uart_parity_t_UART_PARITY_DISABLE;
    cfg.stop_bits = sys::uart_stop_bits_t_UART_STOP_BITS_1;
    cfg.flow_ctrl = sys::uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE;

    unsafe {
        sys::uart_param_config(port, &cfg) == sys::ESP_OK
            && sys::uart_set_pin(port, AGENT_UART_TX_GPIO, AGENT_UART_RX_GPIO, -1, -1)
                == sys::ESP_OK
            && sys::uart_driver_install(
                port,
                UART_BUFFER_SIZE,
                UART_BUFFER_SIZE,
                0,
                ptr::null_mut(),
                0,
            ) == sys::ESP_OK
    }
}

unsafe extern "C" fn uart_close(transport: *mut uxrCustomTransport) -> bool {
    let port = unsafe { port_of(transport) };
    unsafe { sys::uart_driver_delete(port) == sys::ESP_OK }
}

unsafe extern "C" fn uart_write(
    transport: *mut uxrCustomTransport,
    buf: *const u8,
    len: usize,
    err: *mut u8,
) -> usize {
    let port = unsafe { port_of(transport) };
    let written = unsafe { sys::uart_write_bytes(port, buf as *const c_void, len) };
    if written < 0 {
        unsafe { *err = 1 };
        return 0;
    }
    written as usize
}

unsafe extern "C" fn uart_read(
    transport: *mut uxrCustomTransport,
    buf: *mut u8,
    len: usize,
    timeout: i32,
    err: *mut u8,
) -> usize {
    let port = unsafe { port_of(transport) };
    let ticks = (timeout.max(0) as u32).saturating_mul(sys::configTICK_RATE_HZ) / 1000;
    let read = unsafe { sys::uart_read_bytes(port, buf as *mut c_void, len as u32, ticks) };
    if read < 0 {
        unsafe { *err = 1 };
        return 0;
    }
    read as usize
}
