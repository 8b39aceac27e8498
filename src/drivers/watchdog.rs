//! Task Watchdog Timer (TWDT) driver and supervised restart.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the control loop
//! stalls.  Worst-case tick is probe + spin + conversion + loop delay,
//! well under a second, so the timeout leaves a wide margin.
//!
//! The main loop must call `feed()` on every tick.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{info, warn};

/// TWDT timeout.
pub const WATCHDOG_TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    subscribed: bool,
    feeds: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!(
                        "Watchdog: subscribed ({} ms timeout, panic on trigger)",
                        WATCHDOG_TIMEOUT_MS
                    );
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed, feeds: 0 }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op, {} ms timeout", WATCHDOG_TIMEOUT_MS);
            Self {
                subscribed: false,
                feeds: 0,
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Feed the watchdog.  Must be called at least every timeout period.
    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }

    /// Supervised restart after unrecoverable link failures.
    ///
    /// On target this reboots the chip and does not return.  On host it
    /// only logs, so simulations keep running.
    pub fn restart(&mut self, reason: &'static str) {
        warn!("Watchdog: restarting ({})", reason);
        #[cfg(target_os = "espidf")]
        unsafe {
            esp_restart();
        }
    }
}
