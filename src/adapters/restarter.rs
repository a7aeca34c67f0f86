//! Restart adapter: the supervision module's last resort when a failure
//! budget is exhausted or the device reports a RESET interrupt.

use crate::app::ports::RestarterPort;

pub struct SystemRestarter;

impl SystemRestarter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRestarter {
    fn default() -> Self {
        Self::new()
    }
}

impl RestarterPort for SystemRestarter {
    #[cfg(target_os = "espidf")]
    fn request_restart(&self, reason: &'static str) {
        log::error!("restart requested: {reason}");
        // SAFETY: esp_restart never returns; safe to call from any task.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn request_restart(&self, reason: &'static str) {
        log::error!("restart requested (sim, no-op): {reason}");
    }
}
