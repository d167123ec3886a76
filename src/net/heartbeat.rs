//! Periodic heartbeat publisher.
//!
//! A liveness message independent of substantive telemetry: emitted on a
//! fixed interval, and immediately after a broker reconnect so consumers
//! re-learn the module without waiting a full period.

use log::debug;
use serde::Serialize;

use crate::app::ports::MessageBus;
use crate::net::topics::{self, Topic};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatPayload<'a> {
    /// Milliseconds since boot (no RTC on board).
    timestamp: u64,
    module_id: &'a str,
    /// Whole seconds since boot.
    uptime: u64,
    #[serde(rename = "wifiRSSI")]
    wifi_rssi: Option<i8>,
    reset_reason: &'static str,
}

pub struct Heartbeat {
    topic: Topic,
    module_id: &'static str,
    interval_ms: u64,
    last_sent_ms: Option<u64>,
    resync: bool,
    reset_reason: &'static str,
}

impl Heartbeat {
    pub fn new(prefix: &str, module_id: &'static str, interval_secs: u32) -> Self {
        Self {
            topic: topics::heartbeat(prefix, module_id),
            module_id,
            interval_ms: u64::from(interval_secs) * 1_000,
            last_sent_ms: None,
            resync: false,
            reset_reason: read_reset_reason(),
        }
    }

    /// Emit on the next poll regardless of the interval (broker reconnect).
    pub fn request_resync(&mut self) {
        self.resync = true;
    }

    pub fn poll(&mut self, now_ms: u64, wifi_rssi: Option<i8>, bus: &mut dyn MessageBus) {
        let due = match self.last_sent_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.interval_ms,
        };
        if !due && !self.resync {
            return;
        }

        let payload = HeartbeatPayload {
            timestamp: now_ms,
            module_id: self.module_id,
            uptime: now_ms / 1_000,
            wifi_rssi,
            reset_reason: self.reset_reason,
        };
        let Ok(json) = serde_json::to_vec(&payload) else {
            return;
        };
        if bus.publish(self.topic.as_str(), &json) {
            self.last_sent_ms = Some(now_ms);
            self.resync = false;
        } else {
            debug!("heartbeat: publish deferred, session down");
        }
    }
}

#[cfg(target_os = "espidf")]
fn read_reset_reason() -> &'static str {
    use esp_idf_svc::sys::*;
    // SAFETY: esp_reset_reason is a plain register/RTC query.
    let reason = unsafe { esp_reset_reason() };
    match reason {
        esp_reset_reason_t_ESP_RST_POWERON => "POWERON",
        esp_reset_reason_t_ESP_RST_SW => "SOFTWARE",
        esp_reset_reason_t_ESP_RST_PANIC => "PANIC",
        esp_reset_reason_t_ESP_RST_INT_WDT | esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_WDT => "WATCHDOG",
        esp_reset_reason_t_ESP_RST_BROWNOUT => "BROWNOUT",
        _ => "UNKNOWN",
    }
}

#[cfg(not(target_os = "espidf"))]
fn read_reset_reason() -> &'static str {
    "POWERON"
}
