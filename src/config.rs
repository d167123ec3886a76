//! System configuration.
//!
//! Two layers, both resolved at compile time per deployment:
//!
//! - [`netcfg`] — network identity constants baked into the image
//!   (credentials, broker address, topic prefix, module id).
//! - [`SystemConfig`] — tunable timing/threshold parameters grouped in one
//!   struct so the coordinator and tests share a single source of defaults.
//!
//! Nothing here is persisted; the only durable state in the system is the
//! leveling zero-offset blob (see `modules::leveling`).

use serde::{Deserialize, Serialize};

/// Compile-time network identity. Replaced per deployment at build time.
pub mod netcfg {
    /// Station-mode SSID.
    pub const WIFI_SSID: &str = "CamperNet";
    /// WPA2 passphrase.
    pub const WIFI_PASSWORD: &str = "rolling-home-42";
    /// Broker endpoint, plain TCP.
    pub const BROKER_URL: &str = "mqtt://192.168.8.1:1883";
    /// Topic namespace root shared by the whole mesh.
    pub const TOPIC_PREFIX: &str = "camper";
    /// This image's module identity (heartbeat topic, client id suffix).
    pub const MODULE_ID: &str = "mainboard";
}

/// Per-circle heating thresholds. `turn_on_c` must stay below `turn_off_c`
/// (hysteresis band — see `modules::heating`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircleConfig {
    /// Relay closes when the floor drops below this (°C).
    pub turn_on_c: f32,
    /// Relay opens when the floor rises above this (°C).
    pub turn_off_c: f32,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            turn_on_c: 32.0,
            turn_off_c: 33.0,
        }
    }
}

/// Core system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Tick loop ---
    /// Coordinator tick interval (milliseconds).
    pub tick_interval_ms: u32,

    // --- WiFi ---
    /// Fixed delay between reconnect attempts (milliseconds).
    pub wifi_retry_delay_ms: u64,
    /// Interval of the CONNECTED-state liveness check (milliseconds).
    pub wifi_liveness_interval_ms: u64,

    // --- Broker session ---
    /// Fixed delay between broker connect attempts (milliseconds).
    pub broker_retry_delay_ms: u64,
    /// Consecutive-failure count past which the retry log escalates.
    pub broker_failure_log_threshold: u32,

    // --- Buttons ---
    /// Debounce settle window (milliseconds).
    pub button_settle_ms: u64,
    /// Press duration past which a press becomes a hold (milliseconds).
    pub button_hold_ms: u64,

    // --- Heating ---
    /// Per-circle hysteresis thresholds.
    pub circles: [CircleConfig; 4],
    /// Temperature delta that triggers a status publish (°C).
    pub heating_publish_delta_c: f32,

    // --- Lights ---
    /// Fade duration for a level transition (milliseconds).
    pub light_fade_ms: u32,
    /// Level step per tick while dimming under a held button.
    pub light_dim_step: u8,

    // --- Lift ---
    /// Motion hard stop after this many milliseconds of continuous run.
    pub lift_max_run_ms: u64,

    // --- Leveling ---
    /// Angle delta that triggers a publish (degrees).
    pub level_publish_delta_deg: f32,

    // --- Climate ---
    /// Temperature publish threshold (°C).
    pub climate_temp_delta_c: f32,
    /// Humidity publish threshold (%RH).
    pub climate_hum_delta_rh: f32,

    // --- Telemetry ---
    /// Heartbeat interval (seconds).
    pub heartbeat_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50, // 20 Hz — fast enough for button feel

            wifi_retry_delay_ms: 5_000,
            wifi_liveness_interval_ms: 2_000,

            broker_retry_delay_ms: 5_000,
            broker_failure_log_threshold: 10,

            button_settle_ms: 60,
            button_hold_ms: 400,

            circles: [CircleConfig::default(); 4],
            heating_publish_delta_c: 0.5,

            light_fade_ms: 800,
            light_dim_step: 3,

            lift_max_run_ms: 30_000,

            level_publish_delta_deg: 0.2,

            climate_temp_delta_c: 0.3,
            climate_hum_delta_rh: 2.0,

            heartbeat_interval_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.tick_interval_ms > 0);
        assert!(c.button_settle_ms < c.button_hold_ms);
        assert!(c.wifi_liveness_interval_ms < c.wifi_retry_delay_ms);
        for circle in &c.circles {
            assert!(
                circle.turn_on_c < circle.turn_off_c,
                "turn-on must sit below turn-off to form a hysteresis band"
            );
        }
        assert!(c.light_dim_step > 0);
        assert!(c.lift_max_run_ms >= 1_000);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.tick_interval_ms, c2.tick_interval_ms);
        assert!((c.circles[0].turn_on_c - c2.circles[0].turn_on_c).abs() < 0.001);
        assert_eq!(c.heartbeat_interval_secs, c2.heartbeat_interval_secs);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(
            u64::from(c.tick_interval_ms) < c.button_settle_ms * 2,
            "tick must be fast enough to sample the settle window"
        );
        assert!(
            u64::from(c.tick_interval_ms) < c.wifi_liveness_interval_ms,
            "liveness checks span several ticks"
        );
    }
}
