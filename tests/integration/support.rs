//! Shared fixtures for the integration suite.

use std::sync::Mutex;

use campernode::app::service::Coordinator;
use campernode::config::SystemConfig;
use campernode::net::broker::BrokerSession;
use campernode::net::wifi::WifiLink;

/// The sensor simulation backends are process-wide statics; tests that
/// script them take this lock to stay deterministic under the parallel
/// test runner.
pub static SIM_LOCK: Mutex<()> = Mutex::new(());

pub const PREFIX: &str = "camper";

/// In-memory storage for the leveling offsets.
pub type MemNvs = campernode::adapters::nvs::NvsStore;

pub fn coordinator() -> Coordinator<MemNvs> {
    let config = SystemConfig::default();
    let wifi = WifiLink::new("CamperNet", "test-password", &config);
    let broker = BrokerSession::new("campernode-test", "mqtt://127.0.0.1:1883", PREFIX, &config);
    let nvs = MemNvs::new().expect("sim NVS never fails");
    Coordinator::new(wifi, broker, nvs, PREFIX, "mainboard", &config)
}

/// Drive the coordinator from `*now` for `duration_ms`, with the 50 ms
/// production tick.
pub fn run_for(c: &mut Coordinator<MemNvs>, now: &mut u64, duration_ms: u64) {
    let end = *now + duration_ms;
    while *now < end {
        c.tick(*now);
        *now += 50;
    }
}

pub fn topics_published(c: &mut Coordinator<MemNvs>) -> Vec<String> {
    c.broker()
        .sim_published()
        .iter()
        .map(|(topic, _)| topic.clone())
        .collect()
}

pub fn last_payload_on(c: &mut Coordinator<MemNvs>, topic: &str) -> Option<Vec<u8>> {
    c.broker()
        .sim_published()
        .iter()
        .rev()
        .find(|(t, _)| t == topic)
        .map(|(_, p)| p.clone())
}
