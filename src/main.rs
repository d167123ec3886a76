//! CamperNode Firmware — Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │   WifiLink          BrokerSession        NvsStore            │
//! │   (station link)    (MessageBus)         (StoragePort)       │
//! │                                                              │
//! │  ───────────────── Port Trait Boundary ───────────────       │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              Coordinator (pure logic)                  │  │
//! │  │  water · heating · lights · lift · leveling · climate  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Execution is single-threaded, cooperative, tick-driven: one pass over
//! all components' non-blocking `poll()` calls per iteration.
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
mod error;
mod pins;

pub mod app;
mod adapters;
mod drivers;
mod modules;
mod net;
mod sensors;
mod signal;

// ── Imports ───────────────────────────────────────────────────
use std::time::Duration;

use anyhow::Result;
use log::info;

use adapters::device_id;
use adapters::nvs::NvsStore;
use adapters::time::MonotonicClock;
use app::service::Coordinator;
use config::{netcfg, SystemConfig};
use net::broker::BrokerSession;
use net::wifi::WifiLink;

fn main() -> Result<()> {
    // ── 1. Platform bootstrap ─────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("╔══════════════════════════════════════╗");
    info!("║  CamperNode v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware peripherals ───────────────────────────────
    if let Err(e) = drivers::hw_init::init_peripherals() {
        // Peripheral init failure is critical — log and halt.
        // In production this triggers the watchdog reset after timeout.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    let config = SystemConfig::default();

    // ── 3. WiFi driver + station link ─────────────────────────
    #[cfg(target_os = "espidf")]
    let wifi = {
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::hal::prelude::Peripherals;
        use esp_idf_svc::nvs::EspDefaultNvsPartition;
        use esp_idf_svc::wifi::EspWifi;

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_partition = EspDefaultNvsPartition::take()?;
        let driver = EspWifi::new(peripherals.modem, sysloop, Some(nvs_partition))?;
        WifiLink::new(driver, netcfg::WIFI_SSID, netcfg::WIFI_PASSWORD, &config)
    };
    #[cfg(not(target_os = "espidf"))]
    let wifi = WifiLink::new(netcfg::WIFI_SSID, netcfg::WIFI_PASSWORD, &config);

    // ── 4. Storage (leveling zero offsets live here) ──────────
    let nvs = match NvsStore::new() {
        Ok(store) => store,
        Err(e) => {
            log::error!("NVS init failed: {} — halting", e);
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };

    // ── 5. Broker session ─────────────────────────────────────
    let mac = device_id::read_mac();
    let client_id = device_id::client_id(&mac);
    info!("Device: {} → {}", client_id, netcfg::BROKER_URL);

    let broker = BrokerSession::new(
        client_id.as_str(),
        netcfg::BROKER_URL,
        netcfg::TOPIC_PREFIX,
        &config,
    );

    // ── 6. Coordinator ────────────────────────────────────────
    let mut coordinator = Coordinator::new(
        wifi,
        broker,
        nvs,
        netcfg::TOPIC_PREFIX,
        netcfg::MODULE_ID,
        &config,
    );

    info!("System ready. Entering tick loop.");

    // ── 7. Tick loop ──────────────────────────────────────────
    let clock = MonotonicClock::new();
    let tick_interval = Duration::from_millis(u64::from(config.tick_interval_ms));

    loop {
        coordinator.tick(clock.now_ms());
        std::thread::sleep(tick_interval);
    }
}
