//! Coordinator — the per-tick sequencer.
//!
//! Owns the network layer, the broker session, and every device module.
//! Control flows strictly downward each tick:
//!
//! ```text
//! wifi.poll() → broker.poll() → command dispatch → device polls → heartbeat
//! ```
//!
//! Device modules receive the broker as a `&mut dyn MessageBus` capability
//! per call; nothing holds a reference across ticks. Inbound commands are
//! drained from the broker's staging queue here — one log line and a drop
//! for anything malformed, no acknowledgement topic.

use log::{debug, info, warn};

use crate::app::commands;
use crate::app::ports::StoragePort;
use crate::config::SystemConfig;
use crate::error::CommandError;
use crate::modules::climate::ClimateModule;
use crate::modules::heating::HeatingModule;
use crate::modules::leveling::LevelingModule;
use crate::modules::lift::LiftModule;
use crate::modules::lights::LightsModule;
use crate::modules::water::WaterModule;
use crate::modules::DeviceModule;
use crate::net::broker::BrokerSession;
use crate::net::heartbeat::Heartbeat;
use crate::net::wifi::WifiLink;

pub struct Coordinator<S: StoragePort> {
    wifi: WifiLink,
    broker: BrokerSession,
    heartbeat: Heartbeat,
    storage: S,
    topic_prefix: &'static str,

    water: WaterModule,
    heating: HeatingModule,
    lights: LightsModule,
    lift: LiftModule,
    leveling: LevelingModule,
    climate: ClimateModule,

    /// Broker epoch seen on the previous tick; a change means reconnect.
    seen_epoch: u32,
}

impl<S: StoragePort> Coordinator<S> {
    pub fn new(
        wifi: WifiLink,
        broker: BrokerSession,
        storage: S,
        topic_prefix: &'static str,
        module_id: &'static str,
        config: &SystemConfig,
    ) -> Self {
        let leveling = LevelingModule::new(topic_prefix, config.level_publish_delta_deg, &storage);
        Self {
            wifi,
            broker,
            heartbeat: Heartbeat::new(topic_prefix, module_id, config.heartbeat_interval_secs),
            storage,
            topic_prefix,
            water: WaterModule::new(topic_prefix),
            heating: HeatingModule::new(
                topic_prefix,
                config.circles,
                config.heating_publish_delta_c,
            ),
            lights: LightsModule::new(
                topic_prefix,
                config.button_settle_ms,
                config.button_hold_ms,
                config.light_fade_ms,
                config.light_dim_step,
            ),
            lift: LiftModule::new(
                topic_prefix,
                config.button_settle_ms,
                config.button_hold_ms,
                config.lift_max_run_ms,
            ),
            leveling,
            climate: ClimateModule::new(
                topic_prefix,
                config.climate_temp_delta_c,
                config.climate_hum_delta_rh,
            ),
            seen_epoch: 0,
        }
    }

    /// One full pass over every component. Never blocks beyond the short
    /// probe settling waits inside the sensor drivers.
    pub fn tick(&mut self, now_ms: u64) {
        // 1. Connectivity, strictly network before messaging.
        self.wifi.poll(now_ms);
        self.broker.poll(now_ms, self.wifi.is_connected());

        // 2. Reconnect fan-out: resynchronise every consumer-facing gate.
        let epoch = self.broker.epoch();
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            info!("coordinator: broker session epoch {epoch}, resyncing publishers");
            for module in self.modules_mut() {
                module.on_broker_reconnect();
            }
            self.heartbeat.request_resync();
        }

        // 3. Inbound commands, staged by the receive callback.
        while let Some(message) = self.broker.take_inbound() {
            self.dispatch(&message.topic, &message.payload);
        }

        // 4. Device polls — sequential "parallelism", one pass per tick.
        self.water.poll(now_ms, &mut self.broker);
        self.heating.poll(now_ms, &mut self.broker);
        self.lights.poll(now_ms, &mut self.broker);
        self.lift.poll(now_ms, &mut self.broker);
        self.leveling.poll(now_ms, &mut self.broker, &mut self.storage);
        self.climate.poll(now_ms, &mut self.broker);

        // 5. Heartbeat last, carrying the link quality of this tick.
        let rssi = self.wifi.rssi();
        self.heartbeat.poll(now_ms, rssi, &mut self.broker);
    }

    fn dispatch(&mut self, topic: &str, payload: &[u8]) {
        let Some(route) = commands::parse_route(self.topic_prefix, topic) else {
            debug!("coordinator: ignoring non-command topic '{topic}'");
            return;
        };

        let result = self
            .modules_mut()
            .into_iter()
            .find(|m| m.name() == route.module)
            .map_or(Err(CommandError::UnknownModule), |module| {
                module.handle_command(route.action, payload)
            });

        if let Err(e) = result {
            // Malformed or unroutable commands are dropped after this line.
            warn!(
                "coordinator: command {}/{} dropped — {e}",
                route.module, route.action
            );
        }
    }

    fn modules_mut(&mut self) -> [&mut dyn DeviceModule; 6] {
        [
            &mut self.water,
            &mut self.heating,
            &mut self.lights,
            &mut self.lift,
            &mut self.leveling,
            &mut self.climate,
        ]
    }

    // ── Accessors for the binary / tests ──────────────────────

    pub fn wifi(&mut self) -> &mut WifiLink {
        &mut self.wifi
    }

    pub fn broker(&mut self) -> &mut BrokerSession {
        &mut self.broker
    }
}
