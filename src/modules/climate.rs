//! Climate module — cabin temperature/humidity telemetry.
//!
//! The DHT22 is polled at its maximum safe rate (every 2 s). Invalid
//! transactions are logged and discarded with the last valid reading
//! retained; only valid samples enter the mean-of-K windows. Each metric
//! has its own publish gate and topic.

use core::fmt::Write as _;

use log::warn;

use crate::app::ports::MessageBus;
use crate::error::CommandError;
use crate::modules::DeviceModule;
use crate::net::topics::{self, Topic};
use crate::pins;
use crate::sensors::dht::{DhtReading, DhtSensor};
use crate::signal::gate::ReportGate;
use crate::signal::window::MeasurementWindow;

const MODULE: &str = "climate";
const K: usize = 5;
const SAMPLE_INTERVAL_MS: u64 = 2_000;

pub struct ClimateModule {
    sensor: DhtSensor,
    temp_window: MeasurementWindow<f32, K>,
    hum_window: MeasurementWindow<f32, K>,
    temp_gate: ReportGate,
    hum_gate: ReportGate,
    temp_topic: Topic,
    hum_topic: Topic,
    last_sample_ms: Option<u64>,
    samples_since_eval: usize,
    eval_requested: bool,
    /// Retained for local consumers when the sensor misbehaves.
    last_valid: Option<DhtReading>,
}

impl ClimateModule {
    pub fn new(prefix: &str, temp_delta_c: f32, hum_delta_rh: f32) -> Self {
        Self {
            sensor: DhtSensor::new(pins::DHT_DATA_GPIO),
            temp_window: MeasurementWindow::new(),
            hum_window: MeasurementWindow::new(),
            temp_gate: ReportGate::new(temp_delta_c),
            hum_gate: ReportGate::new(hum_delta_rh),
            temp_topic: topics::sensor(prefix, MODULE, "temperature"),
            hum_topic: topics::sensor(prefix, MODULE, "humidity"),
            last_sample_ms: None,
            samples_since_eval: 0,
            eval_requested: false,
            last_valid: None,
        }
    }

    pub fn poll(&mut self, now_ms: u64, bus: &mut dyn MessageBus) {
        let due = match self.last_sample_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= SAMPLE_INTERVAL_MS,
        };
        if due {
            self.last_sample_ms = Some(now_ms);
            match self.sensor.read() {
                Ok(reading) => {
                    self.last_valid = Some(reading);
                    self.temp_window.push(reading.temperature_c);
                    self.hum_window.push(reading.humidity_rh);
                    self.samples_since_eval += 1;
                }
                Err(e) => {
                    // Discard and keep the last valid reading.
                    warn!("climate: invalid reading — {e}");
                }
            }
        }

        if self.samples_since_eval >= K || (self.eval_requested && !self.temp_window.is_empty()) {
            self.samples_since_eval = 0;
            self.eval_requested = false;
            self.evaluate(bus);
        }
    }

    pub fn last_valid(&self) -> Option<DhtReading> {
        self.last_valid
    }

    fn evaluate(&mut self, bus: &mut dyn MessageBus) {
        if let Some(temp) = self.temp_window.mean() {
            publish_metric(bus, &self.temp_topic, &mut self.temp_gate, temp);
        }
        if let Some(hum) = self.hum_window.mean() {
            publish_metric(bus, &self.hum_topic, &mut self.hum_gate, hum);
        }
    }
}

fn publish_metric(bus: &mut dyn MessageBus, topic: &Topic, gate: &mut ReportGate, value: f32) {
    if !gate.should_publish(value) {
        return;
    }
    let mut payload = heapless::String::<16>::new();
    let _ = write!(payload, "{value:.1}");
    if bus.publish(topic.as_str(), payload.as_bytes()) {
        gate.commit(value);
    }
}

impl DeviceModule for ClimateModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError> {
        let _ = payload;
        match action {
            "update" | "status" => {
                self.temp_gate.request_resync();
                self.hum_gate.request_resync();
                self.eval_requested = true;
                Ok(())
            }
            _ => Err(CommandError::UnknownAction),
        }
    }

    fn on_broker_reconnect(&mut self) {
        self.temp_gate.request_resync();
        self.hum_gate.request_resync();
        self.eval_requested = true;
    }
}
