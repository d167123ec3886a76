//! Leveling module — pitch/roll telemetry for parking the camper flat.
//!
//! The inclinometer's raw angles feed mean-of-K windows; the published
//! values are raw minus the zero offsets. Offsets are the only durable
//! state in the whole system: captured from the current attitude on an
//! explicit `zero` command, written to NVS immediately, and read once at
//! construction. Windows hold *raw* angles, so a zero change takes effect
//! on the very next evaluation without clearing anything.

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::ports::{MessageBus, StoragePort};
use crate::error::CommandError;
use crate::modules::DeviceModule;
use crate::net::topics::{self, Topic};
use crate::sensors::tilt::TiltSensor;
use crate::signal::gate::ReportGate;
use crate::signal::window::MeasurementWindow;

const MODULE: &str = "leveling";
const K: usize = 6;
const SAMPLE_INTERVAL_MS: u64 = 500;

const NVS_NAMESPACE: &str = "leveling";
const NVS_KEY: &str = "zero";

pub struct LevelingModule {
    sensor: TiltSensor,
    /// (pitch, roll) zero offsets in degrees.
    offsets: (f32, f32),
    pitch_window: MeasurementWindow<f32, K>,
    roll_window: MeasurementWindow<f32, K>,
    pitch_gate: ReportGate,
    roll_gate: ReportGate,
    pitch_topic: Topic,
    roll_topic: Topic,
    last_sample_ms: Option<u64>,
    samples_since_eval: usize,
    eval_requested: bool,
    zero_requested: bool,
    last_raw: Option<(f32, f32)>,
}

impl LevelingModule {
    pub fn new(prefix: &str, publish_delta_deg: f32, storage: &dyn StoragePort) -> Self {
        let offsets = load_offsets(storage);
        if offsets != (0.0, 0.0) {
            info!(
                "leveling: zero offsets loaded (pitch {:+.2}°, roll {:+.2}°)",
                offsets.0, offsets.1
            );
        }
        Self {
            sensor: TiltSensor::new(),
            offsets,
            pitch_window: MeasurementWindow::new(),
            roll_window: MeasurementWindow::new(),
            pitch_gate: ReportGate::new(publish_delta_deg),
            roll_gate: ReportGate::new(publish_delta_deg),
            pitch_topic: topics::sensor(prefix, MODULE, "pitch"),
            roll_topic: topics::sensor(prefix, MODULE, "roll"),
            last_sample_ms: None,
            samples_since_eval: 0,
            eval_requested: false,
            zero_requested: false,
            last_raw: None,
        }
    }

    pub fn poll(&mut self, now_ms: u64, bus: &mut dyn MessageBus, storage: &mut dyn StoragePort) {
        let due = match self.last_sample_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= SAMPLE_INTERVAL_MS,
        };
        if due {
            self.last_sample_ms = Some(now_ms);
            let reading = self.sensor.read();
            self.last_raw = Some((reading.pitch_deg, reading.roll_deg));
            self.pitch_window.push(reading.pitch_deg);
            self.roll_window.push(reading.roll_deg);
            self.samples_since_eval += 1;
        }

        // Deferred zeroing: the command only raises a flag, the NVS write
        // happens here in the tick.
        if self.zero_requested {
            if let Some(raw) = self.last_raw {
                self.zero_requested = false;
                self.offsets = raw;
                save_offsets(storage, raw);
                self.pitch_gate.request_resync();
                self.roll_gate.request_resync();
                info!(
                    "leveling: zeroed at pitch {:+.2}°, roll {:+.2}°",
                    raw.0, raw.1
                );
            }
        }

        if self.samples_since_eval >= K || (self.eval_requested && !self.pitch_window.is_empty()) {
            self.samples_since_eval = 0;
            self.eval_requested = false;
            self.evaluate(bus);
        }
    }

    fn evaluate(&mut self, bus: &mut dyn MessageBus) {
        let (Some(pitch_raw), Some(roll_raw)) = (self.pitch_window.mean(), self.roll_window.mean())
        else {
            return;
        };
        let pitch = pitch_raw - self.offsets.0;
        let roll = roll_raw - self.offsets.1;

        publish_angle(bus, &self.pitch_topic, &mut self.pitch_gate, pitch);
        publish_angle(bus, &self.roll_topic, &mut self.roll_gate, roll);
    }
}

fn publish_angle(bus: &mut dyn MessageBus, topic: &Topic, gate: &mut ReportGate, value: f32) {
    if !gate.should_publish(value) {
        return;
    }
    let mut payload = heapless::String::<16>::new();
    let _ = write!(payload, "{value:.1}");
    if bus.publish(topic.as_str(), payload.as_bytes()) {
        gate.commit(value);
    }
}

fn load_offsets(storage: &dyn StoragePort) -> (f32, f32) {
    let mut buf = [0u8; 16];
    match storage.read(NVS_NAMESPACE, NVS_KEY, &mut buf) {
        Ok(len) => match postcard::from_bytes::<(f32, f32)>(&buf[..len]) {
            Ok(offsets) => offsets,
            Err(_) => {
                warn!("leveling: stored zero blob corrupted, using 0/0");
                (0.0, 0.0)
            }
        },
        Err(_) => (0.0, 0.0),
    }
}

fn save_offsets(storage: &mut dyn StoragePort, offsets: (f32, f32)) {
    match postcard::to_allocvec(&offsets) {
        Ok(blob) => {
            if let Err(e) = storage.write(NVS_NAMESPACE, NVS_KEY, &blob) {
                warn!("leveling: zero offset save failed — {e}");
            }
        }
        Err(_) => warn!("leveling: zero offset encode failed"),
    }
}

impl DeviceModule for LevelingModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError> {
        let _ = payload; // both actions take an empty object
        match action {
            "zero" => {
                self.zero_requested = true;
                Ok(())
            }
            "update" | "status" => {
                self.pitch_gate.request_resync();
                self.roll_gate.request_resync();
                self.eval_requested = true;
                Ok(())
            }
            _ => Err(CommandError::UnknownAction),
        }
    }

    fn on_broker_reconnect(&mut self) {
        self.pitch_gate.request_resync();
        self.roll_gate.request_resync();
        self.eval_requested = true;
    }
}
