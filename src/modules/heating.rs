//! Floor heating module — four independent circles.
//!
//! Each circle pairs an NTC floor sensor with a relay and runs one of
//! three modes: OFF, ON (relay forced closed), or AUTO with two-threshold
//! hysteresis: the relay closes below `turn_on_c`, opens above
//! `turn_off_c`, and holds its state in between.
//!
//! Invalid readings are logged and discarded with the last valid value
//! retained for control. Three consecutive invalid readings latch a
//! sensor fault: the circle is forced off exactly once and `error` is
//! raised in the next status batch; a single valid reading clears it.

use log::{error, info, warn};
use serde::Serialize;

use crate::app::commands::{parse_payload, CircleMode, CircleModeCommand};
use crate::app::ports::MessageBus;
use crate::config::CircleConfig;
use crate::drivers::relay::Relay;
use crate::error::CommandError;
use crate::modules::DeviceModule;
use crate::net::topics::{self, Topic};
use crate::pins;
use crate::sensors::ntc::NtcSensor;

const MODULE: &str = "heating";
pub const CIRCLE_COUNT: usize = 4;
const SAMPLE_INTERVAL_MS: u64 = 1_000;
/// Invalid-read streak that disables a circle.
const FAULT_STREAK: u8 = 3;

/// One row of the published status batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleStatus {
    pub mode: CircleMode,
    pub relay: bool,
    pub temperature: Option<f32>,
    pub error: bool,
}

struct Circle {
    sensor: NtcSensor,
    relay: Relay,
    config: CircleConfig,
    mode: CircleMode,
    last_temp: Option<f32>,
    invalid_streak: u8,
    fault: bool,
}

impl Circle {
    fn new(index: usize, config: CircleConfig) -> Self {
        static LABELS: [&str; CIRCLE_COUNT] = ["circle0", "circle1", "circle2", "circle3"];
        Self {
            sensor: NtcSensor::new(index),
            relay: Relay::new(pins::HEATING_RELAY_GPIOS[index], LABELS[index]),
            config,
            mode: CircleMode::Auto,
            last_temp: None,
            invalid_streak: 0,
            fault: false,
        }
    }

    fn sample(&mut self, index: usize) {
        match self.sensor.read() {
            Ok(temp) => {
                self.last_temp = Some(temp);
                self.invalid_streak = 0;
                if self.fault {
                    info!("heating: circle {index} sensor recovered ({temp:.1}°C)");
                    self.fault = false;
                }
            }
            Err(e) => {
                warn!("heating: circle {index} invalid reading — {e}");
                if !self.fault {
                    self.invalid_streak = self.invalid_streak.saturating_add(1);
                    if self.invalid_streak >= FAULT_STREAK {
                        error!("heating: circle {index} sensor failed, forcing off");
                        self.fault = true;
                    }
                }
            }
        }
    }

    fn apply_control(&mut self) {
        let close = if self.fault {
            false
        } else {
            match self.mode {
                CircleMode::Off => false,
                CircleMode::On => true,
                CircleMode::Auto => match self.last_temp {
                    // No reading yet: stay off rather than heat blind.
                    None => false,
                    Some(t) if t < self.config.turn_on_c => true,
                    Some(t) if t > self.config.turn_off_c => false,
                    // Inside the hysteresis band: hold.
                    Some(_) => self.relay.is_closed(),
                },
            }
        };
        self.relay.set(close);
    }

    fn status(&self) -> CircleStatus {
        CircleStatus {
            mode: self.mode,
            relay: self.relay.is_closed(),
            temperature: if self.fault { None } else { self.last_temp },
            error: self.fault,
        }
    }
}

pub struct HeatingModule {
    circles: [Circle; CIRCLE_COUNT],
    topic: Topic,
    publish_delta_c: f32,
    last_sample_ms: Option<u64>,
    last_published: Option<[CircleStatus; CIRCLE_COUNT]>,
    pending_status: bool,
}

impl HeatingModule {
    pub fn new(prefix: &str, circles: [CircleConfig; CIRCLE_COUNT], publish_delta_c: f32) -> Self {
        Self {
            circles: core::array::from_fn(|i| Circle::new(i, circles[i])),
            topic: topics::sensor(prefix, MODULE, "status"),
            publish_delta_c,
            last_sample_ms: None,
            last_published: None,
            pending_status: false,
        }
    }

    pub fn poll(&mut self, now_ms: u64, bus: &mut dyn MessageBus) {
        let due = match self.last_sample_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= SAMPLE_INTERVAL_MS,
        };
        if due {
            self.last_sample_ms = Some(now_ms);
            for index in 0..CIRCLE_COUNT {
                self.circles[index].sample(index);
                self.circles[index].apply_control();
            }
        }

        let current: [CircleStatus; CIRCLE_COUNT] = core::array::from_fn(|i| self.circles[i].status());
        if self.pending_status || self.batch_changed(&current) {
            let Ok(json) = serde_json::to_vec(&current) else {
                return;
            };
            if bus.publish(self.topic.as_str(), &json) {
                self.last_published = Some(current);
                self.pending_status = false;
            }
        }
    }

    /// A batch is worth publishing when any circle changed mode, relay, or
    /// error state, or its temperature moved at least the configured delta.
    fn batch_changed(&self, current: &[CircleStatus; CIRCLE_COUNT]) -> bool {
        let Some(previous) = &self.last_published else {
            // First status after boot.
            return true;
        };
        previous.iter().zip(current.iter()).any(|(prev, cur)| {
            if prev.mode != cur.mode || prev.relay != cur.relay || prev.error != cur.error {
                return true;
            }
            match (prev.temperature, cur.temperature) {
                (Some(a), Some(b)) => (a - b).abs() >= self.publish_delta_c,
                (None, None) => false,
                _ => true,
            }
        })
    }

    #[cfg(test)]
    fn circle_relay(&self, index: usize) -> bool {
        self.circles[index].relay.is_closed()
    }

    #[cfg(test)]
    fn set_circle_temp(&mut self, index: usize, temp: Option<f32>) {
        self.circles[index].last_temp = temp;
    }
}

impl DeviceModule for HeatingModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError> {
        match action {
            "mode" => {
                let cmd: CircleModeCommand = parse_payload(payload)?;
                if cmd.circle >= CIRCLE_COUNT {
                    return Err(CommandError::InvalidValue);
                }
                info!("heating: circle {} mode → {:?}", cmd.circle, cmd.mode);
                self.circles[cmd.circle].mode = cmd.mode;
                self.circles[cmd.circle].apply_control();
                // Status goes out on the next tick, not from the receive path.
                self.pending_status = true;
                Ok(())
            }
            "status" => {
                self.pending_status = true;
                Ok(())
            }
            _ => Err(CommandError::UnknownAction),
        }
    }

    fn on_broker_reconnect(&mut self) {
        self.pending_status = true;
    }
}
