//! Fresh-water tank level module.
//!
//! Samples the probe bank once a second into a mode-of-K window. The
//! published level is the statistical mode with ties resolved toward the
//! higher value — when in doubt the display reads "more full", which is
//! the conservative direction for a level gauge that mostly warns about
//! running dry through its own drift.

use log::debug;

use crate::app::ports::MessageBus;
use crate::error::CommandError;
use crate::modules::DeviceModule;
use crate::net::topics::{self, Topic};
use crate::sensors::probes::ProbeBank;
use crate::signal::gate::ReportGate;
use crate::signal::window::MeasurementWindow;

const MODULE: &str = "water";
/// Window length and evaluation cadence.
const K: usize = 5;
const SAMPLE_INTERVAL_MS: u64 = 1_000;
/// Publish on any level step.
const PUBLISH_THRESHOLD: f32 = 1.0;

pub struct WaterModule {
    bank: ProbeBank,
    window: MeasurementWindow<u8, K>,
    gate: ReportGate,
    topic: Topic,
    last_sample_ms: Option<u64>,
    samples_since_eval: usize,
    eval_requested: bool,
}

impl WaterModule {
    pub fn new(prefix: &str) -> Self {
        Self {
            bank: ProbeBank::new(),
            window: MeasurementWindow::new(),
            gate: ReportGate::new(PUBLISH_THRESHOLD),
            topic: topics::sensor(prefix, MODULE, "level"),
            last_sample_ms: None,
            samples_since_eval: 0,
            eval_requested: false,
        }
    }

    pub fn poll(&mut self, now_ms: u64, bus: &mut dyn MessageBus) {
        let due = match self.last_sample_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= SAMPLE_INTERVAL_MS,
        };
        if due {
            self.last_sample_ms = Some(now_ms);
            self.window.push(self.bank.read_level());
            self.samples_since_eval += 1;
        }

        if self.samples_since_eval >= K || (self.eval_requested && !self.window.is_empty()) {
            self.samples_since_eval = 0;
            self.eval_requested = false;
            self.evaluate(bus);
        }
    }

    fn evaluate(&mut self, bus: &mut dyn MessageBus) {
        let Some(level) = self.window.mode() else {
            return;
        };
        let value = f32::from(level);
        if !self.gate.should_publish(value) {
            return;
        }
        let mut payload = heapless::String::<8>::new();
        let _ = core::fmt::Write::write_fmt(&mut payload, format_args!("{level}"));
        if bus.publish(self.topic.as_str(), payload.as_bytes()) {
            self.gate.commit(value);
        }
    }
}

impl DeviceModule for WaterModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError> {
        let _ = payload; // both actions take an empty object
        match action {
            // Force a fresh publish regardless of the change gate.
            "update" | "status" => {
                debug!("water: forced update requested");
                self.gate.request_resync();
                self.eval_requested = true;
                Ok(())
            }
            _ => Err(CommandError::UnknownAction),
        }
    }

    fn on_broker_reconnect(&mut self) {
        self.gate.request_resync();
        self.eval_requested = true;
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::sensors::probes;

    struct RecordingBus(Vec<(String, Vec<u8>)>);

    impl MessageBus for RecordingBus {
        fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
            self.0.push((topic.into(), payload.to_vec()));
            true
        }
    }

    // Single test: the probe sim static is shared process-wide.
    #[test]
    fn publishes_mode_and_gates_repeats() {
        let _lock = crate::sensors::probes::TEST_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut m = WaterModule::new("camper");
        let mut bus = RecordingBus(Vec::new());

        probes::sim_set_wet_count(3);
        // Five one-second samples fill the window and trigger evaluation.
        for i in 0..5u64 {
            m.poll(i * 1_000, &mut bus);
        }
        assert_eq!(bus.0.len(), 1);
        assert_eq!(bus.0[0].0, "camper/sensors/water/level");
        assert_eq!(bus.0[0].1, b"3");

        // Same level for another window: change-gated, nothing new.
        for i in 5..10u64 {
            m.poll(i * 1_000, &mut bus);
        }
        assert_eq!(bus.0.len(), 1);

        // Level drops one step: published after the next full window.
        probes::sim_set_wet_count(2);
        for i in 10..20u64 {
            m.poll(i * 1_000, &mut bus);
        }
        assert_eq!(bus.0.last().unwrap().1, b"2");

        // Forced update republishes immediately even without change.
        let published_before = bus.0.len();
        m.handle_command("update", b"{}").unwrap();
        m.poll(20_000, &mut bus);
        assert_eq!(bus.0.len(), published_before + 1);
    }
}
