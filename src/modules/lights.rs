//! LED strip lighting module.
//!
//! Two channels (monochrome ceiling strip, RGB accent strip) share one
//! controller. Each channel keeps a user level, a fade engine that walks
//! the physical output toward its target a step per tick, an optional
//! blink interval, and a wall button:
//!
//! - short press — toggle the channel;
//! - hold — continuous dimming while HELD, ramp direction reversing on
//!   each new hold, terminated by release.
//!
//! State `{"power","level"}` per channel is published change-gated; the
//! fade itself never publishes, only settled user state does.

use core::sync::atomic::AtomicBool;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use log::{debug, info};
use serde::Serialize;

use crate::app::commands::{
    parse_payload, BlinkCommand, SwitchCommand, SwitchState, ValueCommand,
};
use crate::app::ports::MessageBus;
use crate::drivers::button::{ButtonEvent, DebouncedButton};
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::drivers::strip::StripOutput;
use crate::error::CommandError;
use crate::modules::DeviceModule;
use crate::net::topics::{self, Topic};
use crate::pins;

const MODULE: &str = "lights";
pub const CHANNEL_COUNT: usize = 2;
/// Dimming never walks a lit channel fully dark.
const MIN_DIM_LEVEL: u8 = 10;
/// Level restored by a toggle-on before any dimming happened.
const DEFAULT_ON_LEVEL: u8 = 180;

static SIM_BUTTON_PRESSED: [AtomicBool; CHANNEL_COUNT] =
    [AtomicBool::new(false), AtomicBool::new(false)];

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_button(channel: usize, pressed: bool) {
    SIM_BUTTON_PRESSED[channel].store(pressed, Ordering::Relaxed);
}

/// Published per-channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub power: bool,
    pub level: u8,
}

struct LightChannel {
    index: usize,
    output: StripOutput,
    button: DebouncedButton,
    _button_gpio: i32,
    power: bool,
    /// Physical output position (fade walks this toward `target`).
    level: u8,
    target: u8,
    /// User-chosen brightness, restored on toggle-on.
    on_level: u8,
    blink_interval_ms: u32,
    blink_phase_ms: u64,
    blink_dark: bool,
    dim_up: bool,
    last_applied: u8,
}

impl LightChannel {
    fn new(index: usize, output: StripOutput, button_gpio: i32, settle_ms: u64, hold_ms: u64) -> Self {
        Self {
            index,
            output,
            button: DebouncedButton::new(settle_ms, hold_ms),
            _button_gpio: button_gpio,
            power: false,
            level: 0,
            target: 0,
            on_level: DEFAULT_ON_LEVEL,
            blink_interval_ms: 0,
            blink_phase_ms: 0,
            blink_dark: false,
            dim_up: false,
            last_applied: 0,
        }
    }

    fn tick(&mut self, now_ms: u64, delta_ms: u64, fade_ms: u32, dim_step: u8) {
        let raw = self.read_button_raw();
        match self.button.update(now_ms, raw) {
            Some(ButtonEvent::ShortPress) => self.toggle(),
            Some(ButtonEvent::HoldStart) => {
                // Dimming implies light on; each new hold on a lit channel
                // reverses direction, a dark channel always ramps up.
                if self.power {
                    self.dim_up = !self.dim_up;
                } else {
                    self.power = true;
                    self.on_level = MIN_DIM_LEVEL;
                    self.dim_up = true;
                }
                info!(
                    "lights: channel {} dim {} start",
                    self.index,
                    if self.dim_up { "up" } else { "down" }
                );
            }
            Some(ButtonEvent::Released) => {
                debug!("lights: channel {} dim end at {}", self.index, self.on_level);
            }
            None => {}
        }

        // Continuous action: re-evaluated every tick while held.
        if self.button.is_held() && self.power {
            self.on_level = if self.dim_up {
                self.on_level.saturating_add(dim_step)
            } else {
                self.on_level.saturating_sub(dim_step).max(MIN_DIM_LEVEL)
            };
            self.target = self.on_level;
            // Dimming tracks the hand directly — no fade lag.
            self.level = self.target;
        } else {
            self.target = if self.power { self.on_level } else { 0 };
            self.fade_toward_target(delta_ms, fade_ms);
        }

        self.advance_blink(delta_ms);
        self.apply_output();
    }

    fn toggle(&mut self) {
        self.power = !self.power;
        info!(
            "lights: channel {} toggled {}",
            self.index,
            if self.power { "on" } else { "off" }
        );
    }

    fn fade_toward_target(&mut self, delta_ms: u64, fade_ms: u32) {
        if self.level == self.target {
            return;
        }
        let step = ((255 * delta_ms) / u64::from(fade_ms.max(1))).clamp(1, 255) as u8;
        self.level = if self.level < self.target {
            self.level.saturating_add(step).min(self.target)
        } else {
            self.level.saturating_sub(step).max(self.target)
        };
    }

    fn advance_blink(&mut self, delta_ms: u64) {
        if self.blink_interval_ms == 0 || !self.power {
            self.blink_dark = false;
            self.blink_phase_ms = 0;
            return;
        }
        self.blink_phase_ms += delta_ms;
        if self.blink_phase_ms >= u64::from(self.blink_interval_ms) {
            self.blink_phase_ms = 0;
            self.blink_dark = !self.blink_dark;
        }
    }

    fn apply_output(&mut self) {
        let applied = if self.blink_dark { 0 } else { self.level };
        if applied != self.last_applied {
            self.output.apply(applied);
            self.last_applied = applied;
        }
    }

    fn state(&self) -> ChannelState {
        ChannelState {
            power: self.power,
            level: self.on_level,
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_button_raw(&self) -> bool {
        // Active-low with external pull-up.
        !hw_init::gpio_read(self._button_gpio)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_button_raw(&self) -> bool {
        SIM_BUTTON_PRESSED[self.index].load(Ordering::Relaxed)
    }
}

pub struct LightsModule {
    channels: [LightChannel; CHANNEL_COUNT],
    topic: Topic,
    fade_ms: u32,
    dim_step: u8,
    last_poll_ms: Option<u64>,
    last_published: Option<[ChannelState; CHANNEL_COUNT]>,
    pending_status: bool,
}

impl LightsModule {
    pub fn new(prefix: &str, settle_ms: u64, hold_ms: u64, fade_ms: u32, dim_step: u8) -> Self {
        let outputs = [
            StripOutput::Mono {
                channel: pins::LIGHT_MONO_LEDC_CH,
            },
            StripOutput::Rgb {
                channels: pins::LIGHT_RGB_LEDC_CH,
                colour: (255, 190, 120), // warm white tint
            },
        ];
        Self {
            channels: core::array::from_fn(|i| {
                LightChannel::new(i, outputs[i], pins::LIGHT_BUTTON_GPIOS[i], settle_ms, hold_ms)
            }),
            topic: topics::sensor(prefix, MODULE, "state"),
            fade_ms,
            dim_step,
            last_poll_ms: None,
            last_published: None,
            pending_status: false,
        }
    }

    pub fn poll(&mut self, now_ms: u64, bus: &mut dyn MessageBus) {
        let delta_ms = match self.last_poll_ms {
            None => 0,
            Some(last) => now_ms.wrapping_sub(last),
        };
        self.last_poll_ms = Some(now_ms);

        for channel in &mut self.channels {
            channel.tick(now_ms, delta_ms, self.fade_ms, self.dim_step);
        }

        let current: [ChannelState; CHANNEL_COUNT] =
            core::array::from_fn(|i| self.channels[i].state());
        if self.pending_status || self.last_published != Some(current) {
            let Ok(json) = serde_json::to_vec(&current) else {
                return;
            };
            if bus.publish(self.topic.as_str(), &json) {
                self.last_published = Some(current);
                self.pending_status = false;
            }
        }
    }

    fn channel_checked(&mut self, index: usize) -> Result<&mut LightChannel, CommandError> {
        self.channels
            .get_mut(index)
            .ok_or(CommandError::InvalidValue)
    }

    #[cfg(test)]
    fn channel_level(&self, index: usize) -> u8 {
        self.channels[index].level
    }

    #[cfg(test)]
    fn channel_power(&self, index: usize) -> bool {
        self.channels[index].power
    }
}

impl DeviceModule for LightsModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError> {
        match action {
            "level" => {
                let cmd: ValueCommand = parse_payload(payload)?;
                let channel = self.channel_checked(cmd.channel)?;
                channel.on_level = cmd.value.max(MIN_DIM_LEVEL);
                channel.power = cmd.value > 0;
                info!("lights: channel {} level → {}", cmd.channel, cmd.value);
            }
            "power" => {
                let cmd: SwitchCommand = parse_payload(payload)?;
                let channel = self.channel_checked(cmd.channel)?;
                channel.power = cmd.value == SwitchState::On;
                info!("lights: channel {} power → {:?}", cmd.channel, cmd.value);
            }
            "blink" => {
                let cmd: BlinkCommand = parse_payload(payload)?;
                let channel = self.channel_checked(cmd.channel)?;
                channel.blink_interval_ms = cmd.interval_ms;
                info!(
                    "lights: channel {} blink interval → {}ms",
                    cmd.channel, cmd.interval_ms
                );
            }
            "status" => {}
            _ => return Err(CommandError::UnknownAction),
        }
        // All paths answer with a deferred status on the next poll.
        self.pending_status = true;
        Ok(())
    }

    fn on_broker_reconnect(&mut self) {
        self.pending_status = true;
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    struct RecordingBus(Vec<Vec<u8>>);

    impl MessageBus for RecordingBus {
        fn publish(&mut self, _topic: &str, payload: &[u8]) -> bool {
            self.0.push(payload.to_vec());
            true
        }
    }

    // One test body: the simulated buttons are process-wide statics and
    // must not be raced by the parallel test runner.
    #[test]
    fn lights_behavior() {
        let mut m = LightsModule::new("camper", 60, 400, 800, 3);
        let mut bus = RecordingBus(Vec::new());
        let now = core::cell::Cell::new(0u64);
        let step = |m: &mut LightsModule, bus: &mut RecordingBus, n: u32| {
            for _ in 0..n {
                now.set(now.get() + 50);
                m.poll(now.get(), bus);
            }
        };

        // Boot publish.
        m.poll(now.get(), &mut bus);
        assert_eq!(bus.0.len(), 1);

        // Level command fades channel 0 up to the target.
        m.handle_command("level", br#"{"value":200,"channel":0}"#).unwrap();
        step(&mut m, &mut bus, 20); // a full second — fade is 800ms
        assert_eq!(m.channel_level(0), 200);
        assert!(m.channel_power(0));
        let state: serde_json::Value = serde_json::from_slice(bus.0.last().unwrap()).unwrap();
        assert_eq!(state[0]["power"], true);
        assert_eq!(state[0]["level"], 200);

        // Power off fades back to dark.
        m.handle_command("power", br#"{"value":"OFF","channel":0}"#).unwrap();
        step(&mut m, &mut bus, 20);
        assert_eq!(m.channel_level(0), 0);
        assert!(!m.channel_power(0));

        // Short press toggles channel 1 on.
        sim_set_button(1, true);
        step(&mut m, &mut bus, 3); // press settles
        sim_set_button(1, false);
        step(&mut m, &mut bus, 3); // release settles → ShortPress
        assert!(m.channel_power(1));

        // Hold dims: level ramps while the button stays down.
        sim_set_button(1, true);
        step(&mut m, &mut bus, 12); // settle + hold threshold
        let before = m.channels[1].on_level;
        step(&mut m, &mut bus, 5);
        let after = m.channels[1].on_level;
        assert_ne!(before, after, "held button must keep adjusting the level");
        sim_set_button(1, false);
        step(&mut m, &mut bus, 3);
        let released = m.channels[1].on_level;
        step(&mut m, &mut bus, 5);
        assert_eq!(released, m.channels[1].on_level, "release ends the ramp");

        // Blink gates the physical output without touching user state.
        m.handle_command("blink", br#"{"interval_ms":200,"channel":1}"#).unwrap();
        let lit_level = m.channels[1].on_level;
        step(&mut m, &mut bus, 5); // 250ms — at least one dark phase
        assert_eq!(m.channels[1].on_level, lit_level);
        m.handle_command("blink", br#"{"interval_ms":0,"channel":1}"#).unwrap();
        step(&mut m, &mut bus, 2);
        assert!(!m.channels[1].blink_dark);

        // Unknown channel / action are typed errors.
        assert_eq!(
            m.handle_command("level", br#"{"value":10,"channel":9}"#),
            Err(CommandError::InvalidValue)
        );
        assert_eq!(m.handle_command("strobe", b"{}"), Err(CommandError::UnknownAction));
    }
}
