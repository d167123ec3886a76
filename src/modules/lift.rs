//! Table lift / damper motor module.
//!
//! One motor behind an up/down relay pair, mutually exclusive by
//! construction: a direction's relay is only closed after the opposite
//! relay has been opened in the same tick.
//!
//! Motion sources, in priority order:
//! 1. the up/down wall buttons — the motor runs while a button is HELD
//!    and stops on release (the canonical continuous button action);
//! 2. `move` commands from the broker, which stay active until STOP.
//!
//! Either source is cut by the maximum-run safety cap; after a cap trip
//! the motor stays off until every motion request has been withdrawn.

use core::sync::atomic::AtomicBool;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use log::{info, warn};

use crate::app::commands::{parse_payload, MoveCommand, MoveDirection};
use crate::app::ports::MessageBus;
use crate::drivers::button::DebouncedButton;
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::drivers::relay::Relay;
use crate::error::CommandError;
use crate::modules::DeviceModule;
use crate::net::topics::{self, Topic};
use crate::pins;

const MODULE: &str = "lift";

static SIM_BTN_UP: AtomicBool = AtomicBool::new(false);
static SIM_BTN_DOWN: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_buttons(up: bool, down: bool) {
    SIM_BTN_UP.store(up, Ordering::Relaxed);
    SIM_BTN_DOWN.store(down, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftState {
    Idle,
    Up,
    Down,
}

impl LiftState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

pub struct LiftModule {
    up_relay: Relay,
    down_relay: Relay,
    btn_up: DebouncedButton,
    btn_down: DebouncedButton,
    state: LiftState,
    run_started_ms: Option<u64>,
    max_run_ms: u64,
    /// Active broker-commanded motion, cleared by STOP or the run cap.
    command_motion: Option<LiftState>,
    /// Run-cap latch: motion stays off until all requests are withdrawn.
    timed_out: bool,
    topic: Topic,
    last_published: Option<LiftState>,
    pending_status: bool,
}

impl LiftModule {
    pub fn new(prefix: &str, settle_ms: u64, hold_ms: u64, max_run_ms: u64) -> Self {
        Self {
            up_relay: Relay::new(pins::LIFT_UP_RELAY_GPIO, "lift_up"),
            down_relay: Relay::new(pins::LIFT_DOWN_RELAY_GPIO, "lift_down"),
            btn_up: DebouncedButton::new(settle_ms, hold_ms),
            btn_down: DebouncedButton::new(settle_ms, hold_ms),
            state: LiftState::Idle,
            run_started_ms: None,
            max_run_ms,
            command_motion: None,
            timed_out: false,
            topic: topics::sensor(prefix, MODULE, "state"),
            last_published: None,
            pending_status: false,
        }
    }

    pub fn poll(&mut self, now_ms: u64, bus: &mut dyn MessageBus) {
        let (raw_up, raw_down) = self.read_buttons_raw();
        let _ = self.btn_up.update(now_ms, raw_up);
        let _ = self.btn_down.update(now_ms, raw_down);

        let desired = self.desired_motion();

        if desired == LiftState::Idle {
            self.timed_out = false;
        }

        let desired = if self.timed_out { LiftState::Idle } else { desired };

        if desired != self.state {
            self.state = desired;
            self.run_started_ms = (desired != LiftState::Idle).then_some(now_ms);
            info!("lift: {}", self.state.as_str());
        }

        // Maximum-run safety cap, regardless of motion source.
        if let Some(started) = self.run_started_ms {
            if self.state != LiftState::Idle && now_ms.wrapping_sub(started) >= self.max_run_ms {
                warn!("lift: maximum run time reached, stopping");
                self.state = LiftState::Idle;
                self.run_started_ms = None;
                self.command_motion = None;
                self.timed_out = true;
            }
        }

        self.apply_relays();

        if self.pending_status || self.last_published != Some(self.state) {
            if bus.publish(self.topic.as_str(), self.state.as_str().as_bytes()) {
                self.last_published = Some(self.state);
                self.pending_status = false;
            }
        }
    }

    fn desired_motion(&self) -> LiftState {
        match (self.btn_up.is_held(), self.btn_down.is_held()) {
            (true, false) => LiftState::Up,
            (false, true) => LiftState::Down,
            // Both held: contradictory input, stop.
            (true, true) => LiftState::Idle,
            (false, false) => self.command_motion.unwrap_or(LiftState::Idle),
        }
    }

    /// Open the inactive relay before closing the active one so both are
    /// never closed within the same tick.
    fn apply_relays(&mut self) {
        if self.state != LiftState::Up {
            self.up_relay.open();
        }
        if self.state != LiftState::Down {
            self.down_relay.open();
        }
        match self.state {
            LiftState::Up => self.up_relay.set(true),
            LiftState::Down => self.down_relay.set(true),
            LiftState::Idle => {}
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_buttons_raw(&self) -> (bool, bool) {
        // Active-low with external pull-ups.
        (
            !hw_init::gpio_read(pins::LIFT_BUTTON_UP_GPIO),
            !hw_init::gpio_read(pins::LIFT_BUTTON_DOWN_GPIO),
        )
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_buttons_raw(&self) -> (bool, bool) {
        (
            SIM_BTN_UP.load(Ordering::Relaxed),
            SIM_BTN_DOWN.load(Ordering::Relaxed),
        )
    }

    #[cfg(test)]
    fn relays(&self) -> (bool, bool) {
        (self.up_relay.is_closed(), self.down_relay.is_closed())
    }
}

impl DeviceModule for LiftModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError> {
        match action {
            "move" => {
                let cmd: MoveCommand = parse_payload(payload)?;
                self.command_motion = match cmd.direction {
                    MoveDirection::Up => Some(LiftState::Up),
                    MoveDirection::Down => Some(LiftState::Down),
                    MoveDirection::Stop => None,
                };
                info!("lift: move command {:?}", cmd.direction);
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
