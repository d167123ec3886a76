//! Polled debounced-button state machine.
//!
//! Converts a noisy raw digital input into a clean press/hold/release
//! sequence. The raw reading is injected each tick along with the current
//! monotonic time, so the whole machine is a pure transition function —
//! unit-testable with synthetic time and scripted input sequences.
//!
//! ```text
//! IDLE ──stable press──▶ PRESSED ──held ≥ threshold──▶ HELD
//!   ▲                      │ release < threshold         │ release
//!   │                      ▼                             ▼
//!   └──────────────── ShortPress                     Released
//! ```
//!
//! A raw level is accepted as stable only once it has not changed for the
//! full settle window. While HELD the owner re-evaluates its continuous
//! action (dimming, motor run) every tick via [`DebouncedButton::is_held`].
//! Buttons sharing a pin header each own an independent instance; each
//! instance must be fed exactly one physical pin's raw level.

/// Logical button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Pressed,
    Held,
}

/// Edge events emitted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Released before the hold threshold — the discrete action fires once.
    ShortPress,
    /// The press crossed the hold threshold — a continuous action begins.
    HoldStart,
    /// Release out of HELD — the continuous action terminates.
    Released,
}

pub struct DebouncedButton {
    settle_ms: u64,
    hold_ms: u64,
    last_raw: bool,
    last_change_ms: u64,
    stable: bool,
    state: ButtonState,
    pressed_at_ms: u64,
}

impl DebouncedButton {
    pub fn new(settle_ms: u64, hold_ms: u64) -> Self {
        Self {
            settle_ms,
            hold_ms,
            last_raw: false,
            last_change_ms: 0,
            stable: false,
            state: ButtonState::Idle,
            pressed_at_ms: 0,
        }
    }

    /// Feed one raw sample. `raw` is true while the button is physically
    /// pressed. Returns a classified edge event, if any.
    pub fn update(&mut self, now_ms: u64, raw: bool) -> Option<ButtonEvent> {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now_ms;
        }

        if self.last_raw != self.stable
            && now_ms.wrapping_sub(self.last_change_ms) >= self.settle_ms
        {
            self.stable = self.last_raw;
            if let Some(event) = self.stable_edge(now_ms) {
                return Some(event);
            }
        }

        self.promote_hold(now_ms)
    }

    /// True while the stable state is HELD (continuous-action window).
    pub fn is_held(&self) -> bool {
        self.state == ButtonState::Held
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    // ── Internal ──────────────────────────────────────────────

    fn stable_edge(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        if self.stable {
            if self.state == ButtonState::Idle {
                self.state = ButtonState::Pressed;
                self.pressed_at_ms = now_ms;
            }
            None
        } else {
            match self.state {
                ButtonState::Pressed => {
                    self.state = ButtonState::Idle;
                    Some(ButtonEvent::ShortPress)
                }
                ButtonState::Held => {
                    self.state = ButtonState::Idle;
                    Some(ButtonEvent::Released)
                }
                ButtonState::Idle => None,
            }
        }
    }

    fn promote_hold(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        if self.state == ButtonState::Pressed
            && now_ms.wrapping_sub(self.pressed_at_ms) >= self.hold_ms
        {
            self.state = ButtonState::Held;
            return Some(ButtonEvent::HoldStart);
        }
        None
    }
}
