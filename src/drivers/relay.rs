//! Latching relay output.
//!
//! Thin wrapper over a single GPIO that caches the commanded state so
//! callers can read back and edge-detect without touching the register.

use log::debug;

use crate::drivers::hw_init;

pub struct Relay {
    gpio: i32,
    label: &'static str,
    closed: bool,
}

impl Relay {
    /// Construct in the open (de-energised) state. The GPIO itself was
    /// driven low during `hw_init::init_peripherals`.
    pub fn new(gpio: i32, label: &'static str) -> Self {
        Self {
            gpio,
            label,
            closed: false,
        }
    }

    /// Command the relay. No-op if already in the requested state.
    pub fn set(&mut self, closed: bool) {
        if closed == self.closed {
            return;
        }
        hw_init::gpio_write(self.gpio, closed);
        self.closed = closed;
        debug!("relay {}: {}", self.label, if closed { "closed" } else { "open" });
    }

    /// Force open regardless of cached state (safe-state path).
    pub fn open(&mut self) {
        self.set(false);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
