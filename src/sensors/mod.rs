//! Sensor drivers.
//!
//! Each driver is dual-target: on ESP-IDF it reads real peripherals via
//! the hw_init helpers; on host/test targets it reads from static atomics
//! with `sim_set_*` injectors.

pub mod dht;
pub mod ntc;
pub mod probes;
pub mod tilt;
