//! Integration test entry point.
//!
//! Runs on the host target only — the simulation backends stand in for
//! GPIO/ADC/WiFi/MQTT, so the full coordinator stack is exercised without
//! hardware.

#![cfg(not(target_os = "espidf"))]

mod coordinator_tests;
mod support;
