//! Application core — tick orchestration and the port boundary.
//!
//! The [`service::Coordinator`] sequences every component's non-blocking
//! `poll()` once per tick. Device modules reach the outside world only
//! through the port traits in [`ports`], keeping them fully testable with
//! mock adapters.

pub mod commands;
pub mod ports;
pub mod service;
