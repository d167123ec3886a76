//! Device modules — one self-contained component per camper subsystem.
//!
//! Each module owns its sensors/actuators, debounce timers, measurement
//! windows, and publish gates. The coordinator calls the concrete `poll`
//! methods once per tick and routes inbound commands through the
//! [`DeviceModule`] trait.

pub mod climate;
pub mod heating;
pub mod leveling;
pub mod lift;
pub mod lights;
pub mod water;

use crate::error::CommandError;

/// Uniform command/reconnect surface over the heterogeneous modules.
///
/// Polling stays concrete (signatures differ — leveling needs storage),
/// so this trait carries only what the coordinator dispatches generically.
pub trait DeviceModule {
    /// Module segment in command/telemetry topics.
    fn name(&self) -> &'static str;

    /// Handle one inbound command. Errors are logged by the coordinator
    /// and the command is dropped — no reply, no retry.
    fn handle_command(&mut self, action: &str, payload: &[u8]) -> Result<(), CommandError>;

    /// The broker session was re-established: resynchronise consumer
    /// state by republishing on the next poll.
    fn on_broker_reconnect(&mut self);
}
