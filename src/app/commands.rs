//! Inbound command wire types.
//!
//! Commands arrive on `prefix/commands/<module>/<action>` with small JSON
//! payloads. The route is parsed here; each module deserializes its own
//! action payloads with the typed structs below. Any parse failure is a
//! [`CommandError`] — the coordinator logs one line and drops the command.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

// ───────────────────────────────────────────────────────────────
// Topic route
// ───────────────────────────────────────────────────────────────

/// The module/action pair addressed by a command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRoute<'a> {
    pub module: &'a str,
    pub action: &'a str,
}

/// Parse `<prefix>/commands/<module>/<action>`. Anything else is `None`.
pub fn parse_route<'a>(prefix: &str, topic: &'a str) -> Option<CommandRoute<'a>> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let rest = rest.strip_prefix("commands/")?;
    let (module, action) = rest.split_once('/')?;
    if module.is_empty() || action.is_empty() || action.contains('/') {
        return None;
    }
    Some(CommandRoute { module, action })
}

/// Deserialize a JSON payload into a typed command struct.
pub fn parse_payload<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, CommandError> {
    serde_json::from_slice(payload).map_err(|_| CommandError::MalformedPayload)
}

// ───────────────────────────────────────────────────────────────
// Shared payload shapes
// ───────────────────────────────────────────────────────────────

/// `{"value": <0-255>[, "channel": <n>]}` — channel defaults to 0.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ValueCommand {
    pub value: u8,
    #[serde(default)]
    pub channel: usize,
}

/// `{"value": "ON"|"OFF"[, "channel": <n>]}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SwitchCommand {
    pub value: SwitchState,
    #[serde(default)]
    pub channel: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    On,
    Off,
}

/// `{"interval_ms": <u32>[, "channel": <n>]}` — 0 stops blinking.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BlinkCommand {
    pub interval_ms: u32,
    #[serde(default)]
    pub channel: usize,
}

/// `{"circle": <0-3>, "mode": "OFF"|"ON"|"AUTO"}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CircleModeCommand {
    pub circle: usize,
    pub mode: CircleMode,
}

/// Heating circle operating mode. Also appears in status payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CircleMode {
    Off,
    On,
    Auto,
}

/// `{"direction": "UP"|"DOWN"|"STOP"}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MoveCommand {
    pub direction: MoveDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoveDirection {
    Up,
    Down,
    Stop,
}
