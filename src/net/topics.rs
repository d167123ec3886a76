//! Topic name construction.
//!
//! All topics live under one compile-time prefix:
//!
//! ```text
//! <prefix>/sensors/<module>/<metric>    telemetry
//! <prefix>/commands/<module>/<action>   control (subscribed as wildcard)
//! <prefix>/heartbeat/<moduleId>         liveness
//! ```

use core::fmt::Write;

/// Fixed-capacity topic string — topics are short and bounded by design.
pub type Topic = heapless::String<96>;

pub fn sensor(prefix: &str, module: &str, metric: &str) -> Topic {
    let mut t = Topic::new();
    // Capacity is sized for the longest topic in the system; overflow would
    // silently truncate, so it is asserted in tests instead.
    let _ = write!(t, "{prefix}/sensors/{module}/{metric}");
    t
}

pub fn command_wildcard(prefix: &str) -> Topic {
    let mut t = Topic::new();
    let _ = write!(t, "{prefix}/commands/#");
    t
}

pub fn heartbeat(prefix: &str, module_id: &str) -> Topic {
    let mut t = Topic::new();
    let _ = write!(t, "{prefix}/heartbeat/{module_id}");
    t
}
