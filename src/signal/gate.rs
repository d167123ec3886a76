//! Change-gated publish policy.
//!
//! A value goes out if and only if it is the first valid reading, it moved
//! at least the per-sensor threshold since the last *successful* publish,
//! or a resync was requested (force-update command or broker reconnect).
//! The gate commits only on publish success, so a failed fire-and-forget
//! publish is naturally re-attempted on the next cycle with fresh data.

/// Publish gate for one scalar metric.
#[derive(Debug, Clone)]
pub struct ReportGate {
    threshold: f32,
    last_published: Option<f32>,
    resync: bool,
}

impl ReportGate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            last_published: None,
            resync: false,
        }
    }

    /// Request an unconditional publish on the next evaluation. Used for
    /// force-update commands and to resynchronise consumers after a broker
    /// reconnect.
    pub fn request_resync(&mut self) {
        self.resync = true;
    }

    /// Should `value` be published now?
    pub fn should_publish(&self, value: f32) -> bool {
        if self.resync {
            return true;
        }
        match self.last_published {
            None => true,
            Some(last) => (value - last).abs() >= self.threshold,
        }
    }

    /// Record a successful publish of `value`.
    pub fn commit(&mut self, value: f32) {
        self.last_published = Some(value);
        self.resync = false;
    }

    /// Last successfully published value, if any.
    pub fn last_published(&self) -> Option<f32> {
        self.last_published
    }
}
