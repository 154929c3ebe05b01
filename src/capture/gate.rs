//! The silence gate: a debounce-with-reset deadline.
//!
//! There is one persistent silence clock per session. A quiet frame arms it
//! (only if it is not already armed), any voiced frame disarms it, and it is
//! never extended frame-by-frame while silence continues.

use std::time::Duration;
use tokio::time::Instant;

pub(super) struct SilenceGate {
    threshold: f32,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl SilenceGate {
    pub(super) fn new(threshold: f32, timeout: Duration) -> Self {
        Self {
            threshold,
            timeout,
            deadline: None,
        }
    }

    /// Feed one level observation taken at `now`. Returns the armed deadline,
    /// if any, after applying the observation.
    pub(super) fn observe(&mut self, level: f32, now: Instant) -> Option<Instant> {
        if level > self.threshold {
            self.deadline = None;
        } else if self.deadline.is_none() {
            self.deadline = Some(now + self.timeout);
        }
        self.deadline
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
