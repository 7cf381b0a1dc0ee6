//! Std timer implementation

use super::Timer;
use std::time::{Duration, Instant};

/// A [`Timer`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct StdTimer {
    deadline: Instant,
}

impl StdTimer {
    /// Create an already expired timer.
    pub fn new() -> Self {
        Self {
            deadline: Instant::now(),
        }
    }
}

impl Default for StdTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for StdTimer {
    fn start(&mut self, duration_ms: u32) {
        self.deadline = Instant::now() + Duration::from_millis(u64::from(duration_ms));
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn remaining(&self) -> u32 {
        let left = self.deadline.saturating_duration_since(Instant::now());
        u32::try_from(left.as_millis()).unwrap_or(u32::MAX)
    }
}
