//! Keepalive timer and proximity-driven display power.

use std::time::{Duration, Instant};

/// Debounced keepalive: due on the first check, then once per interval.
#[derive(Debug, Clone)]
pub struct KeepaliveTimer {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl KeepaliveTimer {
    pub fn new(interval: Duration) -> Self {
        KeepaliveTimer {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true when a keepalive must go out at `now`, and restarts the
    /// interval from `now` in that case. The caller's send outcome does not
    /// matter.
    pub fn fire(&mut self, now: Instant) -> bool {
        let due = match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_sent = Some(now);
        }
        due
    }
}

/// Display power, switched on proximity edges only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPower {
    On,
    Off,
}

impl DisplayPower {
    pub fn is_on(self) -> bool {
        self == DisplayPower::On
    }

    /// Feed one proximity reading. Returns the screen command to send when
    /// the reading differs from the current state.
    pub fn observe(&mut self, proximity: bool) -> Option<bool> {
        if proximity == self.is_on() {
            return None;
        }
        *self = if proximity {
            DisplayPower::On
        } else {
            DisplayPower::Off
        };
        Some(proximity)
    }
}

impl Default for DisplayPower {
    /// The headset powers the panel when it is enabled at open.
    fn default() -> Self {
        DisplayPower::On
    }
}
