//! Whole-second bookkeeping shared by every connection in a run.

use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct ProgressClock {
    start: Instant,
}

impl ProgressClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

/// Decides which elapsed seconds get a follow-up round.
///
/// All connections drip on the same wall-clock seconds, and a second that
/// already had its round does not get another one.
#[derive(Debug, Clone)]
pub struct FollowupSchedule {
    interval: u64,
    last_fired: Option<u64>,
}

impl FollowupSchedule {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    pub fn is_due(&self, elapsed: u64) -> bool {
        elapsed > 0
            && self.interval > 0
            && elapsed % self.interval == 0
            && self.last_fired != Some(elapsed)
    }

    pub fn mark_fired(&mut self, elapsed: u64) {
        self.last_fired = Some(elapsed);
    }
}

pub const HEARTBEAT_PERIOD: u64 = 5;

/// Lets the status heartbeat through once per matching second, starting
/// with second 0.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    last_reported: Option<u64>,
}

impl Heartbeat {
    pub fn should_report(&mut self, elapsed: u64) -> bool {
        if elapsed % HEARTBEAT_PERIOD != 0 || self.last_reported == Some(elapsed) {
            return false;
        }
        self.last_reported = Some(elapsed);
        true
    }
}
