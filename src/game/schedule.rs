//! Deadline bookkeeping for the fixed-timestep scheduler
//!
//! The room runner owns two independent deadlines: the simulation tick
//! deadline (bounded catch-up, fixed dt) and the snapshot broadcast deadline
//! (uncapped drain, rate-adjustable under load). Both are pure state over a
//! monotonic clock so they can be driven directly in tests.

use std::time::Duration;

use tokio::time::Instant;

use crate::util::time::MAX_CATCHUP_TICKS;

/// Result of asking the tick schedule what work is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTicks {
    /// Fixed-dt ticks to run this wake-up, at most [`MAX_CATCHUP_TICKS`]
    pub ticks: u32,
    /// True when the schedule was still behind after the cap and the
    /// deadline was forcibly re-anchored, dropping simulated time
    pub resynced: bool,
}

/// Simulation tick deadline with bounded catch-up
#[derive(Debug)]
pub struct TickSchedule {
    interval: Duration,
    next: Instant,
}

impl TickSchedule {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now + interval,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Count the ticks due at `now`, advancing the deadline one interval per
    /// tick. A wake-up runs at most [`MAX_CATCHUP_TICKS`] ticks; if the
    /// schedule is still behind after that, the deadline resyncs to
    /// `now + interval` and the skipped simulated time is abandoned.
    pub fn due_ticks(&mut self, now: Instant) -> DueTicks {
        let mut ticks = 0;
        while now >= self.next && ticks < MAX_CATCHUP_TICKS {
            self.next += self.interval;
            ticks += 1;
        }

        let resynced = ticks == MAX_CATCHUP_TICKS && now >= self.next;
        if resynced {
            self.next = now + self.interval;
        }

        DueTicks { ticks, resynced }
    }
}

/// Snapshot broadcast deadline with overload-adaptive rate
#[derive(Debug)]
pub struct BroadcastSchedule {
    base_interval: Duration,
    interval: Duration,
    next: Instant,
}

impl BroadcastSchedule {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            base_interval: interval,
            interval,
            next: now + interval,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Count the broadcasts due at `now`. No catch-up cap: snapshots are
    /// cheap relative to physics and duplicates are harmless.
    pub fn due_broadcasts(&mut self, now: Instant) -> u32 {
        let mut due = 0;
        while now >= self.next {
            self.next += self.interval;
            due += 1;
        }
        due
    }

    /// Halve the broadcast rate; the simulation rate is untouched
    pub fn degrade(&mut self, now: Instant) {
        self.interval = self.base_interval * 2;
        self.next = now + self.interval;
    }

    /// Return to the configured broadcast rate
    pub fn restore(&mut self, now: Instant) {
        self.interval = self.base_interval;
        self.next = now + self.interval;
    }
}
