//! Host load signal and overload-adaptive broadcast rate control
//!
//! The core never measures event-loop delay or utilization itself; the
//! embedding process publishes samples through a [`LoadSignal`] and each
//! room's scheduler polls the latest one.

use std::sync::Arc;

use parking_lot::RwLock;

/// One sample of host scheduling load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    /// 95th-percentile scheduling delay in milliseconds
    pub p95_delay_ms: f64,
    /// Fraction of wall time the host spent busy, 0.0..=1.0
    pub utilization: f64,
}

/// Read-only source of the latest load sample, injected into each room
pub trait LoadSignal: Send + Sync {
    /// Latest sample, or `None` when no measurement is available
    fn latest(&self) -> Option<LoadSample>;
}

/// Latest-sample cell the embedding process writes and rooms read
#[derive(Default)]
pub struct SharedLoadSignal {
    sample: RwLock<Option<LoadSample>>,
}

impl SharedLoadSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, sample: LoadSample) {
        *self.sample.write() = Some(sample);
    }
}

impl LoadSignal for SharedLoadSignal {
    fn latest(&self) -> Option<LoadSample> {
        self.sample.read().as_ref().copied()
    }
}

/// A signal that never reports load; rooms fall back to full-rate broadcasts
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoadSignal;

impl LoadSignal for NoLoadSignal {
    fn latest(&self) -> Option<LoadSample> {
        None
    }
}

/// Entry thresholds: both must be exceeded to count a sample as overloaded
pub const OVERLOAD_P95_DELAY_MS: f64 = 50.0;
pub const OVERLOAD_UTILIZATION: f64 = 0.90;

/// Exit thresholds: both must be undercut to count a sample toward recovery
pub const RECOVER_P95_DELAY_MS: f64 = 20.0;
pub const RECOVER_UTILIZATION: f64 = 0.70;

/// Consecutive overloaded samples before broadcasts degrade
pub const OVERLOAD_STREAK: u32 = 3;
/// Consecutive recovered samples before the full rate is restored
pub const RECOVER_STREAK: u32 = 5;

/// Transition produced by feeding a sample into the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTransition {
    /// Halve the broadcast rate
    Degrade,
    /// Restore the configured broadcast rate
    Restore,
}

/// Hysteresis state machine for broadcast-rate degradation.
///
/// The asymmetric streak lengths (3 samples in, 5 samples out) keep the rate
/// from flapping when load hovers at a threshold. A missing sample counts as
/// healthy: overload detection failure must not degrade service.
#[derive(Debug, Default)]
pub struct OverloadController {
    degraded: bool,
    over_streak: u32,
    under_streak: u32,
}

impl OverloadController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Feed the latest sample (or its absence) into the controller
    pub fn observe(&mut self, sample: Option<LoadSample>) -> Option<RateTransition> {
        let overloaded = sample
            .map(|s| s.p95_delay_ms > OVERLOAD_P95_DELAY_MS && s.utilization > OVERLOAD_UTILIZATION)
            .unwrap_or(false);
        let recovered = sample
            .map(|s| s.p95_delay_ms < RECOVER_P95_DELAY_MS && s.utilization < RECOVER_UTILIZATION)
            .unwrap_or(true);

        if !self.degraded {
            if overloaded {
                self.over_streak += 1;
                if self.over_streak >= OVERLOAD_STREAK {
                    self.degraded = true;
                    self.over_streak = 0;
                    self.under_streak = 0;
                    return Some(RateTransition::Degrade);
                }
            } else {
                self.over_streak = 0;
            }
        } else if recovered {
            self.under_streak += 1;
            if self.under_streak >= RECOVER_STREAK {
                self.degraded = false;
                self.over_streak = 0;
                self.under_streak = 0;
                return Some(RateTransition::Restore);
            }
        } else {
            self.under_streak = 0;
        }

        None
    }
}
