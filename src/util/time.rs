//! Time utilities for game simulation

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Default simulation rate in ticks per second
pub const SIMULATION_TPS: u32 = 60;
/// Default snapshot broadcast rate per second
pub const BROADCAST_TPS: u32 = 20;

/// Catch-up ticks allowed per scheduler wake-up before the deadline resyncs
pub const MAX_CATCHUP_TICKS: u32 = 8;

/// Seconds between load-signal samples
pub const LOAD_SAMPLE_SECS: u64 = 5;
