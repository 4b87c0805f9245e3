/// Compiled-in defaults for the background scan profile.
///
/// The namespace and scan windows come from the reference background
/// monitoring service (vitals beacons, 30 s active / 2.2 s passive, low power).
use crate::config::{ScanMode, ScanPeriod};

/// Eddystone namespace accepted by the background profile.
pub const BACKGROUND_NAMESPACE: &str = "3d92f9630d8f584de4d9";

pub const BACKGROUND_ACTIVE_MS: u32 = 30_000;
pub const BACKGROUND_PASSIVE_MS: u32 = 2_200;

pub const BACKGROUND_SCAN_MODE: ScanMode = ScanMode::LowPower;

pub const BACKGROUND_PERIOD: ScanPeriod =
    match ScanPeriod::new(BACKGROUND_ACTIVE_MS, BACKGROUND_PASSIVE_MS) {
        Ok(period) => period,
        Err(_) => panic!("background active period must be non-zero"),
    };

/// Watchdog duration for time-boxed background sessions.
pub const WATCHDOG_TIMEOUT_MS: u64 = 30_000;

/// Depth of the engine → manager event queue.
pub const ENGINE_QUEUE_DEPTH: usize = 16;

/// Depth of the manager → observer event queue.
pub const SINK_QUEUE_DEPTH: usize = 16;
