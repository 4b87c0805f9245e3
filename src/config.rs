/// Scan session configuration.
///
/// A [`ScanConfig`] is built once and handed to the session manager, which
/// applies it to the engine every time a connection becomes ready. It is
/// never mutated in place; swapping it needs an idle session.
use core::fmt;

use embassy_time::Duration;

use crate::defaults;
use crate::filter::{DeviceFilter, FilterSet};

/// Radio duty trade-off requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Longest battery life, slowest discovery
    LowPower,
    /// Best performance/battery ratio
    Balanced,
    /// Continuous aggressive scanning
    Aggressive,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::LowPower => "low_power",
            ScanMode::Balanced => "balanced",
            ScanMode::Aggressive => "aggressive",
        }
    }
}

/// Active/passive scan windows in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPeriod {
    active_ms: u32,
    passive_ms: u32,
}

impl ScanPeriod {
    pub const fn new(active_ms: u32, passive_ms: u32) -> Result<Self, ConfigError> {
        if active_ms == 0 {
            return Err(ConfigError::ZeroActivePeriod);
        }
        Ok(Self {
            active_ms,
            passive_ms,
        })
    }

    pub const fn active_ms(&self) -> u32 {
        self.active_ms
    }

    pub const fn passive_ms(&self) -> u32 {
        self.passive_ms
    }
}

/// Rejected configuration input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ZeroActivePeriod,
    TooManyFilters,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroActivePeriod => f.write_str("active scan period must be non-zero"),
            ConfigError::TooManyFilters => write!(
                f,
                "at most {} filters per session",
                crate::filter::MAX_FILTERS
            ),
        }
    }
}

/// Everything the manager applies to the engine for one session.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: ScanMode,
    pub period: ScanPeriod,
    pub filters: FilterSet,
    /// Auto-stop after this long in `Scanning`; `None` scans until stopped.
    pub watchdog: Option<Duration>,
}

impl ScanConfig {
    pub const fn new(mode: ScanMode, period: ScanPeriod) -> Self {
        Self {
            mode,
            period,
            filters: FilterSet::new(),
            watchdog: None,
        }
    }

    /// Background monitoring profile: low power, 30 s active / 2.2 s
    /// passive, accepting only the default Eddystone namespace.
    pub fn background() -> Self {
        let mut filters = FilterSet::new();
        let _ = filters.push(DeviceFilter::identifier(defaults::BACKGROUND_NAMESPACE));
        Self {
            mode: defaults::BACKGROUND_SCAN_MODE,
            period: defaults::BACKGROUND_PERIOD,
            filters,
            watchdog: None,
        }
    }

    pub fn with_filter(mut self, filter: DeviceFilter) -> Result<Self, ConfigError> {
        self.filters
            .push(filter)
            .map_err(|_| ConfigError::TooManyFilters)?;
        Ok(self)
    }

    pub fn with_watchdog(mut self, timeout: Duration) -> Self {
        self.watchdog = Some(timeout);
        self
    }

    /// Time-box sessions with the default 30 s watchdog.
    pub fn with_default_watchdog(self) -> Self {
        self.with_watchdog(Duration::from_millis(defaults::WATCHDOG_TIMEOUT_MS))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(ScanMode::Balanced, defaults::BACKGROUND_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BeaconKind, DeviceRecord};

    #[test]
    fn zero_active_period_rejected() {
        assert_eq!(ScanPeriod::new(0, 100), Err(ConfigError::ZeroActivePeriod));
        let p = ScanPeriod::new(1, 0).unwrap();
        assert_eq!(p.active_ms(), 1);
        assert_eq!(p.passive_ms(), 0);
    }

    #[test]
    fn background_profile() {
        let cfg = ScanConfig::background();
        assert_eq!(cfg.mode, ScanMode::LowPower);
        assert_eq!(cfg.period.active_ms(), 30_000);
        assert_eq!(cfg.period.passive_ms(), 2_200);
        assert_eq!(cfg.filters.len(), 1);
        assert!(cfg.watchdog.is_none());

        let hit = DeviceRecord::new([0; 6], BeaconKind::Eddystone, "3d92f9630d8f584de4d9", -70);
        let miss = DeviceRecord::new([0; 6], BeaconKind::Eddystone, "f7826da6bc5b71e0893e", -70);
        assert!(cfg.filters.accepts(&hit));
        assert!(!cfg.filters.accepts(&miss));
    }

    #[test]
    fn filter_limit_surfaces_as_config_error() {
        let mut cfg = ScanConfig::default();
        for _ in 0..crate::filter::MAX_FILTERS {
            cfg = cfg.with_filter(DeviceFilter::MinRssi(-90)).unwrap();
        }
        assert_eq!(
            cfg.with_filter(DeviceFilter::MinRssi(-90)).unwrap_err(),
            ConfigError::TooManyFilters
        );
    }

    #[test]
    fn watchdog_opt_in() {
        assert!(ScanConfig::default().watchdog.is_none());
        let cfg = ScanConfig::background().with_default_watchdog();
        assert_eq!(cfg.watchdog, Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::TooManyFilters.to_string(),
            "at most 4 filters per session"
        );
        assert_eq!(ScanMode::Aggressive.as_str(), "aggressive");
    }
}
