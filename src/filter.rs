/// Device filters applied to every discovery before it is counted.
///
/// Filters are plain values with no interior state, so one set can be
/// evaluated from any number of engine callbacks at once. A record is
/// accepted only if every filter in the set accepts it.
use core::fmt;

use heapless::Vec;

use crate::record::{bounded, BeaconKind, DeviceRecord, IdString, Payload};

/// Maximum number of filters in one [`FilterSet`].
pub const MAX_FILTERS: usize = 4;

/// A single predicate over a [`DeviceRecord`].
#[derive(Clone)]
pub enum DeviceFilter {
    /// Identifier (namespace / proximity UUID) must match exactly.
    Identifier(IdString),
    /// Record must come from this advertisement family.
    Kind(BeaconKind),
    /// Signals weaker than this threshold (dBm) are rejected.
    MinRssi(i8),
    /// Raw payload must start with these bytes.
    PayloadPrefix(Payload),
    /// Arbitrary caller-supplied predicate.
    Predicate(fn(&DeviceRecord) -> bool),
}

impl DeviceFilter {
    pub fn identifier(id: &str) -> Self {
        DeviceFilter::Identifier(bounded(id))
    }

    pub fn payload_prefix(prefix: &[u8]) -> Self {
        let mut p = Payload::new();
        for &b in prefix.iter().take(p.capacity()) {
            let _ = p.push(b);
        }
        DeviceFilter::PayloadPrefix(p)
    }

    pub fn accepts(&self, record: &DeviceRecord) -> bool {
        match self {
            DeviceFilter::Identifier(id) => record.identifier == *id,
            DeviceFilter::Kind(kind) => record.kind == *kind,
            DeviceFilter::MinRssi(min) => record.rssi >= *min,
            DeviceFilter::PayloadPrefix(prefix) => record.payload.starts_with(prefix),
            DeviceFilter::Predicate(f) => f(record),
        }
    }
}

impl fmt::Debug for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFilter::Identifier(id) => write!(f, "Identifier({:?})", id.as_str()),
            DeviceFilter::Kind(kind) => write!(f, "Kind({})", kind.as_str()),
            DeviceFilter::MinRssi(min) => write!(f, "MinRssi({})", min),
            DeviceFilter::PayloadPrefix(p) => write!(f, "PayloadPrefix({:02X?})", p.as_slice()),
            DeviceFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Conjunction of up to [`MAX_FILTERS`] filters. Empty accepts everything.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<DeviceFilter, MAX_FILTERS>,
}

impl FilterSet {
    pub const fn new() -> Self {
        Self { filters: Vec::new() }
    }

    /// Add a filter. Returns it back if the set is full.
    pub fn push(&mut self, filter: DeviceFilter) -> Result<(), DeviceFilter> {
        self.filters.push(filter)
    }

    pub fn accepts(&self, record: &DeviceRecord) -> bool {
        self.filters.iter().all(|f| f.accepts(record))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut crate::protocol::AddrString) {
    use core::fmt::Write;
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AddrString;

    fn eddystone(ns: &str, rssi: i8) -> DeviceRecord {
        DeviceRecord::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66], BeaconKind::Eddystone, ns, rssi)
    }

    #[test]
    fn identifier_exact_match_only() {
        let f = DeviceFilter::identifier("3d92f9630d8f584de4d9");
        assert!(f.accepts(&eddystone("3d92f9630d8f584de4d9", -60)));
        assert!(!f.accepts(&eddystone("3d92f9630d8f584de4d", -60)));
        assert!(!f.accepts(&eddystone("3D92F9630D8F584DE4D9", -60)));
    }

    #[test]
    fn min_rssi_is_inclusive() {
        let f = DeviceFilter::MinRssi(-80);
        assert!(f.accepts(&eddystone("a", -80)));
        assert!(f.accepts(&eddystone("a", -40)));
        assert!(!f.accepts(&eddystone("a", -81)));
    }

    #[test]
    fn kind_filter() {
        let f = DeviceFilter::Kind(BeaconKind::IBeacon);
        assert!(!f.accepts(&eddystone("a", -50)));
        let ib = DeviceRecord::new([0; 6], BeaconKind::IBeacon, "a", -50);
        assert!(f.accepts(&ib));
    }

    #[test]
    fn payload_prefix() {
        let f = DeviceFilter::payload_prefix(&[0xAA, 0xFE]);
        let hit = eddystone("a", -50).with_payload(&[0xAA, 0xFE, 0x00, 0x10]);
        let miss = eddystone("a", -50).with_payload(&[0xAA]);
        assert!(f.accepts(&hit));
        assert!(!f.accepts(&miss));
    }

    #[test]
    fn predicate_filter() {
        fn strong(r: &DeviceRecord) -> bool {
            r.rssi > -50
        }
        let f = DeviceFilter::Predicate(strong);
        assert!(f.accepts(&eddystone("a", -30)));
        assert!(!f.accepts(&eddystone("a", -70)));
    }

    #[test]
    fn empty_set_accepts_all() {
        let set = FilterSet::new();
        assert!(set.is_empty());
        assert!(set.accepts(&eddystone("anything", -127)));
    }

    #[test]
    fn set_requires_every_filter() {
        let mut set = FilterSet::new();
        set.push(DeviceFilter::identifier("X")).unwrap();
        set.push(DeviceFilter::MinRssi(-70)).unwrap();

        assert!(set.accepts(&eddystone("X", -60)));
        assert!(!set.accepts(&eddystone("X", -90)));
        assert!(!set.accepts(&eddystone("Y", -60)));
    }

    #[test]
    fn set_is_bounded() {
        let mut set = FilterSet::new();
        for _ in 0..MAX_FILTERS {
            assert!(set.push(DeviceFilter::MinRssi(-90)).is_ok());
        }
        assert!(set.push(DeviceFilter::MinRssi(-90)).is_err());
        assert_eq!(set.len(), MAX_FILTERS);
    }

    #[test]
    fn format_mac_uppercase_colon_separated() {
        let mut buf = AddrString::new();
        format_mac(&[0xB4, 0x1E, 0x52, 0xAB, 0xCD, 0xEF], &mut buf);
        assert_eq!(buf.as_str(), "B4:1E:52:AB:CD:EF");
    }

    #[test]
    fn debug_hides_predicate_pointer() {
        fn any(_: &DeviceRecord) -> bool {
            true
        }
        assert_eq!(format!("{:?}", DeviceFilter::Predicate(any)), "Predicate(..)");
        assert_eq!(format!("{:?}", DeviceFilter::MinRssi(-70)), "MinRssi(-70)");
    }
}
