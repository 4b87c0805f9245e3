/// Decoded beacon observations handed over by the scanning engine.
///
/// Frame parsing happens inside the engine. The session manager only sees
/// these snapshots, one per discovery event, and never retains them.
use heapless::{String, Vec};

/// Beacon identifier: Eddystone namespace (20 hex chars) or iBeacon
/// proximity UUID (36 chars).
pub type IdString = String<40>;

/// Raw advertisement payload (legacy advertising limit).
pub type Payload = Vec<u8, 31>;

/// Human-readable detail attached to lifecycle and error events.
pub type Detail = String<64>;

/// Advertisement family the engine decoded the record from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconKind {
    Eddystone,
    IBeacon,
    Other,
}

impl BeaconKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeaconKind::Eddystone => "eddystone",
            BeaconKind::IBeacon => "ibeacon",
            BeaconKind::Other => "other",
        }
    }
}

/// One observation of a nearby transmitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub address: [u8; 6],
    pub kind: BeaconKind,
    pub identifier: IdString,
    pub rssi: i8,
    pub payload: Payload,
}

impl DeviceRecord {
    /// Build a record without payload. Identifiers longer than
    /// [`IdString`] capacity are truncated.
    pub fn new(address: [u8; 6], kind: BeaconKind, identifier: &str, rssi: i8) -> Self {
        Self {
            address,
            kind,
            identifier: bounded(identifier),
            rssi,
            payload: Payload::new(),
        }
    }

    /// Attach raw payload bytes, keeping at most 31.
    pub fn with_payload(mut self, bytes: &[u8]) -> Self {
        self.payload.clear();
        for &b in bytes.iter().take(self.payload.capacity()) {
            let _ = self.payload.push(b);
        }
        self
    }
}

/// Copy `s` into a bounded string, stopping at the last whole character
/// that fits.
pub fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
