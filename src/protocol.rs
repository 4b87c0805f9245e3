/// JSON message protocol between the scan session and its host.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::record::IdString;

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type AddrString = String<18>;

/// Messages sent from the session to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum SessionMessage<'a> {
    /// Accepted discovery with the session's running total
    #[serde(rename = "device")]
    Device {
        /// "eddystone", "ibeacon", "other"
        kind: &'static str,
        id: &'a IdString,
        addr: &'a AddrString,
        rssi: i8,
        count: u32,
        /// Uptime in milliseconds when emitted
        ts: u32,
    },
    /// Session lifecycle change or error
    #[serde(rename = "lifecycle")]
    Lifecycle {
        /// "started", "stopped", "error"
        event: &'static str,
        #[serde(skip_serializing_if = "str::is_empty")]
        detail: &'a str,
    },
    /// Session status report
    #[serde(rename = "status")]
    Status {
        state: &'static str,
        count: u32,
        version: &'static str,
    },
}

/// Commands sent from the host to the session.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Start a scan session
    Start,
    /// Stop the running scan session
    Stop,
    /// Request current status
    GetStatus,
}

/// Wire format for host commands — flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: heapless::String<16>,
}

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json<'b>(msg: &SessionMessage, buf: &'b mut [u8]) -> &'b str {
        let len = serde_json_core::to_slice(msg, buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap()
    }

    #[test]
    fn serialize_device_message() {
        let id = IdString::try_from("3d92f9630d8f584de4d9").unwrap();
        let addr = AddrString::try_from("C0:FF:EE:00:00:01").unwrap();
        let msg = SessionMessage::Device {
            kind: "eddystone",
            id: &id,
            addr: &addr,
            rssi: -65,
            count: 3,
            ts: 1500,
        };

        let mut buf = [0u8; 256];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"device""#));
        assert!(json.contains(r#""kind":"eddystone""#));
        assert!(json.contains(r#""id":"3d92f9630d8f584de4d9""#));
        assert!(json.contains(r#""addr":"C0:FF:EE:00:00:01""#));
        assert!(json.contains(r#""rssi":-65"#));
        assert!(json.contains(r#""count":3"#));
    }

    #[test]
    fn serialize_lifecycle_omits_empty_detail() {
        let msg = SessionMessage::Lifecycle {
            event: "started",
            detail: "",
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert_eq!(json, r#"{"type":"lifecycle","event":"started"}"#);
    }

    #[test]
    fn serialize_lifecycle_with_detail() {
        let msg = SessionMessage::Lifecycle {
            event: "error",
            detail: "connect failed: scanning engine unavailable",
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""event":"error""#));
        assert!(json.contains(r#""detail":"connect failed: scanning engine unavailable""#));
    }

    #[test]
    fn serialize_status_message() {
        let msg = SessionMessage::Status {
            state: "scanning",
            count: 12,
            version: "0.1.0",
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""state":"scanning""#));
        assert!(json.contains(r#""count":12"#));
    }

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
