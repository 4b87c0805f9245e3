//! beaconscan — background proximity-beacon scan sessions.
//!
//! Owns the lifecycle of a background scanning session on top of a vendor
//! BLE scanning engine: connect, configure, scan, optionally time out, and
//! disconnect. Discoveries are filtered and counted, and accepted ones are
//! forwarded to an event sink together with the session's running total.
//!
//! The crate is `no_std` with no allocator and is testable on any host with
//! `cargo test`. Platform code provides the engine (an implementation of
//! [`engine::ScanEngine`]) and drains the sink; everything in between lives
//! here:
//! - `session` — state machine and session driver
//! - `filter`, `config`, `defaults` — what to scan for and how
//! - `engine`, `record` — the engine boundary and its device records
//! - `sink`, `watchdog` — outward events and the auto-stop timer
//! - `protocol`, `comm` — NDJSON host transport

#![cfg_attr(not(test), no_std)]

pub mod comm;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod filter;
pub mod protocol;
pub mod record;
pub mod session;
pub mod sink;
pub mod watchdog;

pub use config::{ScanConfig, ScanMode, ScanPeriod};
pub use engine::{Disconnect, EngineChannel, EngineError, EngineEvent, ScanEngine};
pub use filter::{DeviceFilter, FilterSet};
pub use record::{BeaconKind, DeviceRecord};
pub use session::{ScanSessionManager, SessionError, SessionState, SessionStatus};
pub use sink::{ChannelSink, EventSink, LifecycleKind, SessionEvent};
