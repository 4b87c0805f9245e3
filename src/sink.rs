/// Outward notifications from a scan session.
///
/// The manager calls its sink while holding the session lock, so sinks
/// must return immediately: buffer or drop, never wait.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::defaults::SINK_QUEUE_DEPTH;
use crate::record::{bounded, Detail, DeviceRecord};

/// Lifecycle event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Started,
    Stopped,
    Error,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Started => "started",
            LifecycleKind::Stopped => "stopped",
            LifecycleKind::Error => "error",
        }
    }
}

/// Observer of discovery and lifecycle events.
pub trait EventSink: Sync {
    /// An accepted discovery and the session's running total.
    fn on_discovery(&self, record: &DeviceRecord, total: u32);

    fn on_lifecycle(&self, kind: LifecycleKind, detail: &str);
}

/// Owned copy of a sink notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Discovered { record: DeviceRecord, total: u32 },
    Lifecycle { kind: LifecycleKind, detail: Detail },
}

pub type SessionEventChannel = Channel<CriticalSectionRawMutex, SessionEvent, SINK_QUEUE_DEPTH>;

/// Sink buffering events into a [`SessionEventChannel`] for a consumer
/// task. Events are dropped (and logged) when the channel is full.
pub struct ChannelSink<'a> {
    channel: &'a SessionEventChannel,
}

impl<'a> ChannelSink<'a> {
    pub const fn new(channel: &'a SessionEventChannel) -> Self {
        Self { channel }
    }
}

impl EventSink for ChannelSink<'_> {
    fn on_discovery(&self, record: &DeviceRecord, total: u32) {
        let event = SessionEvent::Discovered {
            record: record.clone(),
            total,
        };
        if self.channel.try_send(event).is_err() {
            log::warn!("Event queue full, dropping discovery #{}", total);
        }
    }

    fn on_lifecycle(&self, kind: LifecycleKind, detail: &str) {
        let event = SessionEvent::Lifecycle {
            kind,
            detail: bounded(detail),
        };
        if self.channel.try_send(event).is_err() {
            log::warn!("Event queue full, dropping {} event", kind.as_str());
        }
    }
}
