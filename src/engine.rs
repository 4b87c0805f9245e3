/// Scanning engine boundary.
///
/// The engine is the vendor radio stack: it owns the radio, decodes
/// advertisements and reports what it sees. The session manager drives it
/// through [`ScanEngine`] and receives its notifications as [`EngineEvent`]s,
/// either queued on an [`EngineChannel`] or passed straight to the manager's
/// `on_*` methods.
///
/// Engine methods are called while the session lock is held. They must not
/// block and must not call back into the manager synchronously; queue an
/// event instead.
use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};

use crate::config::{ScanMode, ScanPeriod};
use crate::defaults::ENGINE_QUEUE_DEPTH;
use crate::filter::FilterSet;
use crate::record::{Detail, DeviceRecord};

/// Queue carrying engine notifications to the session driver.
pub type EngineChannel = Channel<CriticalSectionRawMutex, EngineEvent, ENGINE_QUEUE_DEPTH>;

/// Handle engines keep to publish notifications.
pub type EngineSender<'a> = Sender<'a, CriticalSectionRawMutex, EngineEvent, ENGINE_QUEUE_DEPTH>;

/// Notification from the engine to the session manager.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Connection requested by `connect()` is ready for configuration
    Ready,
    /// Connection requested by `connect()` could not be established
    ConnectFailed(EngineError),
    /// A decoded advertisement
    Discovered(DeviceRecord),
    /// A previously seen device has not been heard for a while
    Lost(DeviceRecord),
    /// Soft scan failure; the session keeps running
    ScanError(Detail),
    /// Radio entered an active scan window
    ScanStarted,
    /// Radio left an active scan window
    ScanStopped,
    /// Connection released (completion of a pending `disconnect()`, or
    /// dropped by the engine)
    Disconnected,
}

/// Outcome of [`ScanEngine::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Connection is released on return
    Complete,
    /// Engine will publish [`EngineEvent::Disconnected`] once released
    Pending,
}

/// Engine-side failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Radio off, service not bound, or permission missing
    Unavailable,
    /// Engine refused the scan mode, period or filter
    InvalidConfig,
    /// Vendor-specific failure with its message
    Other(Detail),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Unavailable => f.write_str("scanning engine unavailable"),
            EngineError::InvalidConfig => f.write_str("configuration rejected by engine"),
            EngineError::Other(msg) => f.write_str(msg),
        }
    }
}

/// Capability set the session manager needs from a scanning engine.
pub trait ScanEngine {
    /// Request a connection. Returns once the request is issued; readiness
    /// is reported later with [`EngineEvent::Ready`] or
    /// [`EngineEvent::ConnectFailed`].
    fn connect(&mut self) -> Result<(), EngineError>;

    /// Apply scan mode and windows. Only called after `Ready`.
    fn configure(&mut self, mode: ScanMode, period: ScanPeriod) -> Result<(), EngineError>;

    /// Install an engine-side pre-filter. The manager re-checks every
    /// discovery against the same set, so engines without native
    /// filtering can keep the default.
    fn set_filter(&mut self, _filters: &FilterSet) -> Result<(), EngineError> {
        Ok(())
    }

    fn start_scanning(&mut self) -> Result<(), EngineError>;

    /// Release the connection. Must tolerate being called on a handle that
    /// is already disconnected or was never connected.
    fn disconnect(&mut self) -> Disconnect;
}
