/// Scan session manager — owns one connect → scan → disconnect cycle at a
/// time.
///
/// All state (session state, discovery counter, engine handle, watchdog,
/// sink) sits behind one critical-section mutex, so callers, engine
/// callbacks and the watchdog are linearized no matter which context they
/// run in.
///
/// `start()` and `stop()` only record intent and ring a doorbell. The
/// engine work (connect, configure, disconnect) is done by the session
/// driver: either the async [`ScanSessionManager::run`] loop, or
/// [`ScanSessionManager::process_pending`] called from a superloop.
use core::cell::RefCell;
use core::fmt::{self, Write};

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use crate::config::ScanConfig;
use crate::engine::{Disconnect, EngineChannel, EngineError, EngineEvent, ScanEngine};
use crate::record::{Detail, DeviceRecord};
use crate::sink::{EventSink, LifecycleKind};
use crate::watchdog::{self, Deadline, Watchdog};

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Scanning,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Scanning => "scanning",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        }
    }

    /// A session is active from `start()` until it is fully stopped.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Scanning | SessionState::Stopping
        )
    }

    /// Edges of the session state machine. Any state may be forced to
    /// `Stopped` by teardown.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, next),
            (Idle, Connecting)
                | (Stopped, Connecting)
                | (Connecting, Scanning)
                | (Connecting, Stopping)
                | (Connecting, Idle)
                | (Scanning, Stopping)
                | (_, Stopped)
        )
    }
}

/// Rejected `start()` / `stop()` / `reconfigure()` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    AlreadyRunning,
    NotRunning,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyRunning => f.write_str("scan session already running"),
            SessionError::NotRunning => f.write_str("scan session not running"),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Accepted discoveries since the session last entered `Scanning`
    pub discovered: u32,
}

/// Engine connection as tracked by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// No connection held
    Down,
    /// `connect()` issued, waiting for ready
    Requested,
    Up,
    /// `disconnect()` returned `Pending`
    Releasing,
}

struct Inner<'a, E> {
    engine: E,
    config: ScanConfig,
    state: SessionState,
    discovered: u32,
    link: Link,
    watchdog: Watchdog,
    sink: Option<&'a dyn EventSink>,
}

impl<E: ScanEngine> Inner<'_, E> {
    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        log::debug!("Session {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    fn emit(&self, kind: LifecycleKind, detail: &str) {
        if let Some(sink) = self.sink {
            sink.on_lifecycle(kind, detail);
        }
    }

    fn begin_stop(&mut self) {
        self.watchdog.cancel();
        self.transition(SessionState::Stopping);
    }

    fn finish_stop(&mut self) {
        self.watchdog.cancel();
        self.transition(SessionState::Stopped);
        log::info!("Scan session stopped, {} devices discovered", self.discovered);
        self.emit(LifecycleKind::Stopped, "");
    }

    /// Issue whatever engine call the current state is waiting on.
    fn reconcile(&mut self) {
        match (self.state, self.link) {
            (SessionState::Connecting, Link::Down) => match self.engine.connect() {
                Ok(()) => {
                    self.link = Link::Requested;
                    log::debug!("Engine connection requested");
                }
                Err(e) => self.connect_failed(&e),
            },
            (SessionState::Stopping, Link::Requested | Link::Up) => {
                self.release();
                if self.link == Link::Down {
                    self.finish_stop();
                }
            }
            (SessionState::Stopping, Link::Down) => self.finish_stop(),
            _ => {}
        }
    }

    fn release(&mut self) {
        self.link = match self.engine.disconnect() {
            Disconnect::Complete => Link::Down,
            Disconnect::Pending => Link::Releasing,
        };
    }

    fn connect_failed(&mut self, err: &EngineError) {
        log::warn!("Engine connection failed: {}", err);
        self.link = Link::Down;
        self.transition(SessionState::Idle);
        let mut detail = Detail::new();
        let _ = write!(detail, "connect failed: {}", err);
        self.emit(LifecycleKind::Error, &detail);
    }

    fn begin_scanning(&mut self) -> Result<(), EngineError> {
        self.engine.configure(self.config.mode, self.config.period)?;
        self.engine.set_filter(&self.config.filters)?;
        self.engine.start_scanning()
    }

    fn on_ready(&mut self) {
        if self.state != SessionState::Connecting || self.link != Link::Requested {
            log::debug!("Ignoring connection ready while {}", self.state.as_str());
            return;
        }
        self.link = Link::Up;

        if let Err(e) = self.begin_scanning() {
            log::warn!("Engine rejected scan setup: {}", e);
            self.release();
            self.transition(SessionState::Idle);
            let mut detail = Detail::new();
            let _ = write!(detail, "scan setup failed: {}", e);
            self.emit(LifecycleKind::Error, &detail);
            return;
        }

        self.discovered = 0;
        self.transition(SessionState::Scanning);
        if let Some(deadline) = self.watchdog.arm(Instant::now()) {
            log::debug!("Watchdog armed until {}ms", deadline.at.as_millis());
        }
        log::info!(
            "Scan session started ({}, {}ms/{}ms, {} filters)",
            self.config.mode.as_str(),
            self.config.period.active_ms(),
            self.config.period.passive_ms(),
            self.config.filters.len()
        );
        self.emit(LifecycleKind::Started, "");
    }

    fn on_discovered(&mut self, record: &DeviceRecord) {
        if self.state != SessionState::Scanning {
            log::debug!("Dropping discovery while {}", self.state.as_str());
            return;
        }
        if !self.config.filters.accepts(record) {
            log::debug!("Filtered out {} rssi={}", record.identifier, record.rssi);
            return;
        }
        self.discovered = self.discovered.saturating_add(1);
        log::info!(
            "Discovered {} {} rssi={} (#{})",
            record.kind.as_str(),
            record.identifier,
            record.rssi,
            self.discovered
        );
        if let Some(sink) = self.sink {
            sink.on_discovery(record, self.discovered);
        }
    }

    fn on_scan_error(&mut self, cause: &str) {
        log::warn!("Scan error: {}", cause);
        self.emit(LifecycleKind::Error, cause);
    }

    /// Only a failure of the outstanding request counts; a late one from an
    /// abandoned attempt must not drop a connection that is held.
    fn on_connect_failed(&mut self, err: &EngineError) {
        match (self.state, self.link) {
            (SessionState::Connecting, Link::Requested) => self.connect_failed(err),
            (SessionState::Stopping, Link::Requested | Link::Releasing) => {
                self.link = Link::Down;
                self.finish_stop();
            }
            _ => log::debug!("Ignoring connect failure while {}", self.state.as_str()),
        }
    }

    fn on_disconnected(&mut self) {
        let was = self.link;
        self.link = Link::Down;
        match self.state {
            SessionState::Stopping => self.finish_stop(),
            SessionState::Scanning => {
                log::warn!("Engine dropped connection while scanning");
                self.emit(LifecycleKind::Error, "connection lost");
                self.begin_stop();
                self.finish_stop();
            }
            SessionState::Connecting if was == Link::Requested => {
                self.connect_failed(&EngineError::Unavailable)
            }
            _ => log::debug!("Engine disconnected while {}", self.state.as_str()),
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready => self.on_ready(),
            EngineEvent::ConnectFailed(err) => self.on_connect_failed(&err),
            EngineEvent::Discovered(record) => self.on_discovered(&record),
            EngineEvent::Lost(record) => {
                log::debug!("Lost {} {}", record.kind.as_str(), record.identifier)
            }
            EngineEvent::ScanError(cause) => self.on_scan_error(&cause),
            EngineEvent::ScanStarted => log::debug!("SCAN START"),
            EngineEvent::ScanStopped => log::debug!("SCAN STOP"),
            EngineEvent::Disconnected => self.on_disconnected(),
        }
    }

    fn on_watchdog(&mut self, generation: u32) -> bool {
        if !self.watchdog.fire(generation) {
            log::debug!("Ignoring stale watchdog #{}", generation);
            return false;
        }
        if self.state != SessionState::Scanning {
            return false;
        }
        log::info!("Watchdog expired, stopping scan session");
        self.begin_stop();
        true
    }

    fn teardown(&mut self) {
        self.watchdog.cancel();
        if matches!(self.link, Link::Requested | Link::Up) {
            let _ = self.engine.disconnect();
        }
        self.link = Link::Down;
        let was_active = self.state.is_active();
        if self.state != SessionState::Stopped {
            self.transition(SessionState::Stopped);
        }
        if was_active {
            log::info!("Scan session torn down");
            self.emit(LifecycleKind::Stopped, "teardown");
        }
    }
}

/// Owner of a background scan session over engine `E`.
///
/// Sinks and engines are invoked with the session lock held and must not
/// call back into the manager from inside those calls.
pub struct ScanSessionManager<'a, E: ScanEngine> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<'a, E>>>,
    events: &'a EngineChannel,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl<'a, E: ScanEngine> ScanSessionManager<'a, E> {
    /// `events` is the channel the engine publishes its notifications on.
    pub fn new(engine: E, config: ScanConfig, events: &'a EngineChannel) -> Self {
        let watchdog = Watchdog::new(config.watchdog);
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                engine,
                config,
                state: SessionState::Idle,
                discovered: 0,
                link: Link::Down,
                watchdog,
                sink: None,
            })),
            events,
            wake: Signal::new(),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<'a, E>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Register the event sink, replacing any previous one.
    pub fn set_sink(&self, sink: &'a dyn EventSink) {
        self.with_inner(|s| s.sink = Some(sink));
    }

    pub fn clear_sink(&self) {
        self.with_inner(|s| s.sink = None);
    }

    /// Begin a new session. Returns immediately; the connection is made by
    /// the session driver.
    pub fn start(&self) -> Result<(), SessionError> {
        self.with_inner(|s| {
            if s.state.is_active() {
                log::info!("Scan session already running ({})", s.state.as_str());
                return Err(SessionError::AlreadyRunning);
            }
            log::info!("Starting scan session");
            s.transition(SessionState::Connecting);
            Ok(())
        })?;
        self.wake.signal(());
        Ok(())
    }

    /// End the current session. Returns immediately; the disconnect is made
    /// by the session driver. Stopping an already stopping session is a
    /// no-op.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.with_inner(|s| match s.state {
            SessionState::Idle | SessionState::Stopped => {
                log::debug!("Stop requested while {}", s.state.as_str());
                Err(SessionError::NotRunning)
            }
            SessionState::Stopping => Ok(()),
            SessionState::Connecting | SessionState::Scanning => {
                log::info!("Stopping scan session");
                s.begin_stop();
                Ok(())
            }
        })?;
        self.wake.signal(());
        Ok(())
    }

    /// Engine callback: the connection requested by `connect()` is ready.
    pub fn on_connection_ready(&self) {
        self.handle_engine_event(EngineEvent::Ready);
    }

    /// Engine callback: a decoded advertisement. Only counted while
    /// scanning and only if every configured filter accepts it.
    pub fn on_raw_device_discovered(&self, record: &DeviceRecord) {
        self.with_inner(|s| s.on_discovered(record));
    }

    /// Engine callback: a soft scan error. Reported, never changes state.
    pub fn on_scan_error(&self, cause: &str) {
        self.with_inner(|s| s.on_scan_error(cause));
    }

    /// Apply one engine notification, then issue any engine call it
    /// unblocked.
    pub fn handle_engine_event(&self, event: EngineEvent) {
        self.with_inner(|s| {
            s.dispatch(event);
            s.reconcile();
        });
        self.wake.signal(());
    }

    /// Watchdog callback. Stale or cancelled generations are ignored.
    pub fn on_watchdog_expired(&self, generation: u32) {
        if self.with_inner(|s| s.on_watchdog(generation)) {
            self.wake.signal(());
        }
    }

    /// Run the session driver once without blocking: fire an expired
    /// watchdog, issue pending engine calls, and drain queued engine events.
    pub fn process_pending(&self) {
        let expired = self.with_inner(|s| s.watchdog.expired(Instant::now()));
        if let Some(generation) = expired {
            self.on_watchdog_expired(generation);
        }

        self.with_inner(|s| s.reconcile());

        while let Ok(event) = self.events.try_receive() {
            self.with_inner(|s| {
                s.dispatch(event);
                s.reconcile();
            });
        }
    }

    /// Session driver loop. Never returns; run it as a task for the
    /// lifetime of the manager.
    pub async fn run(&self) {
        loop {
            self.process_pending();
            let deadline = self.watchdog_deadline();
            match select3(
                self.wake.wait(),
                self.events.receive(),
                watchdog::expiry(deadline),
            )
            .await
            {
                Either3::First(()) => {}
                Either3::Second(event) => self.handle_engine_event(event),
                Either3::Third(generation) => self.on_watchdog_expired(generation),
            }
        }
    }

    /// Force the session to `Stopped`, releasing the engine connection if
    /// one is held. Safe to call repeatedly; also run on drop.
    pub fn shutdown(&self) {
        self.with_inner(|s| s.teardown());
        self.wake.signal(());
    }

    /// Replace the configuration. Only allowed between sessions.
    pub fn reconfigure(&self, config: ScanConfig) -> Result<(), SessionError> {
        self.with_inner(|s| {
            if s.state.is_active() {
                return Err(SessionError::AlreadyRunning);
            }
            s.watchdog.set_timeout(config.watchdog);
            s.config = config;
            Ok(())
        })
    }

    pub fn config(&self) -> ScanConfig {
        self.with_inner(|s| s.config.clone())
    }

    pub fn state(&self) -> SessionState {
        self.with_inner(|s| s.state)
    }

    pub fn status(&self) -> SessionStatus {
        self.with_inner(|s| SessionStatus {
            state: s.state,
            discovered: s.discovered,
        })
    }

    pub fn watchdog_deadline(&self) -> Option<Deadline> {
        self.with_inner(|s| s.watchdog.deadline())
    }

    /// Borrow the engine, e.g. to read vendor diagnostics. Must not call
    /// back into the manager.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        self.with_inner(|s| f(&mut s.engine))
    }
}

impl<E: ScanEngine> Drop for ScanSessionManager<'_, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
