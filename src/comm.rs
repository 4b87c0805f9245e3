/// Host transport: NDJSON in, NDJSON out.
///
/// The session streams discovery and lifecycle events as newline-delimited
/// JSON through an output channel the host drains onto whatever link it has
/// (serial, socket, IPC). Commands come back the same way and are fed
/// byte-by-byte through a [`CommandReader`].
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use heapless::Vec;

use crate::engine::ScanEngine;
use crate::filter::format_mac;
use crate::protocol::{
    AddrString, HostCommand, MsgBuffer, RawCommand, SessionMessage, MAX_MSG_LEN, VERSION,
};
use crate::record::DeviceRecord;
use crate::session::{ScanSessionManager, SessionError};
use crate::sink::{EventSink, LifecycleKind};

/// Output channel for serialized session messages
pub type OutputChannel = Channel<CriticalSectionRawMutex, MsgBuffer, 8>;

/// Longest accepted command line, newline excluded
pub const MAX_COMMAND_LEN: usize = 64;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize one message as an NDJSON line. `None` if it does not fit in
/// [`MAX_MSG_LEN`] including the newline.
pub fn encode(msg: &SessionMessage) -> Option<MsgBuffer> {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok()?;
    let len = serde_json_core::to_slice(msg, &mut buf[..MAX_MSG_LEN - 1]).ok()?;
    buf[len] = b'\n';
    buf.truncate(len + 1);
    Some(buf)
}

/// Deserialize a HostCommand from a JSON byte slice.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    match raw.cmd.as_str() {
        "start" => Some(HostCommand::Start),
        "stop" => Some(HostCommand::Stop),
        "status" => Some(HostCommand::GetStatus),
        other => {
            log::warn!("Unknown host command '{}'", other);
            None
        }
    }
}

/// Apply a host command to a session. Returns the status message for
/// [`HostCommand::GetStatus`]; start/stop rejections are logged only.
pub fn handle_command<E: ScanEngine>(
    cmd: HostCommand,
    session: &ScanSessionManager<'_, E>,
) -> Option<MsgBuffer> {
    match cmd {
        HostCommand::Start => {
            match session.start() {
                Ok(()) => log::info!("Scan started by host command"),
                Err(SessionError::AlreadyRunning) => log::info!("Service is already running."),
                Err(e) => log::warn!("Start rejected: {}", e),
            }
            None
        }
        HostCommand::Stop => {
            match session.stop() {
                Ok(()) => log::info!("Scan stopped by host command"),
                Err(e) => log::info!("Stop ignored: {}", e),
            }
            None
        }
        HostCommand::GetStatus => {
            let status = session.status();
            encode(&SessionMessage::Status {
                state: status.state.as_str(),
                count: status.discovered,
                version: VERSION,
            })
        }
    }
}

// ── NDJSON sink ────────────────────────────────────────────────────────

/// Event sink that publishes every event as an NDJSON line on an
/// [`OutputChannel`]. Lines are dropped when the channel is full.
pub struct NdjsonSink<'a> {
    output: &'a OutputChannel,
}

impl<'a> NdjsonSink<'a> {
    pub const fn new(output: &'a OutputChannel) -> Self {
        Self { output }
    }

    fn publish(&self, msg: &SessionMessage) {
        let Some(buf) = encode(msg) else {
            log::warn!("Dropping unserializable session message");
            return;
        };
        if self.output.try_send(buf).is_err() {
            log::warn!("Output channel full, dropping message");
        }
    }
}

impl EventSink for NdjsonSink<'_> {
    fn on_discovery(&self, record: &DeviceRecord, total: u32) {
        let mut addr = AddrString::new();
        format_mac(&record.address, &mut addr);
        let ts = (Instant::now().as_millis() & 0xFFFF_FFFF) as u32;
        self.publish(&SessionMessage::Device {
            kind: record.kind.as_str(),
            id: &record.identifier,
            addr: &addr,
            rssi: record.rssi,
            count: total,
            ts,
        });
    }

    fn on_lifecycle(&self, kind: LifecycleKind, detail: &str) {
        self.publish(&SessionMessage::Lifecycle {
            event: kind.as_str(),
            detail,
        });
    }
}

// ── Command reader ─────────────────────────────────────────────────────

/// Frames host bytes into commands. CR and LF both end a line; blank lines
/// are skipped. A line longer than [`MAX_COMMAND_LEN`] is dropped whole,
/// up to its terminator.
#[derive(Default)]
pub struct CommandReader {
    line: Vec<u8, MAX_COMMAND_LEN>,
    overflowed: bool,
}

impl CommandReader {
    pub const fn new() -> Self {
        Self {
            line: Vec::new(),
            overflowed: false,
        }
    }

    /// Feed one byte; yields a command when it completes a valid line.
    pub fn feed(&mut self, byte: u8) -> Option<HostCommand> {
        if byte != b'\n' && byte != b'\r' {
            if !self.overflowed && self.line.push(byte).is_err() {
                log::warn!("Host command longer than {} bytes, discarding", MAX_COMMAND_LEN);
                self.overflowed = true;
            }
            return None;
        }
        let cmd = if self.overflowed || self.line.is_empty() {
            None
        } else {
            parse_command(&self.line)
        };
        self.line.clear();
        self.overflowed = false;
        cmd
    }
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &data[..end]
}
