/// One-shot auto-stop timer for a scan session.
///
/// Each arming gets a new generation number. The driver waits on the
/// current deadline; when it fires it hands the generation back, and
/// [`Watchdog::fire`] only honours it if that exact arming is still
/// outstanding. A timer that fires after `cancel()` is therefore a no-op.
use embassy_time::{Duration, Instant, Timer};

/// An outstanding arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub at: Instant,
    pub generation: u32,
}

#[derive(Debug)]
pub struct Watchdog {
    timeout: Option<Duration>,
    armed: Option<Deadline>,
    generation: u32,
}

impl Watchdog {
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            armed: None,
            generation: 0,
        }
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.armed = None;
    }

    /// Arm relative to `now`. Does nothing when disabled or already armed.
    pub fn arm(&mut self, now: Instant) -> Option<Deadline> {
        let timeout = self.timeout?;
        if self.armed.is_some() {
            return None;
        }
        self.generation = self.generation.wrapping_add(1);
        let deadline = Deadline {
            at: now + timeout,
            generation: self.generation,
        };
        self.armed = Some(deadline);
        Some(deadline)
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.armed
    }

    /// Consume the arming identified by `generation`. Returns false for
    /// stale or cancelled armings.
    pub fn fire(&mut self, generation: u32) -> bool {
        match self.armed {
            Some(d) if d.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    /// Generation of an arming whose deadline is at or before `now`.
    pub fn expired(&self, now: Instant) -> Option<u32> {
        self.armed
            .filter(|d| d.at <= now)
            .map(|d| d.generation)
    }
}

/// Resolve with the generation once `deadline` passes; never resolves for
/// `None`.
pub async fn expiry(deadline: Option<Deadline>) -> u32 {
    match deadline {
        Some(d) => {
            Timer::at(d.at).await;
            d.generation
        }
        None => core::future::pending().await,
    }
}
