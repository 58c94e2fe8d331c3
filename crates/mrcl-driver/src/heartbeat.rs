//! Link liveness tracking
//!
//! The MRCL700 streams status and speed lines while axes move and echoes every
//! command, so a quiet line for longer than the configured window means the
//! cable is unplugged or the controller is powered off.
//!
//! Timestamps are stored as microseconds since a process-wide monotonic anchor
//! so they fit in an `AtomicU64` and are unaffected by wall-clock changes.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static MONOTONIC_ANCHOR: OnceLock<Instant> = OnceLock::new();

fn monotonic_micros() -> u64 {
    let anchor = MONOTONIC_ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_micros() as u64
}

/// Tracks when the dispatch loop last received a line from the device.
#[derive(Debug)]
pub struct ConnectionMonitor {
    last_line_us: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// `timeout`: longest silence still considered connected.
    ///
    /// The window starts at construction, so a freshly opened link counts as
    /// connected until `timeout` elapses without traffic.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_line_us: AtomicU64::new(monotonic_micros()),
            timeout,
        }
    }

    /// Called by the dispatch loop for every line read.
    pub fn register_line(&self) {
        self.last_line_us.store(monotonic_micros(), Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.time_since_last_line() < self.timeout
    }

    pub fn time_since_last_line(&self) -> Duration {
        let last_us = self.last_line_us.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }
}
