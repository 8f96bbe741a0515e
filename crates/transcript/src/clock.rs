use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Datelike, TimeZone, Utc};

/// Wall-clock source for entry timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Default for SystemClock {
    fn default() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Deterministic clock for tests and fixture replays.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(AtomicI64::new(start_ms))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Anything dated 1971 or earlier is a relative offset or garbage, not a
/// creation time.
pub fn valid_timestamp(candidate: Option<i64>, clock: &dyn Clock) -> i64 {
    let plausible = candidate.filter(|&ms| {
        Utc.timestamp_millis_opt(ms)
            .single()
            .is_some_and(|at| at.year() > 1971)
    });

    plausible.unwrap_or_else(|| clock.now_ms())
}

/// Playback position of the agent's audio, fed from media metadata.
///
/// Never moves backwards: a lower reading than the current one is ignored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PresentationClock(u64);

impl PresentationClock {
    pub fn now(&self) -> u64 {
        self.0
    }

    /// Returns `true` when the clock moved.
    pub fn advance(&mut self, pts: u64) -> bool {
        if pts > self.0 {
            self.0 = pts;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
