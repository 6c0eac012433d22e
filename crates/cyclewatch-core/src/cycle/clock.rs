//! Time-of-day sources.

use std::sync::{Arc, Mutex};

use chrono::{NaiveTime, Utc};

/// Supplies the current time of day. Returning `None` means no reading is
/// available and every cycle evaluates to `Unknown`.
pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> Option<NaiveTime>;
}

/// Wall clock. Game schedules run on UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> Option<NaiveTime> {
        Some(Utc::now().time())
    }
}

/// Settable clock for tests and for the CLI's `--at` override.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Option<NaiveTime>>>,
}

impl ManualClock {
    pub fn new(now: Option<NaiveTime>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn at(hour: u32, min: u32, sec: u32) -> Self {
        Self::new(NaiveTime::from_hms_opt(hour, min, sec))
    }

    pub fn set(&self, now: Option<NaiveTime>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn set_hms(&self, hour: u32, min: u32, sec: u32) {
        self.set(NaiveTime::from_hms_opt(hour, min, sec));
    }
}

impl Clock for ManualClock {
    fn time_of_day(&self) -> Option<NaiveTime> {
        self.now.lock().ok().and_then(|guard| *guard)
    }
}
