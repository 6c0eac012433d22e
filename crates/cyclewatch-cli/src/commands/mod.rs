pub mod config;
pub mod schedule;
pub mod status;
pub mod watch;

use std::sync::Arc;

use chrono::NaiveTime;
use cyclewatch_core::schedule::{self as core_schedule, TomlFileSource};
use cyclewatch_core::{Clock, Config, CycleTracker, ManualClock, SystemClock};

/// Schedule file from the config override or the data directory.
pub fn schedule_source(config: &Config) -> Result<TomlFileSource, Box<dyn std::error::Error>> {
    match &config.schedule_path {
        Some(path) => Ok(TomlFileSource::new(path)),
        None => Ok(TomlFileSource::default_location()?),
    }
}

/// Parse `HH:MM[:SS]` as a UTC time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("expected HH:MM[:SS], got '{s}'"))
}

/// Load config and schedule and build a tracker. Skipped schedule entries
/// are reported on stderr.
pub fn load_tracker(at: Option<NaiveTime>) -> Result<CycleTracker, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let source = schedule_source(&config)?;
    let loaded = core_schedule::load(&source)?;
    for warning in &loaded.warnings {
        eprintln!("warning: {warning}");
    }

    let clock: Arc<dyn Clock> = match at {
        Some(time) => Arc::new(ManualClock::new(Some(time))),
        None => Arc::new(SystemClock),
    };
    let tracker =
        CycleTracker::with_options(loaded, config.notifications, config.tracker, clock)?;
    Ok(tracker)
}

pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
