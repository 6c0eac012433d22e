//! # Cyclewatch Core Library
//!
//! This library tracks recurring in-world events ("cycles") that follow a
//! fixed daily schedule, reports each cycle's lifecycle state relative to the
//! wall clock, and raises time-bounded notifications before a cycle becomes
//! active. Overlays and the bundled CLI are thin layers over it.
//!
//! ## Architecture
//!
//! - **Schedule**: TOML schedule table, validated and expanded into per-cycle
//!   occurrence tables once at load
//! - **State Calculator**: pure functions from (occurrences, now) to
//!   lifecycle state and time until/since activation
//! - **Tracker**: ref-counted refresh loop on tokio driving the state
//!   calculator and the notification controller
//! - **Notifications**: edge-triggered show/reset with auto-dismiss timers
//!   and an observable registry
//!
//! ## Key Components
//!
//! - [`CycleTracker`]: refresh loop and state queries
//! - [`CycleTable`]: schedule table
//! - [`OccurrenceTable`]: derived activation offsets
//! - [`Config`]: application configuration management

pub mod cycle;
pub mod error;
pub mod events;
pub mod notify;
pub mod schedule;
pub mod storage;
pub mod tracker;

pub use cycle::{Clock, CycleDefinition, CycleState, CycleTable, ManualClock, OccurrenceTable, SystemClock};
pub use error::{ConfigError, CoreError, ScheduleLoadError, UnknownCycle, ValidationError};
pub use events::CycleEvent;
pub use notify::{CycleNotificationPreference, NotificationPhase, NotificationPreferences};
pub use schedule::{LoadedSchedule, ScheduleSource, TomlFileSource, TrackedCycle};
pub use storage::Config;
pub use tracker::{CycleRuntimeState, CycleSnapshot, CycleTracker, TrackerConfig};
