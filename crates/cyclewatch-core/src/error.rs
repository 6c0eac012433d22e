//! Core error types for cyclewatch-core.
//!
//! This module defines the error hierarchy using thiserror. Schedule loading,
//! per-cycle validation and identifier lookups each get their own type so
//! callers can tell a fatal load failure apart from a skipped entry.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Core error type for cyclewatch-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Schedule could not be loaded, even after regenerating the default
    #[error("Schedule load error: {0}")]
    ScheduleLoad(#[from] ScheduleLoadError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// State query for an identifier that is not tracked
    #[error(transparent)]
    UnknownCycle(#[from] UnknownCycle),

    /// The refresh loop or a notification timer could not be armed
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Schedule source errors.
#[derive(Error, Debug)]
pub enum ScheduleLoadError {
    /// Schedule file does not exist
    #[error("Schedule not found at {path}")]
    Missing { path: PathBuf },

    /// Schedule could not be read
    #[error("Failed to read schedule from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schedule document is malformed
    #[error("Failed to parse schedule: {0}")]
    ParseFailed(String),

    /// Canonical default schedule could not be written back
    #[error("Failed to regenerate schedule: {0}")]
    RegenerateFailed(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors for a single schedule entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Recurrence must be strictly positive
    #[error("recurrence must be greater than zero (got {recurrence_secs}s)")]
    NonPositiveRecurrence { recurrence_secs: i64 },

    /// Recurrence longer than a day cannot be expressed as a daily table
    #[error("recurrence of {recurrence_secs}s exceeds one day")]
    RecurrenceExceedsDay { recurrence_secs: i64 },

    /// Delay must not be negative
    #[error("delay must not be negative (got {delay_secs}s)")]
    NegativeDelay { delay_secs: i64 },

    /// Delay must fall inside the first recurrence window
    #[error("delay ({delay_secs}s) must be less than recurrence ({recurrence_secs}s)")]
    DelayNotBelowRecurrence { delay_secs: i64, recurrence_secs: i64 },

    /// Active phase length must not be negative
    #[error("length must not be negative (got {length_secs}s)")]
    NegativeLength { length_secs: i64 },

    /// Two entries share one identifier
    #[error("duplicate cycle identifier {0}")]
    DuplicateId(Uuid),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Lookup of an identifier that is not in the schedule table.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown cycle identifier: {0}")]
pub struct UnknownCycle(pub Uuid);

impl From<toml::de::Error> for ScheduleLoadError {
    fn from(err: toml::de::Error) -> Self {
        ScheduleLoadError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
