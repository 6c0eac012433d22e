//! Occurrence generator.
//!
//! Expands a cycle's `delay`/`recurrence` into the time-of-day offsets at
//! which it becomes active:
//!
//! ```text
//! delay, delay + r, delay + 2r, ...   while offset < 24h
//! ```

use chrono::TimeDelta;

use crate::error::ValidationError;

/// Length of the day the table repeats over.
pub const DAY: TimeDelta = TimeDelta::hours(24);

/// Strictly increasing activation offsets within one day.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccurrenceTable {
    offsets: Vec<TimeDelta>,
}

impl OccurrenceTable {
    /// Generate the table for `delay`/`recurrence`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `recurrence <= 0`, `recurrence > 24h`,
    /// `delay < 0` or `delay >= recurrence`.
    pub fn generate(delay: TimeDelta, recurrence: TimeDelta) -> Result<Self, ValidationError> {
        if recurrence <= TimeDelta::zero() {
            return Err(ValidationError::NonPositiveRecurrence {
                recurrence_secs: recurrence.num_seconds(),
            });
        }
        if recurrence > DAY {
            return Err(ValidationError::RecurrenceExceedsDay {
                recurrence_secs: recurrence.num_seconds(),
            });
        }
        if delay < TimeDelta::zero() {
            return Err(ValidationError::NegativeDelay {
                delay_secs: delay.num_seconds(),
            });
        }
        if delay >= recurrence {
            return Err(ValidationError::DelayNotBelowRecurrence {
                delay_secs: delay.num_seconds(),
                recurrence_secs: recurrence.num_seconds(),
            });
        }

        let mut offsets = Vec::new();
        let mut current = delay;
        while current < DAY {
            offsets.push(current);
            current += recurrence;
        }
        Ok(Self { offsets })
    }

    /// Build a table from explicit offsets. Offsets are sorted and
    /// deduplicated; anything outside `[0, 24h)` is dropped.
    pub fn from_offsets(mut offsets: Vec<TimeDelta>) -> Self {
        offsets.retain(|o| *o >= TimeDelta::zero() && *o < DAY);
        offsets.sort();
        offsets.dedup();
        Self { offsets }
    }

    pub fn offsets(&self) -> &[TimeDelta] {
        &self.offsets
    }

    pub fn first(&self) -> Option<TimeDelta> {
        self.offsets.first().copied()
    }

    pub fn last(&self) -> Option<TimeDelta> {
        self.offsets.last().copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
