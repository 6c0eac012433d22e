//! State calculator.
//!
//! Pure functions mapping an occurrence table, the cycle's active length and
//! the current time of day to a lifecycle state. Intervals are half-open: a
//! cycle exactly at its activation instant is `Active`.

use chrono::{NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use super::occurrence::{OccurrenceTable, DAY};

/// An occurrence this close is reported as `Preparation`.
pub const PREPARATION_WINDOW: TimeDelta = TimeDelta::minutes(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    /// State could not be computed (no occurrences or no clock reading).
    #[default]
    Unknown,
    Inactive,
    /// Next occurrence is within [`PREPARATION_WINDOW`].
    Preparation,
    Active,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Unknown => "unknown",
            CycleState::Inactive => "inactive",
            CycleState::Preparation => "preparation",
            CycleState::Active => "active",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offset of `time` from midnight.
pub fn time_of_day(time: NaiveTime) -> TimeDelta {
    TimeDelta::seconds(i64::from(time.num_seconds_from_midnight()))
        + TimeDelta::nanoseconds(i64::from(time.nanosecond()))
}

/// Wait until the next occurrence, wrapping to tomorrow's first occurrence
/// when `now` is past the last one. `None` for an empty table.
pub fn time_until_active(table: &OccurrenceTable, now: TimeDelta) -> Option<TimeDelta> {
    match table.offsets().iter().find(|offset| **offset >= now) {
        Some(next) => Some(*next - now),
        None => table.first().map(|first| first + DAY - now),
    }
}

/// Time elapsed since the latest occurrence, wrapping to yesterday's last
/// occurrence when `now` is before the first one. `None` for an empty table.
pub fn time_since_active(table: &OccurrenceTable, now: TimeDelta) -> Option<TimeDelta> {
    match table.offsets().iter().rev().find(|offset| **offset <= now) {
        Some(last) => Some(now - *last),
        None => table.last().map(|last| (now - last) + DAY),
    }
}

/// Classify a cycle from its active length and the two distances.
pub fn classify(length: TimeDelta, since: TimeDelta, until: TimeDelta) -> CycleState {
    if since >= TimeDelta::zero() && since < length {
        CycleState::Active
    } else if until <= PREPARATION_WINDOW {
        CycleState::Preparation
    } else {
        CycleState::Inactive
    }
}

/// Value shown on a cycle's timer: negative elapsed time while active,
/// otherwise the remaining wait.
pub fn timer_value(state: CycleState, since: TimeDelta, until: TimeDelta) -> TimeDelta {
    if state == CycleState::Active {
        -since
    } else {
        until
    }
}

/// Result of one evaluation of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub state: CycleState,
    pub time_until_active: Option<TimeDelta>,
    pub time_since_active: Option<TimeDelta>,
    pub timer_value: Option<TimeDelta>,
}

/// Evaluate a cycle at `now`. Yields `Unknown` when the table is empty or no
/// clock reading is available.
pub fn evaluate(table: &OccurrenceTable, length: TimeDelta, now: Option<TimeDelta>) -> Evaluation {
    let Some(now) = now else {
        return Evaluation::default();
    };
    match (time_until_active(table, now), time_since_active(table, now)) {
        (Some(until), Some(since)) => {
            let state = classify(length, since, until);
            Evaluation {
                state,
                time_until_active: Some(until),
                time_since_active: Some(since),
                timer_value: Some(timer_value(state, since, until)),
            }
        }
        _ => Evaluation::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hm(h: i64, m: i64) -> TimeDelta {
        TimeDelta::hours(h) + TimeDelta::minutes(m)
    }

    fn verdant_day() -> OccurrenceTable {
        OccurrenceTable::generate(hm(0, 30), hm(2, 0)).unwrap()
    }

    #[test]
    fn active_shortly_after_occurrence() {
        let eval = evaluate(&verdant_day(), hm(1, 15), Some(hm(1, 0)));
        assert_eq!(eval.state, CycleState::Active);
        assert_eq!(eval.time_since_active, Some(hm(0, 30)));
        assert_eq!(eval.timer_value, Some(-hm(0, 30)));
    }

    #[test]
    fn preparation_just_before_first_occurrence() {
        let eval = evaluate(&verdant_day(), hm(1, 15), Some(hm(0, 20)));
        assert_eq!(eval.state, CycleState::Preparation);
        assert_eq!(eval.time_until_active, Some(hm(0, 10)));
        assert_eq!(eval.timer_value, Some(hm(0, 10)));
    }

    #[test]
    fn late_evening_wraps_to_next_day() {
        let eval = evaluate(&verdant_day(), hm(1, 15), Some(hm(23, 50)));
        assert_eq!(eval.time_until_active, Some(hm(0, 40)));
        assert_eq!(eval.state, CycleState::Inactive);
    }

    #[test]
    fn early_morning_since_wraps_to_previous_day_last_occurrence() {
        // Last occurrence was 22:30 yesterday.
        let since = time_since_active(&verdant_day(), hm(0, 10)).unwrap();
        assert_eq!(since, hm(1, 40));
    }

    #[test]
    fn activation_instant_is_active() {
        let eval = evaluate(&verdant_day(), hm(1, 15), Some(hm(2, 30)));
        assert_eq!(eval.time_since_active, Some(TimeDelta::zero()));
        assert_eq!(eval.time_until_active, Some(TimeDelta::zero()));
        assert_eq!(eval.state, CycleState::Active);
    }

    #[test]
    fn end_of_active_phase_is_exclusive() {
        // 00:30 + 1h15 = 01:45, next occurrence 02:30 is 45 minutes away.
        let eval = evaluate(&verdant_day(), hm(1, 15), Some(hm(1, 45)));
        assert_eq!(eval.state, CycleState::Inactive);
    }

    #[test]
    fn preparation_threshold_is_inclusive() {
        assert_eq!(
            classify(hm(0, 10), hm(1, 0), PREPARATION_WINDOW),
            CycleState::Preparation
        );
        assert_eq!(
            classify(hm(0, 10), hm(1, 0), PREPARATION_WINDOW + TimeDelta::seconds(1)),
            CycleState::Inactive
        );
    }

    #[test]
    fn empty_table_is_unknown() {
        let eval = evaluate(&OccurrenceTable::default(), hm(1, 0), Some(hm(5, 0)));
        assert_eq!(eval.state, CycleState::Unknown);
        assert!(eval.time_until_active.is_none());
        assert!(time_since_active(&OccurrenceTable::default(), hm(5, 0)).is_none());
    }

    #[test]
    fn missing_clock_is_unknown() {
        let eval = evaluate(&verdant_day(), hm(1, 15), None);
        assert_eq!(eval.state, CycleState::Unknown);
        assert!(eval.timer_value.is_none());
    }

    #[test]
    fn time_of_day_includes_subseconds() {
        let t = NaiveTime::from_hms_milli_opt(1, 2, 3, 500).unwrap();
        assert_eq!(time_of_day(t), TimeDelta::milliseconds(3_723_500));
    }

    fn arb_table() -> impl Strategy<Value = OccurrenceTable> {
        prop::collection::vec(0i64..86_400, 1..16).prop_map(|secs| {
            OccurrenceTable::from_offsets(secs.into_iter().map(TimeDelta::seconds).collect())
        })
    }

    proptest! {
        #[test]
        fn until_lands_on_nearest_occurrence(table in arb_table(), now_secs in 0i64..86_400) {
            let now = TimeDelta::seconds(now_secs);
            let until = time_until_active(&table, now).unwrap();
            prop_assert!(until >= TimeDelta::zero());

            let landing = (now + until).num_seconds().rem_euclid(86_400);
            prop_assert!(table.offsets().contains(&TimeDelta::seconds(landing)));

            for offset in table.offsets() {
                let wait = (*offset - now).num_seconds().rem_euclid(86_400);
                prop_assert!(until.num_seconds() <= wait);
            }
        }

        #[test]
        fn since_lands_on_latest_occurrence(table in arb_table(), now_secs in 0i64..86_400) {
            let now = TimeDelta::seconds(now_secs);
            let since = time_since_active(&table, now).unwrap();
            prop_assert!(since >= TimeDelta::zero());
            let landing = (now - since).num_seconds().rem_euclid(86_400);
            prop_assert!(table.offsets().contains(&TimeDelta::seconds(landing)));
        }

        #[test]
        fn classify_is_total(
            length in 0i64..86_400,
            since in 0i64..86_400,
            until in 0i64..86_400,
        ) {
            let state = classify(
                TimeDelta::seconds(length),
                TimeDelta::seconds(since),
                TimeDelta::seconds(until),
            );
            prop_assert_ne!(state, CycleState::Unknown);
        }
    }
}
