use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cycle::CycleState;

/// Every observable change in the tracker produces an Event.
/// Presentation layers subscribe to them; each event carries a single field
/// update keyed by cycle identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CycleEvent {
    StateChanged {
        cycle_id: Uuid,
        state: CycleState,
        at: DateTime<Utc>,
    },
    /// Timer values, in signed milliseconds. `None` while the state is unknown.
    TimerUpdated {
        cycle_id: Uuid,
        time_until_active_ms: Option<i64>,
        time_since_active_ms: Option<i64>,
        timer_value_ms: Option<i64>,
        at: DateTime<Utc>,
    },
    /// Cycle entered the active-notifications registry.
    NotificationAdded {
        cycle_id: Uuid,
        at: DateTime<Utc>,
    },
    /// Exit transition started; removal follows.
    NotificationDismissing {
        cycle_id: Uuid,
        at: DateTime<Utc>,
    },
    /// Cycle left the active-notifications registry.
    NotificationRemoved {
        cycle_id: Uuid,
        at: DateTime<Utc>,
    },
    /// Edge-trigger latch cleared; the next approach may notify again.
    NotificationReset {
        cycle_id: Uuid,
        at: DateTime<Utc>,
    },
    TrackerStarted {
        at: DateTime<Utc>,
    },
    TrackerStopped {
        at: DateTime<Utc>,
    },
    TrackerShutdown {
        at: DateTime<Utc>,
    },
}

impl CycleEvent {
    /// Cycle the event refers to, if any.
    pub fn cycle_id(&self) -> Option<Uuid> {
        match self {
            CycleEvent::StateChanged { cycle_id, .. }
            | CycleEvent::TimerUpdated { cycle_id, .. }
            | CycleEvent::NotificationAdded { cycle_id, .. }
            | CycleEvent::NotificationDismissing { cycle_id, .. }
            | CycleEvent::NotificationRemoved { cycle_id, .. }
            | CycleEvent::NotificationReset { cycle_id, .. } => Some(*cycle_id),
            CycleEvent::TrackerStarted { .. }
            | CycleEvent::TrackerStopped { .. }
            | CycleEvent::TrackerShutdown { .. } => None,
        }
    }
}

pub(crate) fn millis(value: Option<TimeDelta>) -> Option<i64> {
    value.map(|v| v.num_milliseconds())
}
