//! Notification controller.
//!
//! Decides, once per tick and per cycle, whether an approaching occurrence
//! should raise a notification. The decision is edge-triggered: the
//! `notification_shown` latch is set on the first qualifying tick and only
//! cleared once the wait rises back above the lead time, so each approach
//! notifies at most once.
//!
//! ```text
//! Idle --(until <= lead)--> Shown --(auto-dismiss)--> Dismissing --> Idle
//!                             \--(until > lead)--> Idle (latch cleared)
//! ```

use std::collections::BTreeMap;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cycle::definition::hms;
use crate::cycle::{CycleState, Evaluation};
use crate::error::ValidationError;

/// Longest allowed lead time.
pub const MAX_LEAD_TIME: TimeDelta = TimeDelta::hours(1);

/// Per-cycle notification settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleNotificationPreference {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long before activation the notification fires.
    #[serde(with = "hms", default = "default_lead_time")]
    pub lead_time: TimeDelta,
}

impl Default for CycleNotificationPreference {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_time: default_lead_time(),
        }
    }
}

impl CycleNotificationPreference {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `lead_time` is outside `[0, 1h]`.
    pub fn new(enabled: bool, lead_time: TimeDelta) -> Result<Self, ValidationError> {
        let pref = Self { enabled, lead_time };
        pref.validate()?;
        Ok(pref)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lead_time < TimeDelta::zero() || self.lead_time > MAX_LEAD_TIME {
            return Err(ValidationError::InvalidValue {
                field: "lead_time".into(),
                message: format!(
                    "must be between 00:00:00 and 01:00:00 (got {})",
                    hms::format(self.lead_time)
                ),
            });
        }
        Ok(())
    }
}

/// Notification settings consumed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Global switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds a notification stays up; 0 keeps it until closed.
    #[serde(default = "default_auto_dismiss_secs")]
    pub auto_dismiss_secs: u32,
    /// Per-cycle overrides; cycles not listed use the default preference.
    #[serde(default)]
    pub cycles: BTreeMap<Uuid, CycleNotificationPreference>,
}

fn default_true() -> bool {
    true
}
fn default_auto_dismiss_secs() -> u32 {
    10
}
fn default_lead_time() -> TimeDelta {
    TimeDelta::minutes(1)
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_dismiss_secs: default_auto_dismiss_secs(),
            cycles: BTreeMap::new(),
        }
    }
}

impl NotificationPreferences {
    pub fn for_cycle(&self, id: Uuid) -> CycleNotificationPreference {
        self.cycles.get(&id).copied().unwrap_or_default()
    }

    pub fn set_cycle(&mut self, id: Uuid, pref: CycleNotificationPreference) {
        self.cycles.insert(id, pref);
    }

    pub fn auto_dismiss(&self) -> Option<std::time::Duration> {
        (self.auto_dismiss_secs > 0)
            .then(|| std::time::Duration::from_secs(u64::from(self.auto_dismiss_secs)))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.cycles.values().try_for_each(|p| p.validate())
    }
}

/// Externally visible notification phase of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPhase {
    #[default]
    Idle,
    Shown,
    /// Exit transition window before removal.
    Dismissing,
}

/// What a tick asks the tracker to do for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Idle -> Shown.
    Show,
    /// Clear the latch without a dismiss window.
    Reset,
}

/// Decide the notification transition for a freshly evaluated cycle.
pub fn decide(
    shown: bool,
    eval: &Evaluation,
    prefs: &NotificationPreferences,
    cycle: &CycleNotificationPreference,
) -> Transition {
    if eval.state == CycleState::Active {
        return Transition::None;
    }
    let Some(until) = eval.time_until_active else {
        return Transition::None;
    };

    if cycle.enabled && until <= cycle.lead_time {
        if !shown && prefs.enabled {
            Transition::Show
        } else {
            Transition::None
        }
    } else if shown {
        Transition::Reset
    } else {
        Transition::None
    }
}

/// Ordered set of cycles that currently have a notification on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRegistry {
    ids: Vec<Uuid>,
}

impl NotificationRegistry {
    /// Returns `false` if already present.
    pub fn add(&mut self, id: Uuid) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Returns `false` if absent.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        before != self.ids.len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}
