//! Cycle tracker: the refresh loop.
//!
//! One tokio task re-evaluates every tracked cycle at a fixed cadence and
//! feeds the result straight into the notification controller. All runtime
//! state, the start reference count, the ticker handle and the notification
//! registry sit behind a single mutex; a refresh pass runs entirely under it,
//! so passes never interleave.
//!
//! ## Lifecycle
//!
//! ```text
//! new -> start (n times) -> stop (n times) -> start ... -> shutdown
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let schedule = schedule::load(&TomlFileSource::default_location()?)?;
//! let tracker = CycleTracker::new(schedule, NotificationPreferences::default())?;
//! let mut events = tracker.subscribe();
//! tracker.start()?;
//! while let Ok(event) = events.recv().await { /* render */ }
//! tracker.shutdown();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cycle::{evaluate, time_of_day, Clock, CycleState, SystemClock};
use crate::error::{CoreError, Result, UnknownCycle, ValidationError};
use crate::events::{millis, CycleEvent};
use crate::notify::{decide, NotificationPhase, NotificationPreferences, NotificationRegistry, Transition};
use crate::schedule::{LoadedSchedule, TrackedCycle};

const EVENT_CAPACITY: usize = 1024;

/// Timing knobs of the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Cadence of the refresh loop.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Length of the exit transition before a notification is removed.
    #[serde(default = "default_dismiss_transition_ms")]
    pub dismiss_transition_ms: u64,
}

fn default_refresh_interval_ms() -> u64 {
    1000
}
fn default_dismiss_transition_ms() -> u64 {
    250
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            dismiss_transition_ms: default_dismiss_transition_ms(),
        }
    }
}

/// Mutable per-cycle state, written only by the refresh pass and the
/// notification timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleRuntimeState {
    pub state: CycleState,
    pub time_until_active: Option<TimeDelta>,
    pub time_since_active: Option<TimeDelta>,
    /// Negative elapsed time while active, otherwise the remaining wait.
    pub timer_value: Option<TimeDelta>,
    /// Edge-trigger latch for the current approach.
    pub notification_shown: bool,
    /// Exit transition in progress.
    pub notification_dismissing: bool,
}

/// Read-only view of one cycle for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub id: Uuid,
    pub name: String,
    pub map_id: u32,
    pub map_name: Option<String>,
    pub waypoint_code: String,
    pub state: CycleState,
    pub time_until_active_ms: Option<i64>,
    pub time_since_active_ms: Option<i64>,
    pub timer_value_ms: Option<i64>,
    pub notification: NotificationPhase,
}

struct DismissTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Entry {
    cycle: TrackedCycle,
    runtime: CycleRuntimeState,
    dismiss: Option<DismissTimer>,
}

impl Entry {
    fn id(&self) -> Uuid {
        self.cycle.definition.id
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.dismiss.take() {
            timer.handle.abort();
        }
        self.runtime.notification_dismissing = false;
    }

    fn phase(&self, registry: &NotificationRegistry) -> NotificationPhase {
        if self.runtime.notification_dismissing {
            NotificationPhase::Dismissing
        } else if registry.contains(self.id()) {
            NotificationPhase::Shown
        } else {
            NotificationPhase::Idle
        }
    }

    fn snapshot(&self, registry: &NotificationRegistry) -> CycleSnapshot {
        let def = &self.cycle.definition;
        CycleSnapshot {
            id: def.id,
            name: def.name.clone(),
            map_id: def.map_id,
            map_name: def.map_name.clone(),
            waypoint_code: def.waypoint_code.clone(),
            state: self.runtime.state,
            time_until_active_ms: millis(self.runtime.time_until_active),
            time_since_active_ms: millis(self.runtime.time_since_active),
            timer_value_ms: millis(self.runtime.timer_value),
            notification: self.phase(registry),
        }
    }
}

struct Inner {
    entries: Vec<Entry>,
    index: HashMap<Uuid, usize>,
    preferences: NotificationPreferences,
    registry: NotificationRegistry,
    start_count: usize,
    stopped: bool,
    ticker: Option<JoinHandle<()>>,
    /// Identifies the current ticker; a superseded ticker's tick is a no-op.
    run_id: u64,
    next_generation: u64,
}

impl Inner {
    fn entry_mut(&mut self, id: Uuid) -> Option<&mut Entry> {
        let idx = *self.index.get(&id)?;
        self.entries.get_mut(idx)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<CycleEvent>,
    refresh_interval: Duration,
    dismiss_transition: Duration,
}

/// Tracks every loaded cycle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CycleTracker {
    shared: Arc<Shared>,
}

impl CycleTracker {
    /// Tracker with default timing and the UTC wall clock.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `preferences` holds an out-of-range lead time.
    pub fn new(schedule: LoadedSchedule, preferences: NotificationPreferences) -> Result<Self> {
        Self::with_options(
            schedule,
            preferences,
            TrackerConfig::default(),
            Arc::new(SystemClock),
        )
    }

    /// # Errors
    ///
    /// Returns a validation error if `preferences` holds an out-of-range lead
    /// time or `config.refresh_interval_ms` is zero.
    pub fn with_options(
        schedule: LoadedSchedule,
        preferences: NotificationPreferences,
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        preferences.validate()?;
        if config.refresh_interval_ms == 0 {
            return Err(ValidationError::InvalidValue {
                field: "refresh_interval_ms".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }

        let mut index = HashMap::new();
        let entries: Vec<Entry> = schedule
            .cycles
            .into_iter()
            .enumerate()
            .map(|(idx, cycle)| {
                index.insert(cycle.definition.id, idx);
                Entry {
                    cycle,
                    runtime: CycleRuntimeState::default(),
                    dismiss: None,
                }
            })
            .collect();
        debug!("Initializing tracker for {} cycles", entries.len());

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    entries,
                    index,
                    preferences,
                    registry: NotificationRegistry::default(),
                    start_count: 0,
                    stopped: true,
                    ticker: None,
                    run_id: 0,
                    next_generation: 0,
                }),
                clock,
                events,
                refresh_interval: Duration::from_millis(config.refresh_interval_ms),
                dismiss_transition: Duration::from_millis(config.dismiss_transition_ms),
            }),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Subscribe to state and notification events.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.shared.events.subscribe()
    }

    /// Current runtime state of a cycle.
    pub fn state(&self, id: Uuid) -> Result<CycleRuntimeState, UnknownCycle> {
        let mut inner = self.shared.lock();
        inner.entry_mut(id).map(|e| e.runtime).ok_or(UnknownCycle(id))
    }

    pub fn snapshot(&self, id: Uuid) -> Result<CycleSnapshot, UnknownCycle> {
        let inner = self.shared.lock();
        let idx = *inner.index.get(&id).ok_or(UnknownCycle(id))?;
        Ok(inner.entries[idx].snapshot(&inner.registry))
    }

    /// Snapshots of every cycle, in schedule order.
    pub fn snapshots(&self) -> Vec<CycleSnapshot> {
        let inner = self.shared.lock();
        inner
            .entries
            .iter()
            .map(|e| e.snapshot(&inner.registry))
            .collect()
    }

    /// Cycles that currently have a notification on screen.
    pub fn active_notifications(&self) -> Vec<Uuid> {
        self.shared.lock().registry.ids().to_vec()
    }

    pub fn preferences(&self) -> NotificationPreferences {
        self.shared.lock().preferences.clone()
    }

    pub fn start_count(&self) -> usize {
        self.shared.lock().start_count
    }

    pub fn is_running(&self) -> bool {
        let inner = self.shared.lock();
        !inner.stopped && inner.ticker.is_some()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Request the refresh loop. Only the first outstanding request arms it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Scheduler`] when called outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        debug!("Start called");
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Scheduler(format!("cannot arm refresh loop: {e}")))?;

        let mut inner = self.shared.lock();
        if inner.start_count == 0 {
            info!("Starting cycle refresh loop");
            inner.stopped = false;
            inner.run_id += 1;
            if let Some(old) = inner.ticker.take() {
                old.abort();
            }
            let run_id = inner.run_id;
            let weak = Arc::downgrade(&self.shared);
            let interval = self.shared.refresh_interval;
            inner.ticker = Some(runtime.spawn(run_ticker(weak, run_id, interval)));
            self.shared.emit(CycleEvent::TrackerStarted { at: Utc::now() });
        }
        inner.start_count += 1;
        debug!("start_count = {}", inner.start_count);
        Ok(())
    }

    /// Release one start request. Ticking halts once every start has a
    /// matching stop.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        if inner.start_count == 0 {
            warn!("Stop called without a matching start");
            return;
        }
        inner.start_count -= 1;
        debug!("Stop called - start_count = {}", inner.start_count);
        if inner.start_count == 0 {
            info!("Stopping cycle refresh loop");
            halt(&mut inner);
            self.shared.emit(CycleEvent::TrackerStopped { at: Utc::now() });
        }
    }

    /// Halt ticking regardless of outstanding start requests and cancel
    /// every pending dismiss timer.
    pub fn shutdown(&self) {
        info!("Shutting down cycle tracker");
        let mut inner = self.shared.lock();
        inner.start_count = 0;
        halt(&mut inner);
        for entry in &mut inner.entries {
            entry.cancel_timer();
        }
        self.shared.emit(CycleEvent::TrackerShutdown { at: Utc::now() });
    }

    /// Run one refresh pass now, independent of the loop.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Scheduler`] if a notification needs a dismiss
    /// timer and no tokio runtime is available.
    pub fn tick_now(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        self.shared.refresh(&mut inner)
    }

    /// Replace the notification preferences. Turning notifications off
    /// globally removes every displayed notification at once.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an out-of-range lead time; the
    /// previous preferences stay in effect.
    pub fn set_preferences(&self, preferences: NotificationPreferences) -> Result<(), ValidationError> {
        preferences.validate()?;
        let mut inner = self.shared.lock();
        let disabling = inner.preferences.enabled && !preferences.enabled;
        inner.preferences = preferences;
        if disabling {
            info!("Notifications disabled, removing all displayed notifications");
            let Inner {
                entries, registry, ..
            } = &mut *inner;
            for entry in entries.iter_mut() {
                entry.cancel_timer();
                if registry.remove(entry.id()) {
                    self.shared.emit(CycleEvent::NotificationRemoved {
                        cycle_id: entry.id(),
                        at: Utc::now(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Close a notification immediately. The approach stays latched, so it
    /// will not reappear before the next approach.
    pub fn dismiss(&self, id: Uuid) -> Result<(), UnknownCycle> {
        let mut inner = self.shared.lock();
        let Inner {
            entries,
            index,
            registry,
            ..
        } = &mut *inner;
        let idx = *index.get(&id).ok_or(UnknownCycle(id))?;
        let entry = &mut entries[idx];
        entry.cancel_timer();
        if registry.remove(id) {
            debug!("Removing notification for \"{}\"", entry.cycle.definition.name);
            self.shared.emit(CycleEvent::NotificationRemoved {
                cycle_id: id,
                at: Utc::now(),
            });
        }
        Ok(())
    }
}

fn halt(inner: &mut Inner) {
    inner.stopped = true;
    if let Some(ticker) = inner.ticker.take() {
        ticker.abort();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// One tick of the loop. Returns `false` once the loop should exit.
    fn tick(self: &Arc<Self>, run_id: u64) -> bool {
        let mut inner = self.lock();
        if inner.stopped || inner.run_id != run_id {
            debug!("Tick skipped, refresh loop stopped");
            return false;
        }
        match self.refresh(&mut inner) {
            Ok(()) => true,
            Err(e) => {
                error!("Cycle refresh loop halted: {e}");
                // Outstanding starts are released so the next start re-arms.
                inner.start_count = 0;
                inner.stopped = true;
                inner.ticker = None;
                self.emit(CycleEvent::TrackerStopped { at: Utc::now() });
                false
            }
        }
    }

    /// Re-evaluate every cycle, then run the notification controller on the
    /// value just computed.
    fn refresh(self: &Arc<Self>, inner: &mut Inner) -> Result<()> {
        let now = self.clock.time_of_day().map(time_of_day);
        let Inner {
            entries,
            preferences,
            registry,
            next_generation,
            ..
        } = inner;

        for entry in entries.iter_mut() {
            let id = entry.id();
            let eval = evaluate(
                &entry.cycle.occurrences,
                entry.cycle.definition.length,
                now,
            );

            let runtime = &mut entry.runtime;
            if runtime.state != eval.state {
                runtime.state = eval.state;
                self.emit(CycleEvent::StateChanged {
                    cycle_id: id,
                    state: eval.state,
                    at: Utc::now(),
                });
            }
            let timers = (eval.time_until_active, eval.time_since_active, eval.timer_value);
            if (runtime.time_until_active, runtime.time_since_active, runtime.timer_value) != timers {
                runtime.time_until_active = eval.time_until_active;
                runtime.time_since_active = eval.time_since_active;
                runtime.timer_value = eval.timer_value;
                self.emit(CycleEvent::TimerUpdated {
                    cycle_id: id,
                    time_until_active_ms: millis(eval.time_until_active),
                    time_since_active_ms: millis(eval.time_since_active),
                    timer_value_ms: millis(eval.timer_value),
                    at: Utc::now(),
                });
            }

            let shown = runtime.notification_shown;
            let cycle_pref = preferences.for_cycle(id);
            match decide(shown, &eval, preferences, &cycle_pref) {
                Transition::Show => {
                    self.show(entry, registry, preferences, next_generation)?;
                }
                Transition::Reset => {
                    entry.runtime.notification_shown = false;
                    debug!("Notification latch reset for \"{}\"", entry.cycle.definition.name);
                    self.emit(CycleEvent::NotificationReset {
                        cycle_id: id,
                        at: Utc::now(),
                    });
                }
                Transition::None => {}
            }
        }
        Ok(())
    }

    fn show(
        self: &Arc<Self>,
        entry: &mut Entry,
        registry: &mut NotificationRegistry,
        preferences: &NotificationPreferences,
        next_generation: &mut u64,
    ) -> Result<()> {
        let id = entry.id();
        entry.runtime.notification_shown = true;
        entry.cancel_timer();
        info!("Displaying notification for \"{}\"", entry.cycle.definition.name);
        if registry.add(id) {
            self.emit(CycleEvent::NotificationAdded {
                cycle_id: id,
                at: Utc::now(),
            });
        }

        if let Some(after) = preferences.auto_dismiss() {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| CoreError::Scheduler(format!("cannot arm dismiss timer: {e}")))?;
            *next_generation += 1;
            let generation = *next_generation;
            let handle = runtime.spawn(run_dismiss(Arc::downgrade(self), id, generation, after));
            entry.dismiss = Some(DismissTimer { generation, handle });
        }
        Ok(())
    }

    /// Shown -> Dismissing. Returns `false` if the timer was superseded.
    fn begin_dismiss(&self, id: Uuid, generation: u64) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entry_mut(id) else {
            return false;
        };
        if entry.dismiss.as_ref().map(|t| t.generation) != Some(generation) {
            return false;
        }
        entry.runtime.notification_dismissing = true;
        self.emit(CycleEvent::NotificationDismissing {
            cycle_id: id,
            at: Utc::now(),
        });
        true
    }

    /// Dismissing -> Idle.
    fn finish_dismiss(&self, id: Uuid, generation: u64) {
        let mut inner = self.lock();
        let Inner {
            entries,
            index,
            registry,
            ..
        } = &mut *inner;
        let Some(entry) = index.get(&id).and_then(|idx| entries.get_mut(*idx)) else {
            return;
        };
        if entry.dismiss.as_ref().map(|t| t.generation) != Some(generation) {
            return;
        }
        entry.dismiss = None;
        entry.runtime.notification_dismissing = false;
        if registry.remove(id) {
            debug!("Removing notification for \"{}\"", entry.cycle.definition.name);
            self.emit(CycleEvent::NotificationRemoved {
                cycle_id: id,
                at: Utc::now(),
            });
        }
    }
}

async fn run_ticker(shared: Weak<Shared>, run_id: u64, interval: Duration) {
    loop {
        let Some(strong) = shared.upgrade() else {
            break;
        };
        let keep_going = strong.tick(run_id);
        drop(strong);
        if !keep_going {
            break;
        }
        tokio::time::sleep(interval).await;
    }
}

async fn run_dismiss(shared: Weak<Shared>, id: Uuid, generation: u64, after: Duration) {
    tokio::time::sleep(after).await;
    let transition = match shared.upgrade() {
        Some(strong) if strong.begin_dismiss(id, generation) => strong.dismiss_transition,
        _ => return,
    };
    tokio::time::sleep(transition).await;
    if let Some(strong) = shared.upgrade() {
        strong.finish_dismiss(id, generation);
    }
}
