//! Daily recurring-alarm scheduler.
//!
//! [`AlarmScheduler`] keeps any number of alarms keyed by time-of-day and
//! holds exactly one armed timer, aimed at whichever alarm comes next.  Every
//! mutation and every firing recomputes that choice and re-arms.
//!
//! # State and locking
//!
//! | Piece | Type | Role |
//! |---|---|---|
//! | alarm table | [`AlarmTable`] | id → alarm (time, callback, last fired date) |
//! | time index | [`TimeIndex`] | time-of-day → id, circular lookups |
//! | armed timer | `Option<ArmedTimer>` | the one outstanding timer |
//!
//! All three live behind a single `Mutex`; each public method is one critical
//! section, so no caller ever sees the table and index disagree.
//!
//! # Firing and concurrent removal
//!
//! A timer expiry runs `fire` on the blocking pool.  `fire` takes the lock and
//! checks that its timer generation is still the armed one; a timer that was
//! cancelled or replaced before that point does nothing.  Once the check
//! passes the firing is **dispatched**: the callback runs (without the lock)
//! and the scheduler re-arms afterwards, even if the alarm is removed while
//! the callback is running.  So a removal that races a firing may still see
//! the removed alarm's callback run that one last time.
//!
//! After a firing the search for the next alarm starts at the fired alarm's
//! key, not at the clock.  Alarms keyed between the two (a nudged duplicate
//! always is) are due, and fire straight away instead of waiting a day.
//!
//! # Example
//! ```rust,ignore
//! let clock = Arc::new(SystemClock::from_name("Europe/London")?);
//! let scheduler = AlarmScheduler::new(clock, Handle::current());
//! let id = scheduler.add_alarm_at(NaiveTime::from_hms_opt(7, 0, 0).unwrap(), callback(|| ring()));
//! assert_eq!(scheduler.armed().map(|a| a.alarm), Some(id));
//! ```

pub mod error;
pub mod index;
pub mod table;
pub mod timer;

pub use error::SchedulerError;
pub use index::{IndexEntry, IndexError, TimeIndex};
pub use table::AlarmTable;
pub use timer::ArmedAlarm;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::alarm::{Alarm, AlarmId, Callback, TimeOfDay};
use crate::clock::LocalClock;

use timer::{spawn_timer, ArmedTimer};

// ── NextAlarm ─────────────────────────────────────────────────────────────────

/// Result of next-alarm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextAlarm {
    pub time_of_day: TimeOfDay,
    pub id: AlarmId,

    /// The selection went past the last alarm of the day and came round to
    /// the start again, so it belongs to tomorrow.
    pub wrapped: bool,
}

// ── Internal state ────────────────────────────────────────────────────────────

#[derive(Default)]
struct SchedulerState {
    table: AlarmTable,
    index: TimeIndex,
    armed: Option<ArmedTimer>,
    next_id: u64,
    generation: u64,
    stopped: bool,
}

impl SchedulerState {
    fn allocate_id(&mut self) -> AlarmId {
        self.next_id += 1;
        AlarmId::new(self.next_id)
    }

    /// Walk the index circularly from the strict successor of `at_time`,
    /// skipping alarms that already fired on `at_date`.  If every alarm fired
    /// today, the plain successor is returned.
    fn next_alarm(&self, at_time: NaiveTime, at_date: NaiveDate) -> Result<NextAlarm, SchedulerError> {
        if self.table.is_empty() {
            return Err(SchedulerError::NoAlarms);
        }

        let mut first: Option<NextAlarm> = None;
        for entry in self.index.circular_from(at_time) {
            let Some(alarm) = self.table.get(entry.id) else {
                warn!(alarm = %entry.id, time = %entry.time, "indexed alarm missing from table");
                continue;
            };
            let candidate = NextAlarm {
                time_of_day: alarm.time_of_day,
                id: alarm.id,
                wrapped: entry.wrapped,
            };
            if !alarm.fired_on(at_date) {
                return Ok(candidate);
            }
            debug!(alarm = %alarm.id, date = %at_date, "already fired today, skipping");
            first.get_or_insert(candidate);
        }

        first.ok_or(SchedulerError::NoAlarms)
    }

    /// Next alarm as seen from `now`, with the local date it fires on.
    fn upcoming(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<(NextAlarm, NaiveDate), SchedulerError> {
        let today = now.date_naive();
        let next = self.next_alarm(now.time(), today)?;

        let fired_today = self.table.get(next.id).map_or(false, |a| a.fired_on(today));
        let for_tomorrow = next.wrapped || fired_today;
        let date = if !for_tomorrow && next.time_of_day.time() > now.time() {
            today
        } else {
            today.succ_opt().unwrap_or(today)
        };
        Ok((next, date))
    }

    /// The alarm keyed after `key` on `date`, if it has not fired that day.
    fn due_after(&self, key: NaiveTime, date: NaiveDate) -> Option<(NextAlarm, NaiveDate)> {
        let next = self.next_alarm(key, date).ok()?;
        let pending = self.table.get(next.id).map_or(false, |a| !a.fired_on(date));
        (!next.wrapped && pending).then_some((next, date))
    }

    fn cancel_armed(&mut self) {
        if let Some(previous) = self.armed.take() {
            debug!(alarm = %previous.alarm, "cancelling armed timer");
            previous.cancel();
        }
    }
}

struct Inner {
    state: Mutex<SchedulerState>,
    clock: Arc<dyn LocalClock>,
    runtime: Handle,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel whatever is armed, pick the next alarm and arm a timer for it.
    /// Leaves nothing armed if the table is empty.
    fn reschedule(self: &Arc<Self>, state: &mut SchedulerState) {
        self.arm_next(state, None);
    }

    /// As [`reschedule`](Self::reschedule), but right after the alarm keyed
    /// `fired.1` fired for local date `fired.0`.  Alarms keyed after it on
    /// that date that have not fired yet are due even if the clock has
    /// already passed them (a nudged duplicate always has), so they are
    /// armed with no delay.
    fn arm_next(
        self: &Arc<Self>,
        state: &mut SchedulerState,
        fired: Option<(NaiveDate, NaiveTime)>,
    ) {
        state.cancel_armed();
        if state.stopped {
            return;
        }

        let now = self.clock.now();
        let chosen = fired
            .and_then(|(date, key)| state.due_after(key, date))
            .map_or_else(|| state.upcoming(now), Ok);
        let (next, target_date) = match chosen {
            Ok(chosen) => chosen,
            Err(SchedulerError::NoAlarms) => {
                info!("no alarms registered, timer disarmed");
                return;
            }
            Err(e) => {
                warn!("cannot select next alarm: {e}");
                return;
            }
        };

        let fires_at = self.clock.resolve(target_date, next.time_of_day);
        let delay = delay_until(now, fires_at);

        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(self);
        let id = next.id;
        let cancel = spawn_timer(&self.runtime, delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire(id, target_date, generation);
            }
        });

        info!(
            alarm = %id,
            fires_at = %fires_at,
            delay_secs = delay.as_secs(),
            "next alarm armed"
        );
        state.armed = Some(ArmedTimer::new(id, fires_at, generation, cancel));
    }

    /// Timer expiry.  `trigger_date` is the local date the timer was aimed at,
    /// not a fresh clock reading, so an expiry just before midnight still
    /// records the right day.
    fn fire(self: &Arc<Self>, id: AlarmId, trigger_date: NaiveDate, generation: u64) {
        let (key, callback) = {
            let mut state = self.lock();
            match &state.armed {
                Some(armed) if armed.generation == generation => {}
                _ => {
                    debug!(alarm = %id, generation, "superseded timer expired, ignoring");
                    return;
                }
            }
            state.armed = None;
            let key = state.table.time_of(id).map(|t| t.time());
            (key, state.table.mark_fired(id, trigger_date))
        };

        match callback {
            Some(callback) => {
                info!(alarm = %id, date = %trigger_date, "alarm firing");
                if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                    error!(alarm = %id, "alarm callback panicked");
                }
            }
            None => warn!(alarm = %id, "fired alarm is no longer registered"),
        }

        let mut state = self.lock();
        self.arm_next(&mut state, key.map(|key| (trigger_date, key)));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.cancel_armed();
    }
}

fn delay_until(now: DateTime<FixedOffset>, target: DateTime<FixedOffset>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

// ── AlarmScheduler ────────────────────────────────────────────────────────────

/// Cheaply cloneable handle to one scheduler.  All clones share state.
#[derive(Clone)]
pub struct AlarmScheduler {
    inner: Arc<Inner>,
}

impl AlarmScheduler {
    /// Create an empty scheduler.  Timers are spawned on `runtime`.
    pub fn new(clock: Arc<dyn LocalClock>, runtime: Handle) -> Self {
        info!(timezone = %clock.timezone(), "alarm scheduler created");
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState::default()),
                clock,
                runtime,
            }),
        }
    }

    pub fn clock(&self) -> &dyn LocalClock {
        self.inner.clock.as_ref()
    }

    /// Register a daily alarm and return its id.
    ///
    /// If `time_of_day` collides with an existing alarm it is nudged forward;
    /// [`get_alarm_time`](Self::get_alarm_time) reports the nudged value.
    /// Re-arms if the new alarm is now the next one due.
    pub fn add_alarm(&self, time_of_day: TimeOfDay, callback: Callback) -> AlarmId {
        let mut state = self.inner.lock();

        let id = state.allocate_id();
        let key = state.index.insert(time_of_day.time(), id);
        let stored = time_of_day.with_time(key);
        state.table.insert(Alarm::new(id, stored, callback));
        info!(alarm = %id, time = %stored, "alarm added");

        let now = self.inner.clock.now();
        if let Ok(next) = state.next_alarm(now.time(), now.date_naive()) {
            if next.id == id {
                self.inner.reschedule(&mut state);
            }
        }

        id
    }

    /// [`add_alarm`](Self::add_alarm) for a bare wall-clock time, annotated
    /// with the clock's current UTC offset.
    pub fn add_alarm_at(&self, time: NaiveTime, callback: Callback) -> AlarmId {
        let time_of_day = self.inner.clock.annotate(time);
        self.add_alarm(time_of_day, callback)
    }

    /// Unregister `id`.  Returns `false` (and changes nothing) for unknown ids.
    pub fn remove_alarm(&self, id: AlarmId) -> bool {
        let mut state = self.inner.lock();

        let Some(alarm) = state.table.remove(id) else {
            debug!(alarm = %id, "remove requested for unknown alarm");
            return false;
        };
        if let Err(e) = state.index.remove(alarm.time_of_day.time()) {
            warn!(alarm = %id, "index out of step with table: {e}");
        }
        info!(alarm = %id, time = %alarm.time_of_day, "alarm removed");

        let was_armed = state.armed.as_ref().map_or(false, |a| a.alarm == id);
        if was_armed {
            self.inner.reschedule(&mut state);
        }
        true
    }

    /// Time an alarm is registered at (after any nudging).
    pub fn get_alarm_time(&self, id: AlarmId) -> Result<TimeOfDay, SchedulerError> {
        self.inner
            .lock()
            .table
            .time_of(id)
            .ok_or(SchedulerError::NotFound(id))
    }

    /// The alarm that would fire next as seen from local `at_time` on
    /// `at_date`.
    pub fn next_alarm(
        &self,
        at_time: NaiveTime,
        at_date: NaiveDate,
    ) -> Result<NextAlarm, SchedulerError> {
        self.inner.lock().next_alarm(at_time, at_date)
    }

    /// What the scheduler is currently waiting for, if anything.
    pub fn armed(&self) -> Option<ArmedAlarm> {
        self.inner.lock().armed.as_ref().map(ArmedTimer::snapshot)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().table.is_empty()
    }

    pub fn alarm_ids(&self) -> Vec<AlarmId> {
        self.inner.lock().table.ids()
    }

    /// Cancel the armed timer and stop arming new ones.  Registered alarms are
    /// kept; a firing already dispatched still runs its callback.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.stopped = true;
        state.cancel_armed();
        info!(alarms = state.table.len(), "alarm scheduler shut down");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
