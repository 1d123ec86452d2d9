/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core alarm data structures for the Daybreak scheduler.
//!
//! ```text
//! caller ──(TimeOfDay, Callback)──►  AlarmScheduler  ──►  Alarm { id, time, callback, last fired }
//!                                          │
//!                                          └──►  AlarmId handed back to the caller
//! ```
//!
//! # Ownership model
//! An [`Alarm`] is **owned** by the scheduler's alarm table for as long as it
//! is registered.  The [`Callback`] inside it is shared (`Arc`): the caller may
//! keep its own clone, and the scheduler clones it once more when it fires so
//! the callback can run without the scheduler lock held.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, TimeDelta, Utc};

// ── AlarmId ───────────────────────────────────────────────────────────────────

/// Opaque identifier handed out by
/// [`AlarmScheduler::add_alarm`](crate::scheduler::AlarmScheduler::add_alarm).
///
/// Ids come from a per-scheduler counter and are never reused by the
/// scheduler that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlarmId(u64);

impl AlarmId {
    pub(crate) fn new(raw: u64) -> Self {
        AlarmId(raw)
    }

    /// Raw counter value, for logging and diagnostics.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alarm#{}", self.0)
    }
}

// ── TimeOfDay ─────────────────────────────────────────────────────────────────

/// Smallest step `chrono::NaiveTime` can represent.  Used to nudge colliding
/// alarm times apart.
pub fn nudge_step() -> TimeDelta {
    TimeDelta::nanoseconds(1)
}

/// Advance `time` by [`nudge_step`], wrapping past midnight.
pub fn nudge_time(time: NaiveTime) -> NaiveTime {
    time.overflowing_add_signed(nudge_step()).0
}

/// A wall-clock time without a date, annotated with the UTC offset that was
/// in effect when it was set.
///
/// Equality, ordering and hashing look at the wall-clock time **only**: two
/// alarms at 07:00 collide even if one was registered in winter and the other
/// in summer.  The offset is consulted only when the time is turned into an
/// absolute instant (see [`LocalClock::resolve`](crate::clock::LocalClock::resolve)).
#[derive(Debug, Clone, Copy)]
pub struct TimeOfDay {
    time: NaiveTime,
    offset: FixedOffset,
}

impl TimeOfDay {
    pub fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self { time, offset }
    }

    /// A time annotated with offset `+00:00`.
    pub fn utc(time: NaiveTime) -> Self {
        Self::new(time, Utc.fix())
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Same offset annotation, different wall-clock time.
    pub fn with_time(self, time: NaiveTime) -> Self {
        Self { time, ..self }
    }

    /// Move around the clock face by `delta`, wrapping past midnight in
    /// either direction.  The offset annotation is kept.
    ///
    /// ```rust
    /// use chrono::{NaiveTime, TimeDelta};
    /// use daybreak::alarm::TimeOfDay;
    ///
    /// let t = TimeOfDay::utc(NaiveTime::from_hms_opt(0, 0, 30).unwrap());
    /// let before = t.shifted(-TimeDelta::seconds(60));
    /// assert_eq!(before.time(), NaiveTime::from_hms_opt(23, 59, 30).unwrap());
    /// ```
    pub fn shifted(self, delta: TimeDelta) -> Self {
        self.with_time(self.time.overflowing_add_signed(delta).0)
    }
}

impl PartialEq for TimeOfDay {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for TimeOfDay {}

impl PartialOrd for TimeOfDay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeOfDay {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}

impl Hash for TimeOfDay {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.time.hash(state);
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.time, self.offset)
    }
}

// ── Callback ──────────────────────────────────────────────────────────────────

/// Zero-argument operation run when an alarm fires.
///
/// Runs synchronously on the timer's blocking thread.  It must not block
/// forever: nothing preempts it, and the next alarm is only armed after it
/// returns.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

// ── Alarm ─────────────────────────────────────────────────────────────────────

/// One registered daily alarm.
#[derive(Clone)]
pub struct Alarm {
    pub id: AlarmId,

    /// Key used in the time index (already nudged if it collided).
    pub time_of_day: TimeOfDay,

    pub callback: Callback,

    /// Local date of the most recent firing.  `None` until the first one.
    ///
    /// Only used to stop an alarm that fired a hair early from being picked
    /// again on the same day.
    pub last_trigger_date: Option<NaiveDate>,
}

impl Alarm {
    pub fn new(id: AlarmId, time_of_day: TimeOfDay, callback: Callback) -> Self {
        Self {
            id,
            time_of_day,
            callback,
            last_trigger_date: None,
        }
    }

    /// Returns `true` if this alarm already fired on `date`.
    pub fn fired_on(&self, date: NaiveDate) -> bool {
        self.last_trigger_date == Some(date)
    }
}

impl fmt::Debug for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alarm")
            .field("id", &self.id)
            .field("time_of_day", &self.time_of_day)
            .field("last_trigger_date", &self.last_trigger_date)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
