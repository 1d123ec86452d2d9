/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Wall-clock and timezone abstraction.
//!
//! The scheduler never reads the system time itself.  It is handed a
//! [`LocalClock`] and asks it for "now" and for the absolute instant behind a
//! local (date, time-of-day) pair.  DST rules come from the IANA database via
//! `chrono-tz`.
//!
//! | Local time on the target date | Resolution |
//! |---|---|
//! | exists once | that instant |
//! | exists twice (autumn fold) | the occurrence whose offset matches the alarm's annotation, else the earlier one |
//! | does not exist (spring gap) | pushed forward by the gap length (wall time read with the pre-transition offset) |

use std::sync::{Mutex, PoisonError};

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

use crate::alarm::TimeOfDay;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("unknown timezone '{0}' (expected an IANA name such as 'Europe/London')")]
    UnknownTimezone(String),
}

/// Source of local wall-clock time for one configured timezone.
pub trait LocalClock: Send + Sync {
    /// The configured timezone.
    fn timezone(&self) -> Tz;

    /// Current instant, expressed with the local offset in effect right now.
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Current local time-of-day annotated with the current offset.
    fn time_of_day(&self) -> TimeOfDay {
        let now = self.now();
        TimeOfDay::new(now.time(), *now.offset())
    }

    /// Annotate a bare wall-clock time with the offset in effect now.
    fn annotate(&self, time: NaiveTime) -> TimeOfDay {
        TimeOfDay::new(time, *self.now().offset())
    }

    /// UTC offset for a local date/time, or `None` if that wall time is
    /// skipped by a DST transition.  In a fold the earlier offset wins.
    fn offset_at(&self, date: NaiveDate, time: NaiveTime) -> Option<FixedOffset> {
        self.timezone()
            .offset_from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|o| o.fix())
    }

    /// Absolute instant at which `at` occurs on local `date`.
    fn resolve(&self, date: NaiveDate, at: TimeOfDay) -> DateTime<FixedOffset> {
        resolve_local(&self.timezone(), date, at)
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ClockError> {
    name.parse::<Tz>()
        .map_err(|_| ClockError::UnknownTimezone(name.to_string()))
}

/// See the module-level table for how folds and gaps are handled.
pub fn resolve_local(tz: &Tz, date: NaiveDate, at: TimeOfDay) -> DateTime<FixedOffset> {
    let naive = date.and_time(at.time());
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.fixed_offset(),
        LocalResult::Ambiguous(earliest, latest) => {
            if latest.offset().fix() == at.offset() {
                latest.fixed_offset()
            } else {
                earliest.fixed_offset()
            }
        }
        LocalResult::None => {
            // Transitions happen at most once a day, so the offset a day
            // earlier is the one in force before the gap.
            let before = tz
                .offset_from_local_datetime(&(naive - TimeDelta::days(1)))
                .earliest()
                .map(|o| o.fix())
                .unwrap_or(at.offset());
            let utc = naive - TimeDelta::seconds(i64::from(before.local_minus_utc()));
            tz.from_utc_datetime(&utc).fixed_offset()
        }
    }
}

// ── SystemClock ───────────────────────────────────────────────────────────────

/// Reads the host's UTC clock and converts into the configured timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build from an IANA timezone name (`"Europe/London"`, `"UTC"`, …).
    pub fn from_name(name: &str) -> Result<Self, ClockError> {
        parse_timezone(name).map(Self::new)
    }
}

impl LocalClock for SystemClock {
    fn timezone(&self) -> Tz {
        self.tz
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// Clock whose "now" only moves when told to.  Intended for tests.
#[derive(Debug)]
pub struct ManualClock {
    tz: Tz,
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        Self {
            tz,
            now: Mutex::new(now),
        }
    }

    /// Start at a local wall time in `tz`.  Returns `None` if that wall time
    /// does not exist; in a fold the earlier instant is used.
    pub fn at_local(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<Self> {
        let local = tz.from_local_datetime(&date.and_time(time)).earliest()?;
        Some(Self::new(tz, local.with_timezone(&Utc)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl LocalClock for ManualClock {
    fn timezone(&self) -> Tz {
        self.tz
    }

    fn now(&self) -> DateTime<FixedOffset> {
        let now = *self.now.lock().unwrap_or_else(PoisonError::into_inner);
        now.with_timezone(&self.tz).fixed_offset()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
