/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Ordered time-of-day index.
//!
//! Keys are points on a 24-hour clock face, not instants.  Lookups treat the
//! key space as circular: the successor of the last alarm of the day is the
//! first alarm of the day.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use chrono::NaiveTime;
use tracing::debug;

use crate::alarm::{nudge_time, AlarmId};

// ── Error type ────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum IndexError {
    /// The index has no entries.
    Empty,

    /// No entry exists at exactly this key.
    NotFound(NaiveTime),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::Empty => write!(f, "time index is empty"),
            IndexError::NotFound(t) => write!(f, "no alarm indexed at {t}"),
        }
    }
}

impl std::error::Error for IndexError {}

// ── IndexEntry ────────────────────────────────────────────────────────────────

/// One step of a circular walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub time: NaiveTime,
    pub id: AlarmId,

    /// `true` once the walk has gone past the last key of the day and started
    /// again from the first, i.e. the entry belongs to tomorrow.
    pub wrapped: bool,
}

// ── TimeIndex ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TimeIndex {
    entries: BTreeMap<NaiveTime, AlarmId>,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.entries.contains_key(&time)
    }

    /// Insert `id` at `time`, nudging forward one nanosecond at a time until a
    /// free key is found.  Returns the key actually used.
    pub fn insert(&mut self, time: NaiveTime, id: AlarmId) -> NaiveTime {
        let mut key = time;
        while self.entries.contains_key(&key) {
            key = nudge_time(key);
        }
        if key != time {
            debug!(alarm = %id, requested = %time, used = %key, "time collision, nudged");
        }
        self.entries.insert(key, id);
        key
    }

    /// Remove the entry at exactly `time`.
    pub fn remove(&mut self, time: NaiveTime) -> Result<AlarmId, IndexError> {
        self.entries.remove(&time).ok_or(IndexError::NotFound(time))
    }

    /// Smallest key strictly after `at`, wrapping to the smallest key overall.
    pub fn successor_circular(&self, at: NaiveTime) -> Result<(NaiveTime, AlarmId), IndexError> {
        self.circular_from(at)
            .next()
            .map(|e| (e.time, e.id))
            .ok_or(IndexError::Empty)
    }

    /// Every entry exactly once, in clock order, starting with the strict
    /// successor of `at`.
    pub fn circular_from(&self, at: NaiveTime) -> impl Iterator<Item = IndexEntry> + '_ {
        let today = self
            .entries
            .range((Excluded(at), Unbounded))
            .map(|(&time, &id)| IndexEntry {
                time,
                id,
                wrapped: false,
            });
        let tomorrow = self.entries.range(..=at).map(|(&time, &id)| IndexEntry {
            time,
            id,
            wrapped: true,
        });
        today.chain(tomorrow)
    }

    /// All entries in clock order, starting from midnight.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveTime, AlarmId)> + '_ {
        self.entries.iter().map(|(&t, &id)| (t, id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn id(n: u64) -> AlarmId {
        AlarmId::new(n)
    }

    /// 08:00 → #1, 12:00 → #2, 20:00 → #3
    fn three_alarms() -> TimeIndex {
        let mut idx = TimeIndex::new();
        idx.insert(hms(8, 0, 0), id(1));
        idx.insert(hms(12, 0, 0), id(2));
        idx.insert(hms(20, 0, 0), id(3));
        idx
    }

    // ── insert ────────────────────────────────────────────────────────────────

    #[test]
    fn insert_free_key_is_used_as_is() {
        let mut idx = TimeIndex::new();
        assert_eq!(idx.insert(hms(7, 0, 0), id(1)), hms(7, 0, 0));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn insert_collision_nudges_by_one_nanosecond() {
        let mut idx = TimeIndex::new();
        let first = idx.insert(hms(7, 0, 0), id(1));
        let second = idx.insert(hms(7, 0, 0), id(2));
        let third = idx.insert(hms(7, 0, 0), id(3));

        assert_eq!(first, hms(7, 0, 0));
        assert_eq!(second, NaiveTime::from_hms_nano_opt(7, 0, 0, 1).unwrap());
        assert_eq!(third, NaiveTime::from_hms_nano_opt(7, 0, 0, 2).unwrap());
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn insert_collision_at_end_of_day_wraps_to_midnight() {
        let last = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap();
        let mut idx = TimeIndex::new();
        idx.insert(last, id(1));
        assert_eq!(idx.insert(last, id(2)), NaiveTime::MIN);
    }

    // ── remove ────────────────────────────────────────────────────────────────

    #[test]
    fn remove_exact_key() {
        let mut idx = three_alarms();
        assert_eq!(idx.remove(hms(12, 0, 0)), Ok(id(2)));
        assert!(!idx.contains(hms(12, 0, 0)));
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn remove_missing_key_is_not_found() {
        let mut idx = three_alarms();
        assert_eq!(
            idx.remove(hms(12, 0, 1)),
            Err(IndexError::NotFound(hms(12, 0, 1)))
        );
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn nudged_entries_are_independently_removable() {
        let mut idx = TimeIndex::new();
        let a = idx.insert(hms(7, 0, 0), id(1));
        let b = idx.insert(hms(7, 0, 0), id(2));

        assert_eq!(idx.remove(b), Ok(id(2)));
        assert!(idx.contains(a));
        assert_eq!(idx.remove(a), Ok(id(1)));
        assert!(idx.is_empty());
    }

    // ── successor_circular ────────────────────────────────────────────────────

    #[test]
    fn successor_before_first_alarm() {
        assert_eq!(
            three_alarms().successor_circular(hms(7, 0, 0)),
            Ok((hms(8, 0, 0), id(1)))
        );
    }

    #[test]
    fn successor_wraps_after_last_alarm() {
        assert_eq!(
            three_alarms().successor_circular(hms(21, 0, 0)),
            Ok((hms(8, 0, 0), id(1)))
        );
    }

    #[test]
    fn successor_is_strict() {
        let idx = three_alarms();
        assert_eq!(idx.successor_circular(hms(12, 0, 0)), Ok((hms(20, 0, 0), id(3))));

        let just_after = NaiveTime::from_hms_micro_opt(12, 0, 0, 1).unwrap();
        assert_eq!(idx.successor_circular(just_after), Ok((hms(20, 0, 0), id(3))));
    }

    #[test]
    fn successor_on_empty_index_fails() {
        assert_eq!(
            TimeIndex::new().successor_circular(hms(12, 0, 0)),
            Err(IndexError::Empty)
        );
    }

    #[test]
    fn successor_of_single_entry_is_itself() {
        let mut idx = TimeIndex::new();
        idx.insert(hms(6, 0, 0), id(9));
        assert_eq!(idx.successor_circular(hms(6, 0, 0)), Ok((hms(6, 0, 0), id(9))));
        assert_eq!(idx.successor_circular(hms(5, 0, 0)), Ok((hms(6, 0, 0), id(9))));
    }

    // ── circular_from ─────────────────────────────────────────────────────────

    #[test]
    fn circular_walk_visits_everything_once_in_order() {
        let walk: Vec<_> = three_alarms().circular_from(hms(12, 0, 0)).collect();
        let ids: Vec<_> = walk.iter().map(|e| e.id).collect();
        let wrapped: Vec<_> = walk.iter().map(|e| e.wrapped).collect();

        assert_eq!(ids, vec![id(3), id(1), id(2)]);
        assert_eq!(wrapped, vec![false, true, true]);
    }

    #[test]
    fn circular_walk_after_last_alarm_is_all_wrapped() {
        let walk: Vec<_> = three_alarms().circular_from(hms(23, 0, 0)).collect();
        assert_eq!(walk.len(), 3);
        assert!(walk.iter().all(|e| e.wrapped));
    }

    #[test]
    fn iter_is_in_clock_order() {
        let mut idx = TimeIndex::new();
        idx.insert(hms(20, 0, 0), id(1));
        idx.insert(hms(6, 0, 0), id(2));
        let times: Vec<_> = idx.iter().map(|(t, _)| t).collect();
        assert_eq!(times, vec![hms(6, 0, 0), hms(20, 0, 0)]);
    }
}
