//! Authoritative id → alarm map.
//!
//! `BTreeMap` (not `HashMap`) so iteration is always in id order, which keeps
//! log output and test expectations deterministic.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::alarm::{Alarm, AlarmId, Callback, TimeOfDay};

#[derive(Debug, Default)]
pub struct AlarmTable {
    alarms: BTreeMap<AlarmId, Alarm>,
}

impl AlarmTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn contains(&self, id: AlarmId) -> bool {
        self.alarms.contains_key(&id)
    }

    /// Insert or replace the alarm stored under `alarm.id`.
    pub fn insert(&mut self, alarm: Alarm) -> Option<Alarm> {
        self.alarms.insert(alarm.id, alarm)
    }

    pub fn remove(&mut self, id: AlarmId) -> Option<Alarm> {
        self.alarms.remove(&id)
    }

    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.get(&id)
    }

    /// Reverse lookup: the index key an alarm lives under.
    pub fn time_of(&self, id: AlarmId) -> Option<TimeOfDay> {
        self.alarms.get(&id).map(|a| a.time_of_day)
    }

    /// Record that `id` fired on `date` and hand back a clone of its callback.
    pub fn mark_fired(&mut self, id: AlarmId, date: NaiveDate) -> Option<Callback> {
        let alarm = self.alarms.get_mut(&id)?;
        alarm.last_trigger_date = Some(date);
        Some(alarm.callback.clone())
    }

    pub fn ids(&self) -> Vec<AlarmId> {
        self.alarms.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::callback;
    use chrono::NaiveTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn alarm(n: u64, h: u32) -> Alarm {
        Alarm::new(
            AlarmId::new(n),
            TimeOfDay::utc(NaiveTime::from_hms_opt(h, 0, 0).unwrap()),
            callback(|| {}),
        )
    }

    #[test]
    fn insert_get_remove() {
        let mut table = AlarmTable::new();
        assert!(table.insert(alarm(1, 8)).is_none());
        assert!(table.contains(AlarmId::new(1)));
        assert_eq!(
            table.time_of(AlarmId::new(1)).map(|t| t.time()),
            NaiveTime::from_hms_opt(8, 0, 0)
        );

        let removed = table.remove(AlarmId::new(1)).unwrap();
        assert_eq!(removed.id, AlarmId::new(1));
        assert!(table.is_empty());
        assert!(table.remove(AlarmId::new(1)).is_none());
    }

    #[test]
    fn ids_are_sorted() {
        let mut table = AlarmTable::new();
        table.insert(alarm(3, 8));
        table.insert(alarm(1, 9));
        table.insert(alarm(2, 10));
        assert_eq!(
            table.ids(),
            vec![AlarmId::new(1), AlarmId::new(2), AlarmId::new(3)]
        );
    }

    #[test]
    fn mark_fired_sets_date_and_returns_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut table = AlarmTable::new();
        table.insert(Alarm::new(
            AlarmId::new(1),
            TimeOfDay::utc(NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let cb = table.mark_fired(AlarmId::new(1), today).unwrap();
        cb();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(table.get(AlarmId::new(1)).unwrap().fired_on(today));
    }

    #[test]
    fn mark_fired_unknown_id_is_none() {
        let mut table = AlarmTable::new();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(table.mark_fired(AlarmId::new(42), today).is_none());
    }
}
