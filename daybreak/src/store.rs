/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Persisted alarm setting: one wall-clock time plus an enabled flag.
//!
//! The on-disk layout is a tiny YAML document:
//! ```yaml
//! time: "07:15:00"
//! enabled: true
//! ```
//!
//! The scheduler never touches this file.  The
//! [`AlarmController`](crate::controller::AlarmController) reads it once at
//! startup and rewrites it whenever the user changes the alarm.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The stored alarm setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlarm {
    pub time: NaiveTime,
    pub enabled: bool,
}

impl Default for StoredAlarm {
    /// 09:30, disabled: what a fresh device starts with.
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            enabled: false,
        }
    }
}

/// Read/write access to the persisted alarm setting.
pub trait AlarmStore: Send {
    /// Current setting.  A store with nothing saved yet saves and returns
    /// [`StoredAlarm::default`].
    fn get_alarm(&self) -> Result<StoredAlarm>;

    /// Replace the saved setting.
    fn replace_alarm(&self, time: NaiveTime, enabled: bool) -> Result<()>;
}

// ── FileAlarmStore ────────────────────────────────────────────────────────────

/// [`AlarmStore`] backed by a YAML file.
#[derive(Debug, Clone)]
pub struct FileAlarmStore {
    path: PathBuf,
}

impl FileAlarmStore {
    /// No I/O happens until the first read or write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlarmStore for FileAlarmStore {
    fn get_alarm(&self) -> Result<StoredAlarm> {
        if !self.path.exists() {
            info!(
                "No alarm store at {}, creating it with the default alarm",
                self.path.display()
            );
            let default = StoredAlarm::default();
            self.replace_alarm(default.time, default.enabled)?;
            return Ok(default);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read alarm store: {}", self.path.display()))?;
        let stored: StoredAlarm = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse alarm store: {}", self.path.display()))?;

        debug!(time = %stored.time, enabled = stored.enabled, "alarm store read");
        Ok(stored)
    }

    fn replace_alarm(&self, time: NaiveTime, enabled: bool) -> Result<()> {
        let content = serde_yaml::to_string(&StoredAlarm { time, enabled })
            .context("Failed to serialise alarm setting")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory: {}", parent.display()))?;
        }

        // Write-then-rename: readers never see a partial file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Cannot write alarm store: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Cannot replace alarm store: {}", self.path.display()))?;

        info!(%time, enabled, path = %self.path.display(), "alarm setting saved");
        Ok(())
    }
}

// ── MemoryAlarmStore ──────────────────────────────────────────────────────────

/// In-memory [`AlarmStore`], for tests and for running without a data
/// directory.
#[derive(Debug, Default)]
pub struct MemoryAlarmStore {
    alarm: Mutex<Option<StoredAlarm>>,
}

impl MemoryAlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alarm(alarm: StoredAlarm) -> Self {
        Self {
            alarm: Mutex::new(Some(alarm)),
        }
    }
}

impl AlarmStore for MemoryAlarmStore {
    fn get_alarm(&self) -> Result<StoredAlarm> {
        let mut alarm = self.alarm.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(*alarm.get_or_insert_with(StoredAlarm::default))
    }

    fn replace_alarm(&self, time: NaiveTime, enabled: bool) -> Result<()> {
        *self.alarm.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(StoredAlarm { time, enabled });
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
