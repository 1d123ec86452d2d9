/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the alarm scheduler.
//!
//! Both variants are recoverable caller-side conditions.  Time collisions
//! are deliberately absent: the index resolves them by nudging.

use thiserror::Error;

use crate::alarm::AlarmId;

/// Error returned by [`AlarmScheduler`](super::AlarmScheduler) lookups.
///
/// | Variant | Meaning for the caller |
/// |---|---|
/// | `NoAlarms` | nothing registered, treat as "disarmed" |
/// | `NotFound` | stale id (already removed, or never issued) |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Next-alarm selection was asked for while the table is empty.
    #[error("no alarms registered")]
    NoAlarms,

    /// The id is not (or no longer) registered.
    #[error("{0} is not registered")]
    NotFound(AlarmId),
}
