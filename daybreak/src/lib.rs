/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Daybreak – daily podcast alarm
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── alarm        – alarm ids, time-of-day values, callbacks
//! ├── clock        – timezone-aware wall clock (system and manual)
//! ├── scheduler/   – recurring alarm scheduler with one armed timer
//! ├── store        – persisted alarm setting (YAML)
//! ├── controller/  – play/preload alarms, player, episode source
//! └── config/      – YAML daemon configuration
//! ```

pub mod alarm;
pub mod clock;
pub mod config;
pub mod controller;
pub mod scheduler;
pub mod store;
