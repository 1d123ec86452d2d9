/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Wake-up alarm built on the [`AlarmScheduler`].
//!
//! The controller keeps two daily alarms in step with the stored setting:
//!
//! | Role | Fires at | Does |
//! |---|---|---|
//! | preload | alarm time − preload lead | [`EpisodeSource::preload`] |
//! | play | alarm time | stop whatever plays, play the latest episode |
//!
//! Both are registered even while the alarm is disabled; the play callback
//! checks the enabled flag when it fires.

pub mod episodes;
pub mod player;

pub use episodes::{DirectoryEpisodes, EpisodeSource};
pub use player::{CommandPlayer, Player, PlayerState};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveTime, TimeDelta};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::alarm::{callback, AlarmId, TimeOfDay};
use crate::scheduler::{AlarmScheduler, SchedulerError};
use crate::store::AlarmStore;

/// Which of the controller's two alarms an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmRole {
    Play,
    Preload,
}

impl fmt::Display for AlarmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmRole::Play => f.write_str("play"),
            AlarmRole::Preload => f.write_str("preload"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The scheduler no longer knows one of the controller's alarms.
    #[error("{role} alarm is not registered with the scheduler")]
    AlarmMissing { role: AlarmRole },

    #[error("alarm store failed: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

// ── Playback ──────────────────────────────────────────────────────────────────

/// The part of the controller the alarm callbacks need.  Shared with the
/// scheduler through `Arc`, so callbacks never borrow the controller itself.
struct Playback {
    episodes: Arc<dyn EpisodeSource>,
    player: Arc<dyn Player>,
    enabled: AtomicBool,
}

impl Playback {
    fn play_episode(&self) {
        if !self.enabled.load(Ordering::SeqCst) {
            debug!("alarm disabled, not playing");
            return;
        }

        if self.player.state() != PlayerState::NotPlaying {
            self.player.stop();
        }

        match self.episodes.latest_episode() {
            Some(path) => {
                if let Err(e) = self.player.play(&path) {
                    error!(episode = %path.display(), "playback failed: {e:#}");
                }
            }
            None => warn!("alarm fired but no episode is available"),
        }
    }

    fn download_episode(&self) {
        if let Err(e) = self.episodes.preload() {
            warn!("episode preload failed: {e:#}");
        }
    }
}

// ── AlarmController ───────────────────────────────────────────────────────────

pub struct AlarmController {
    scheduler: AlarmScheduler,
    store: Box<dyn AlarmStore>,
    playback: Arc<Playback>,
    preload_lead: TimeDelta,
    play_alarm: AlarmId,
    preload_alarm: AlarmId,
}

impl AlarmController {
    /// Read the stored setting, register the play and preload alarms, and
    /// preload once so an episode is ready even before the first preload
    /// alarm.
    pub fn new(
        scheduler: AlarmScheduler,
        episodes: Arc<dyn EpisodeSource>,
        player: Arc<dyn Player>,
        store: Box<dyn AlarmStore>,
        preload_lead: TimeDelta,
    ) -> Result<Self, ControllerError> {
        let stored = store.get_alarm().map_err(ControllerError::Store)?;
        let playback = Arc::new(Playback {
            episodes,
            player,
            enabled: AtomicBool::new(stored.enabled),
        });

        let (preload_alarm, play_alarm) =
            register(&scheduler, &playback, stored.time, preload_lead);
        info!(
            play = %play_alarm,
            preload = %preload_alarm,
            time = %stored.time,
            enabled = stored.enabled,
            "alarm controller created"
        );

        playback.download_episode();

        Ok(Self {
            scheduler,
            store,
            playback,
            preload_lead,
            play_alarm,
            preload_alarm,
        })
    }

    /// Move the alarm to `new_time` and set whether it plays.
    ///
    /// The new setting is persisted before the scheduler is touched.  On any
    /// error the controller keeps its previous alarms and enabled flag.
    ///
    /// Fails with [`ControllerError::AlarmMissing`] if either alarm was
    /// removed behind the controller's back; nothing is persisted then.
    pub fn change_alarm_time(
        &mut self,
        new_time: NaiveTime,
        enabled: bool,
    ) -> Result<(), ControllerError> {
        for (id, role) in [
            (self.play_alarm, AlarmRole::Play),
            (self.preload_alarm, AlarmRole::Preload),
        ] {
            if self.scheduler.get_alarm_time(id).is_err() {
                return Err(ControllerError::AlarmMissing { role });
            }
        }

        self.store
            .replace_alarm(new_time, enabled)
            .map_err(ControllerError::Store)?;
        self.playback.enabled.store(enabled, Ordering::SeqCst);

        for id in [self.play_alarm, self.preload_alarm] {
            if !self.scheduler.remove_alarm(id) {
                warn!(alarm = %id, "alarm vanished while being replaced");
            }
        }
        let (preload_alarm, play_alarm) =
            register(&self.scheduler, &self.playback, new_time, self.preload_lead);
        self.preload_alarm = preload_alarm;
        self.play_alarm = play_alarm;

        info!(time = %new_time, enabled, play = %play_alarm, "alarm changed");
        Ok(())
    }

    /// Registered play time and whether the alarm is enabled.
    pub fn next_alarm_time(&self) -> Result<(TimeOfDay, bool), ControllerError> {
        let time = self.scheduler.get_alarm_time(self.play_alarm)?;
        Ok((time, self.playback.enabled.load(Ordering::SeqCst)))
    }

    /// Play the latest episode now, as the play alarm would.
    pub fn play_episode(&self) {
        self.playback.play_episode();
    }

    /// Preload now, as the preload alarm would.
    pub fn download_episode(&self) {
        self.playback.download_episode();
    }

    pub fn player(&self) -> &dyn Player {
        self.playback.player.as_ref()
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    pub fn play_alarm(&self) -> AlarmId {
        self.play_alarm
    }

    pub fn preload_alarm(&self) -> AlarmId {
        self.preload_alarm
    }
}

/// Register preload then play for `time`.  Returns `(preload, play)`.
fn register(
    scheduler: &AlarmScheduler,
    playback: &Arc<Playback>,
    time: NaiveTime,
    lead: TimeDelta,
) -> (AlarmId, AlarmId) {
    let play_at = scheduler.clock().annotate(time);
    let preload_at = play_at.shifted(-lead);

    let preload = {
        let playback = Arc::clone(playback);
        scheduler.add_alarm(preload_at, callback(move || playback.download_episode()))
    };
    let play = {
        let playback = Arc::clone(playback);
        scheduler.add_alarm(play_at, callback(move || playback.play_episode()))
    };
    (preload, play)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
