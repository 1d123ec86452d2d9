/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Media playback target.
//!
//! The controller only needs "play this file", "stop" and "is something
//! playing".  [`CommandPlayer`] satisfies that by running an external player
//! program with the episode path as its last argument.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    NotPlaying,
    Playing,
}

pub trait Player: Send + Sync {
    /// Start playing `path`, replacing whatever is playing now.
    fn play(&self, path: &Path) -> Result<()>;

    fn stop(&self);

    fn state(&self) -> PlayerState;
}

// ── CommandPlayer ─────────────────────────────────────────────────────────────

/// Plays episodes by spawning `program args… <path>`.
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: Mutex::new(None),
        }
    }

    fn child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn kill(child: &mut Child) {
        if let Err(e) = child.kill() {
            // Already exited; nothing to kill.
            debug!("player process kill: {e}");
        }
        if let Err(e) = child.wait() {
            warn!("failed to reap player process: {e}");
        }
    }
}

impl Player for CommandPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        let mut slot = self.child();
        if let Some(mut previous) = slot.take() {
            Self::kill(&mut previous);
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Cannot start player '{}'", self.program))?;

        info!(program = %self.program, pid = child.id(), path = %path.display(), "playback started");
        *slot = Some(child);
        Ok(())
    }

    fn stop(&self) {
        match self.child().take() {
            Some(mut child) => {
                Self::kill(&mut child);
                info!("playback stopped");
            }
            None => warn!("stop requested while nothing is playing"),
        }
    }

    fn state(&self) -> PlayerState {
        let mut slot = self.child();
        let Some(child) = slot.as_mut() else {
            return PlayerState::NotPlaying;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "player process finished");
                *slot = None;
                PlayerState::NotPlaying
            }
            Ok(None) => PlayerState::Playing,
            Err(e) => {
                warn!("cannot query player process: {e}");
                PlayerState::Playing
            }
        }
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        let slot = self.child.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut child) = slot.take() {
            Self::kill(&mut child);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn idle_player_is_not_playing() {
        let player = CommandPlayer::new("sleep", vec![]);
        assert_eq!(player.state(), PlayerState::NotPlaying);
        player.stop(); // harmless
    }

    #[test]
    fn play_then_stop() {
        // `sleep 30` stands in for a long episode
        let player = CommandPlayer::new("sleep", vec![]);
        player.play(Path::new("30")).unwrap();
        assert_eq!(player.state(), PlayerState::Playing);

        player.stop();
        assert_eq!(player.state(), PlayerState::NotPlaying);
    }

    #[test]
    fn finished_process_reports_not_playing() {
        let player = CommandPlayer::new("true", vec![]);
        player.play(Path::new("ignored")).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(player.state(), PlayerState::NotPlaying);
    }

    #[test]
    fn play_replaces_running_process() {
        let player = CommandPlayer::new("sleep", vec![]);
        player.play(Path::new("30")).unwrap();
        player.play(Path::new("30")).unwrap();
        assert_eq!(player.state(), PlayerState::Playing);
        player.stop();
    }

    #[test]
    fn missing_program_is_an_error() {
        let player = CommandPlayer::new("/nonexistent/daybreak-player", vec![]);
        assert!(player.play(Path::new("episode.mp3")).is_err());
        assert_eq!(player.state(), PlayerState::NotPlaying);
    }
}
