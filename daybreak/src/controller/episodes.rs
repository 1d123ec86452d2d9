/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Where the episode to play comes from.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub trait EpisodeSource: Send + Sync {
    /// Make the latest episode available locally.  Called ahead of the play
    /// alarm so playback does not wait on it.
    fn preload(&self) -> Result<()>;

    /// The episode to play, if one is available.
    fn latest_episode(&self) -> Option<PathBuf>;
}

// ── DirectoryEpisodes ─────────────────────────────────────────────────────────

/// Episodes dropped into a local directory by some other process.  The newest
/// file (by modification time) with a matching extension is "latest".
#[derive(Debug)]
pub struct DirectoryEpisodes {
    directory: PathBuf,
    extensions: Vec<String>,
    latest: Mutex<Option<PathBuf>>,
}

impl DirectoryEpisodes {
    pub fn new(directory: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            directory: directory.into(),
            extensions,
            latest: Mutex::new(None),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn cached(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_episode(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .map_or(false, |e| self.extensions.iter().any(|x| *x == e))
    }

    /// Newest matching file in the directory, or `None` if there is none.
    pub fn scan(&self) -> Result<Option<PathBuf>> {
        let entries = std::fs::read_dir(&self.directory).with_context(|| {
            format!("Cannot read episode directory: {}", self.directory.display())
        })?;

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("Cannot list episode directory: {}", self.directory.display())
            })?;
            let path = entry.path();
            if !self.is_episode(&path) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), "skipping unreadable episode: {e}");
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }

        Ok(newest.map(|(_, path)| path))
    }
}

impl EpisodeSource for DirectoryEpisodes {
    fn preload(&self) -> Result<()> {
        let found = self.scan()?;
        match &found {
            Some(path) => info!(episode = %path.display(), "latest episode ready"),
            None => warn!(directory = %self.directory.display(), "no episodes found"),
        }
        *self.cached() = found;
        Ok(())
    }

    fn latest_episode(&self) -> Option<PathBuf> {
        if let Some(path) = self.cached().clone().filter(|p| p.exists()) {
            return Some(path);
        }

        // Nothing preloaded (or it vanished): look once more
        debug!("no cached episode, rescanning");
        match self.scan() {
            Ok(found) => {
                *self.cached() = found.clone();
                found
            }
            Err(e) => {
                warn!("episode rescan failed: {e:#}");
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["mp3".into(), ".M4A".into()]
    }

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    #[test]
    fn newest_matching_file_wins() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "old.mp3", 3_600);
        let newest = touch(dir.path(), "new.m4a", 60);
        touch(dir.path(), "newer-but-not-media.txt", 0);

        let episodes = DirectoryEpisodes::new(dir.path(), exts());
        assert_eq!(episodes.scan().unwrap(), Some(newest));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "SHOW.MP3", 0);
        let episodes = DirectoryEpisodes::new(dir.path(), exts());
        assert_eq!(episodes.scan().unwrap(), Some(path));
    }

    #[test]
    fn empty_directory_has_no_episode() {
        let dir = TempDir::new().unwrap();
        let episodes = DirectoryEpisodes::new(dir.path(), exts());
        episodes.preload().unwrap();
        assert_eq!(episodes.latest_episode(), None);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let episodes = DirectoryEpisodes::new(dir.path().join("absent"), exts());
        assert!(episodes.preload().is_err());
        assert_eq!(episodes.latest_episode(), None);
    }

    #[test]
    fn preload_caches_and_latest_rescans_when_file_vanishes() {
        let dir = TempDir::new().unwrap();
        let older = touch(dir.path(), "a.mp3", 600);
        let newer = touch(dir.path(), "b.mp3", 10);

        let episodes = DirectoryEpisodes::new(dir.path(), exts());
        episodes.preload().unwrap();
        assert_eq!(episodes.latest_episode(), Some(newer.clone()));

        std::fs::remove_file(&newer).unwrap();
        assert_eq!(episodes.latest_episode(), Some(older));
    }

    #[test]
    fn latest_without_preload_scans() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "only.mp3", 0);
        let episodes = DirectoryEpisodes::new(dir.path(), exts());
        assert_eq!(episodes.latest_episode(), Some(path));
    }
}
