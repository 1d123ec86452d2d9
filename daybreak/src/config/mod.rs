//! Daybreak configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! timezone: "Europe/London"
//! store_path: "/var/lib/daybreak/alarm.yaml"
//! preload_lead_secs: 60
//! episodes:
//!   directory: "/var/lib/daybreak/episodes"
//!   extensions: ["mp3", "m4a"]
//! player:
//!   program: "mpv"
//!   args: ["--no-video"]
//! ```
//!
//! Every key is optional; missing values take the defaults of
//! [`DaybreakConfig::default`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::parse_timezone;

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    timezone: Option<String>,
    store_path: Option<PathBuf>,
    preload_lead_secs: Option<u32>,
    #[serde(default)]
    episodes: EpisodesEntry,
    #[serde(default)]
    player: PlayerEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EpisodesEntry {
    directory: Option<PathBuf>,
    extensions: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlayerEntry {
    program: Option<String>,
    args: Option<Vec<String>>,
}

// ── Public data structures ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodesConfig {
    pub directory: PathBuf,
    /// File extensions treated as episodes, without the dot.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub program: String,
    /// Passed before the episode path.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaybreakConfig {
    pub timezone: Tz,
    pub store_path: PathBuf,
    /// How long before the play alarm the preload alarm fires.
    pub preload_lead_secs: u32,
    pub episodes: EpisodesConfig,
    pub player: PlayerConfig,
}

impl Default for DaybreakConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            store_path: PathBuf::from("daybreak-alarm.yaml"),
            preload_lead_secs: 60,
            episodes: EpisodesConfig {
                directory: PathBuf::from("episodes"),
                extensions: vec!["mp3".into(), "m4a".into(), "ogg".into()],
            },
            player: PlayerConfig {
                program: "mpv".into(),
                args: vec!["--no-video".into()],
            },
        }
    }
}

impl DaybreakConfig {
    pub fn preload_lead(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.preload_lead_secs))
    }
}

// ── ConfigManager ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ConfigManager {
    config: DaybreakConfig,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path`, replacing whatever was loaded before.  On error the
    /// defaults are restored.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is invalid, or
    /// the timezone is not a known IANA name.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading configuration from: {}", path.display());

        self.config = DaybreakConfig::default();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        // An empty document is a valid "all defaults" file
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let defaults = DaybreakConfig::default();
        let timezone = match file.timezone {
            Some(name) => parse_timezone(&name)
                .with_context(|| format!("Invalid timezone in {}", path.display()))?,
            None => defaults.timezone,
        };

        self.config = DaybreakConfig {
            timezone,
            store_path: file.store_path.unwrap_or(defaults.store_path),
            preload_lead_secs: file
                .preload_lead_secs
                .unwrap_or(defaults.preload_lead_secs),
            episodes: EpisodesConfig {
                directory: file.episodes.directory.unwrap_or(defaults.episodes.directory),
                extensions: file
                    .episodes
                    .extensions
                    .unwrap_or(defaults.episodes.extensions),
            },
            player: PlayerConfig {
                program: file.player.program.unwrap_or(defaults.player.program),
                args: file.player.args.unwrap_or(defaults.player.args),
            },
        };
        self.loaded = true;

        let c = &self.config;
        debug!("  Episodes: {} {:?}", c.episodes.directory.display(), c.episodes.extensions);
        debug!("  Player: {} {:?}", c.player.program, c.player.args);
        info!(
            timezone = %c.timezone,
            store = %c.store_path.display(),
            preload_lead_secs = c.preload_lead_secs,
            "Configuration loaded"
        );

        Ok(())
    }

    pub fn config(&self) -> &DaybreakConfig {
        &self.config
    }

    /// Override the timezone (e.g. from the command line).
    pub fn set_timezone(&mut self, timezone: Tz) {
        self.config.timezone = timezone;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
