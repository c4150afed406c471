//! Game settings and preferences
//!
//! Persisted separately from profiles as a small JSON file. Everything here
//! is a menu choice; `session_config` turns it into the immutable
//! configuration a session starts from.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::sim::{
    Arena, Difficulty, GameMode, OperationConfig, RelentlessLevel, SessionConfig, SpawnPolicy,
};

/// Menu presets for the time and asteroids modes
pub const TIME_LIMITS_SECS: [u64; 3] = [60, 120, 180];
pub const ASTEROID_TARGETS: [u32; 3] = [20, 50, 100];

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Session ===
    pub difficulty: Difficulty,
    pub operation: OperationConfig,
    pub mode: GameMode,
    /// Destroyed asteroids split into two fragments
    pub split_mode: bool,
    /// Uncapped timed spawning at the given level
    pub relentless: Option<RelentlessLevel>,

    // === Profile ===
    /// Profile selected at launch
    pub active_profile: Option<String>,

    // === Display ===
    /// Play area size in pixels
    pub arena: Arena,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            operation: OperationConfig::default(),
            mode: GameMode::Infinite,
            split_mode: false,
            relentless: None,

            active_profile: None,

            arena: Arena::default(),
        }
    }
}

impl Settings {
    /// Time mode with a countdown of `secs`
    pub fn time_mode(secs: u64) -> GameMode {
        GameMode::Time {
            limit_ms: secs * 1_000,
        }
    }

    pub fn spawn_policy(&self) -> SpawnPolicy {
        self.relentless
            .map(SpawnPolicy::Relentless)
            .unwrap_or(SpawnPolicy::Normal)
    }

    /// Session configuration for these settings
    pub fn session_config(&self, seed: u64) -> SessionConfig {
        SessionConfig {
            operation: self.operation.clone(),
            difficulty: self.difficulty,
            mode: self.mode,
            split_mode: self.split_mode,
            spawn_policy: self.spawn_policy(),
            arena: self.arena,
            seed,
            ..SessionConfig::default()
        }
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                let settings = serde_json::from_str(&json).map_err(|source| StoreError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Save settings to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(StoreError::Serialize)?;
        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved");
        Ok(())
    }
}
