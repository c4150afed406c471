//! JSON-file backed profile store
//!
//! One versioned document holds every profile, the active selection and the
//! shared leaderboard. Writes go to a sibling `.tmp` file which is then
//! renamed over the store so a crash never leaves a half-written document.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnswerRecord, GameSummary, ProfileService, apply_game};
use crate::error::{StoreError, StoreResult};
use crate::highscores::{
    DEFAULT_COLOR, GUEST_AVATAR, GUEST_NAME, Leaderboard, LeaderboardEntry,
};
use crate::platform::unix_millis;
use crate::stats::{AggregatedStats, WeakArea};

/// Current document version
pub const STORE_VERSION: u32 = 1;

/// Predefined avatars: (id, emoji, name)
pub const AVATARS: [(&str, &str, &str); 8] = [
    ("astronaut", "🧑‍🚀", "Astronaut"),
    ("robot", "🤖", "Robot"),
    ("alien", "👽", "Alien"),
    ("rocket", "🚀", "Rocket"),
    ("star", "⭐", "Star"),
    ("planet", "🪐", "Planet"),
    ("moon", "🌙", "Moon"),
    ("sun", "☀️", "Sun"),
];

/// Predefined accent colours: (id, hex, name)
pub const COLORS: [(&str, &str, &str); 8] = [
    ("cyan", "#4fc3f7", "Cyan"),
    ("violet", "#7c4dff", "Violet"),
    ("red", "#ff5252", "Red"),
    ("green", "#69f0ae", "Green"),
    ("yellow", "#ffd740", "Yellow"),
    ("pink", "#ff4081", "Pink"),
    ("lime", "#b2ff59", "Lime"),
    ("blue", "#448aff", "Blue"),
];

/// Profile picture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Avatar {
    /// One of `AVATARS`, by id
    Predefined(String),
    /// Uploaded image (data URL)
    Custom(String),
}

impl Default for Avatar {
    fn default() -> Self {
        Avatar::Predefined(AVATARS[0].0.to_string())
    }
}

impl Avatar {
    /// Emoji shown on the leaderboard
    pub fn emoji(&self) -> &'static str {
        match self {
            Avatar::Predefined(id) => AVATARS
                .iter()
                .find(|(avatar_id, _, _)| avatar_id == id)
                .map(|(_, emoji, _)| *emoji)
                .unwrap_or(GUEST_AVATAR),
            Avatar::Custom(_) => "🖼️",
        }
    }
}

/// Lifetime numbers, updated once per finished game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub high_score: u64,
    pub total_games_played: u32,
    pub best_combo: u32,
    pub total_asteroids_destroyed: u64,
}

impl LifetimeStats {
    pub fn record_game(&mut self, summary: &GameSummary) {
        self.total_games_played += 1;
        self.total_asteroids_destroyed += summary.asteroids_destroyed as u64;
        self.high_score = self.high_score.max(summary.score);
        self.best_combo = self.best_combo.max(summary.max_combo);
    }
}

/// A player profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Avatar,
    pub accent_color: String,
    pub created_at: u64,
    #[serde(default)]
    pub lifetime: LifetimeStats,
    #[serde(default)]
    pub answers: AggregatedStats,
}

impl Profile {
    pub fn new(id: String, draft: ProfileDraft, created_at: u64) -> Self {
        let mut profile = Self {
            id,
            name: "Player".to_string(),
            avatar: Avatar::default(),
            accent_color: DEFAULT_COLOR.to_string(),
            created_at,
            lifetime: LifetimeStats::default(),
            answers: AggregatedStats::default(),
        };
        profile.apply(draft);
        profile
    }

    fn apply(&mut self, draft: ProfileDraft) {
        if let Some(name) = draft.name {
            self.name = name;
        }
        if let Some(avatar) = draft.avatar {
            self.avatar = avatar;
        }
        if let Some(color) = draft.accent_color {
            self.accent_color = color;
        }
    }
}

/// Fields to set on create or update; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub name: Option<String>,
    pub avatar: Option<Avatar>,
    pub accent_color: Option<String>,
}

impl ProfileDraft {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// Profile page numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetailedStats {
    pub lifetime: LifetimeStats,
    /// Mean score over the profile's leaderboard entries
    pub average_score: u64,
    pub leaderboard_entries: usize,
    pub average_asteroids_per_game: u64,
}

impl LeaderboardEntry {
    /// Entry for a finished game, attributed to `profile` or to a guest
    pub fn for_game(profile: Option<&Profile>, summary: &GameSummary, id: String, date: u64) -> Self {
        let (player_id, player_name, player_avatar, player_color) = match profile {
            Some(p) => (
                Some(p.id.clone()),
                p.name.clone(),
                p.avatar.emoji().to_string(),
                p.accent_color.clone(),
            ),
            None => (
                None,
                GUEST_NAME.to_string(),
                GUEST_AVATAR.to_string(),
                DEFAULT_COLOR.to_string(),
            ),
        };
        Self {
            id,
            player_id,
            player_name,
            player_avatar,
            player_color,
            score: summary.score,
            mode: summary.mode.as_str().to_string(),
            difficulty: summary.difficulty,
            date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct StoreDocument {
    version: u32,
    profiles: Vec<Profile>,
    active_profile: Option<String>,
    leaderboard: Leaderboard,
}

/// Profiles and leaderboard persisted as a single JSON file
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl ProfileStore {
    /// Load the store at `path`. A missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path) {
            Ok(json) => {
                let doc: StoreDocument =
                    serde_json::from_str(&json).map_err(|source| StoreError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                log::info!(
                    "Loaded {} profiles and {} leaderboard entries from {}",
                    doc.profiles.len(),
                    doc.leaderboard.entries.len(),
                    path.display()
                );
                doc
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No profile store at {}, starting fresh", path.display());
                StoreDocument {
                    version: STORE_VERSION,
                    ..StoreDocument::default()
                }
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store to disk
    pub fn save(&self) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let doc = StoreDocument {
            version: STORE_VERSION,
            ..self.doc.clone()
        };
        let json = serde_json::to_string_pretty(&doc).map_err(StoreError::Serialize)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        log::debug!("Profile store saved to {}", self.path.display());
        Ok(())
    }

    /// Save, logging instead of failing
    fn persist(&self) {
        if let Err(err) = self.save() {
            log::warn!("Profile store not saved: {}", err);
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.doc.profiles
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.doc.profiles.iter().find(|p| p.id == id)
    }

    fn profile_mut(&mut self, id: &str) -> StoreResult<&mut Profile> {
        self.doc
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::UnknownProfile(id.to_string()))
    }

    pub fn create_profile(&mut self, draft: ProfileDraft) -> StoreResult<Profile> {
        let id = Uuid::new_v4().to_string();
        let profile = Profile::new(id, draft, unix_millis());
        log::info!("Created profile '{}' ({})", profile.name, profile.id);
        self.doc.profiles.push(profile.clone());
        self.save()?;
        Ok(profile)
    }

    /// Update a profile; its leaderboard entries pick up the new name,
    /// avatar and colour
    pub fn update_profile(&mut self, id: &str, draft: ProfileDraft) -> StoreResult<Profile> {
        let profile = self.profile_mut(id)?;
        profile.apply(draft);
        let profile = profile.clone();
        self.doc.leaderboard.rename_player(
            &profile.id,
            &profile.name,
            profile.avatar.emoji(),
            &profile.accent_color,
        );
        self.save()?;
        Ok(profile)
    }

    /// Delete a profile. Its leaderboard entries stay.
    pub fn delete_profile(&mut self, id: &str) -> StoreResult<()> {
        let index = self
            .doc
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::UnknownProfile(id.to_string()))?;
        let removed = self.doc.profiles.remove(index);
        if self.doc.active_profile.as_deref() == Some(id) {
            self.doc.active_profile = None;
        }
        log::info!("Deleted profile '{}'", removed.name);
        self.save()
    }

    /// Select the active profile, or `None` to play as a guest
    pub fn set_active(&mut self, id: Option<&str>) -> StoreResult<()> {
        if let Some(id) = id {
            self.profile_mut(id)?;
        }
        self.doc.active_profile = id.map(str::to_string);
        self.save()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.doc.active_profile.as_deref()
    }

    pub fn active(&self) -> Option<&Profile> {
        self.active_id().and_then(|id| self.profile(id))
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.doc.leaderboard
    }

    /// Best score across all players
    pub fn global_high_score(&self) -> u64 {
        self.doc.leaderboard.top_score()
    }

    pub fn reset_leaderboard(&mut self) -> StoreResult<()> {
        self.doc.leaderboard.reset();
        self.save()
    }

    pub fn detailed_stats(&self, id: &str) -> Option<DetailedStats> {
        let profile = self.profile(id)?;
        let scores: Vec<u64> = self
            .doc
            .leaderboard
            .entries_for(id)
            .map(|e| e.score)
            .collect();
        let lifetime = profile.lifetime;

        let average_score = match scores.len() {
            0 => 0,
            n => (scores.iter().sum::<u64>() as f64 / n as f64).round() as u64,
        };
        let average_asteroids_per_game = match lifetime.total_games_played {
            0 => 0,
            n => (lifetime.total_asteroids_destroyed as f64 / n as f64).round() as u64,
        };

        Some(DetailedStats {
            lifetime,
            average_score,
            leaderboard_entries: scores.len(),
            average_asteroids_per_game,
        })
    }
}

impl ProfileService for ProfileStore {
    fn record_answer(&mut self, profile_id: &str, record: &AnswerRecord, correct: bool) {
        match self.profile_mut(profile_id) {
            Ok(profile) => profile.answers.record(record, correct),
            Err(err) => {
                log::warn!("Answer not recorded: {}", err);
                return;
            }
        }
        self.persist();
    }

    fn weak_areas(&self, profile_id: &str) -> Vec<WeakArea> {
        self.profile(profile_id)
            .map(|p| p.answers.weak_areas())
            .unwrap_or_default()
    }

    fn high_score(&self, profile_id: &str) -> u64 {
        self.profile(profile_id)
            .map(|p| p.lifetime.high_score)
            .unwrap_or(0)
    }

    fn record_game(&mut self, profile_id: Option<&str>, summary: &GameSummary) -> Option<usize> {
        let entry_id = Uuid::new_v4().to_string();
        let rank = apply_game(
            &mut self.doc.profiles,
            &mut self.doc.leaderboard,
            profile_id,
            summary,
            entry_id,
            unix_millis(),
        );
        self.persist();
        rank
    }
}
