//! High score leaderboard system
//!
//! Shared by every profile (and guests), persisted inside the profile store,
//! keeps the top 50 scores.

use serde::{Deserialize, Serialize};

use crate::sim::Difficulty;

/// Maximum number of leaderboard entries to keep
pub const MAX_ENTRIES: usize = 50;

/// Name shown for games played without a profile
pub const GUEST_NAME: &str = "Guest";
pub const GUEST_AVATAR: &str = "👤";
pub const DEFAULT_COLOR: &str = "#4fc3f7";

/// A single leaderboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    /// `None` for guest games
    pub player_id: Option<String>,
    pub player_name: String,
    pub player_avatar: String,
    pub player_color: String,
    pub score: u64,
    /// Game mode tag (`GameMode::as_str`)
    pub mode: String,
    pub difficulty: Difficulty,
    /// Unix timestamp (ms) when achieved
    pub date: u64,
}

/// High score leaderboard, sorted by descending score
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a score would make it onto the board
    pub fn qualifies(&self, score: u64) -> bool {
        if self.entries.len() < MAX_ENTRIES {
            return true;
        }
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Get the rank a score would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Insert an entry, keeping the board sorted and trimmed.
    /// Returns the rank achieved (1-indexed) or None if it fell off the end.
    pub fn add(&mut self, entry: LeaderboardEntry) -> Option<usize> {
        // Equal scores keep their arrival order
        let pos = self
            .entries
            .iter()
            .position(|e| entry.score > e.score)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
        self.entries.truncate(MAX_ENTRIES);

        (pos < MAX_ENTRIES).then_some(pos + 1)
    }

    /// Entries matching the optional mode and difficulty filters
    pub fn filter(&self, mode: Option<&str>, difficulty: Option<Difficulty>) -> Vec<&LeaderboardEntry> {
        self.entries
            .iter()
            .filter(|e| mode.is_none_or(|m| e.mode == m))
            .filter(|e| difficulty.is_none_or(|d| e.difficulty == d))
            .collect()
    }

    pub fn entries_for(&self, player_id: &str) -> impl Iterator<Item = &LeaderboardEntry> {
        self.entries
            .iter()
            .filter(move |e| e.player_id.as_deref() == Some(player_id))
    }

    /// Rewrite the display fields of every entry owned by `player_id`.
    /// Returns true if any entry changed.
    pub fn rename_player(&mut self, player_id: &str, name: &str, avatar: &str, color: &str) -> bool {
        let mut updated = false;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.player_id.as_deref() == Some(player_id))
        {
            entry.player_name = name.to_string();
            entry.player_avatar = avatar.to_string();
            entry.player_color = color.to_string();
            updated = true;
        }
        updated
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best score across all players (0 when empty)
    pub fn top_score(&self) -> u64 {
        self.entries.first().map(|e| e.score).unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Format a timestamp as a relative date string
pub fn format_date(timestamp: u64, now: u64) -> String {
    let diff_mins = now.saturating_sub(timestamp) / 60_000;
    let diff_hours = diff_mins / 60;
    let diff_days = diff_hours / 24;

    match (diff_days, diff_hours, diff_mins) {
        (1, _, _) => "Yesterday".to_string(),
        (d, _, _) if d > 1 => format!("{} days ago", d),
        (_, 1, _) => "1 hour ago".to_string(),
        (_, h, _) if h > 1 => format!("{} hours ago", h),
        (_, _, 1) => "1 min ago".to_string(),
        (_, _, m) if m > 1 => format!("{} mins ago", m),
        _ => "Just now".to_string(),
    }
}
