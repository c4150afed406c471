//! Profile, statistics and leaderboard persistence
//!
//! Features:
//! - `ProfileService`: the seam the game core talks to
//! - `ProfileStore`: versioned JSON document on disk, written via tmp + rename
//! - `MemoryProfiles`: in-memory implementation for tests and guest play
//!
//! The game never blocks on or fails because of storage. Store write errors
//! are logged and swallowed at this boundary.

pub mod profiles;

use serde::{Deserialize, Serialize};

use crate::highscores::{Leaderboard, LeaderboardEntry};
use crate::sim::{Difficulty, GameMode, GamePhase};
use crate::stats::WeakArea;

pub use crate::sim::AnswerRecord;
pub use profiles::{
    AVATARS, Avatar, COLORS, DetailedStats, LifetimeStats, Profile, ProfileDraft, ProfileStore,
};

/// End-of-game numbers handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub score: u64,
    pub max_combo: u32,
    pub asteroids_destroyed: u32,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub outcome: GamePhase,
    pub duration_ms: u64,
}

impl GameSummary {
    /// Victories always post; defeats only with a non-zero score; quits never
    pub fn posts_to_leaderboard(&self) -> bool {
        match self.outcome {
            GamePhase::Won => true,
            GamePhase::Lost => self.score > 0,
            _ => false,
        }
    }

    /// Whether this game counts toward lifetime stats
    pub fn counts(&self) -> bool {
        matches!(self.outcome, GamePhase::Won | GamePhase::Lost)
    }
}

/// Profile, stats and leaderboard collaborator used by `Game`
pub trait ProfileService {
    /// Record one resolved answer against a profile's statistics
    fn record_answer(&mut self, profile_id: &str, record: &AnswerRecord, correct: bool);

    /// Tables and operations with at least 10 samples under 70% success, weakest first
    fn weak_areas(&self, profile_id: &str) -> Vec<WeakArea>;

    /// Best score of a profile (0 for unknown profiles)
    fn high_score(&self, profile_id: &str) -> u64;

    /// Fold a finished game into the profile's lifetime stats and the
    /// leaderboard. Returns the leaderboard rank, if an entry was posted.
    fn record_game(&mut self, profile_id: Option<&str>, summary: &GameSummary) -> Option<usize>;
}

/// Apply a finished game to a profile list and leaderboard
pub(crate) fn apply_game(
    profiles: &mut [Profile],
    leaderboard: &mut Leaderboard,
    profile_id: Option<&str>,
    summary: &GameSummary,
    entry_id: String,
    date: u64,
) -> Option<usize> {
    if !summary.counts() {
        return None;
    }

    let profile = profile_id.and_then(|id| profiles.iter_mut().find(|p| p.id == id));
    let profile = profile.map(|p| {
        p.lifetime.record_game(summary);
        &*p
    });

    if !summary.posts_to_leaderboard() {
        return None;
    }
    let entry = LeaderboardEntry::for_game(profile, summary, entry_id, date);
    leaderboard.add(entry)
}

/// In-memory profiles and leaderboard
#[derive(Debug, Clone, Default)]
pub struct MemoryProfiles {
    pub profiles: Vec<Profile>,
    pub leaderboard: Leaderboard,
    /// Every answer received, in order
    pub answers: Vec<(String, AnswerRecord, bool)>,
    next_entry: u64,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile with a fixed ID
    pub fn with_profile(mut self, id: &str, name: &str) -> Self {
        self.profiles
            .push(Profile::new(id.to_string(), ProfileDraft::named(name), 0));
        self
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn profile_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }
}

impl ProfileService for MemoryProfiles {
    fn record_answer(&mut self, profile_id: &str, record: &AnswerRecord, correct: bool) {
        if let Some(profile) = self.profile_mut(profile_id) {
            profile.answers.record(record, correct);
        }
        self.answers
            .push((profile_id.to_string(), record.clone(), correct));
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
        self.next_entry += 1;
        let entry_id = format!("game-{}", self.next_entry);
        apply_game(
            &mut self.profiles,
            &mut self.leaderboard,
            profile_id,
            summary,
            entry_id,
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Operator, Question};

    fn summary(score: u64, outcome: GamePhase) -> GameSummary {
        GameSummary {
            score,
            max_combo: 4,
            asteroids_destroyed: 6,
            mode: GameMode::Infinite,
            difficulty: Difficulty::Medium,
            outcome,
            duration_ms: 60_000,
        }
    }

    #[test]
    fn test_leaderboard_posting_rules() {
        assert!(summary(0, GamePhase::Won).posts_to_leaderboard());
        assert!(!summary(0, GamePhase::Lost).posts_to_leaderboard());
        assert!(summary(10, GamePhase::Lost).posts_to_leaderboard());
        assert!(!summary(500, GamePhase::Abandoned).posts_to_leaderboard());
    }

    #[test]
    fn test_memory_profiles_record_game() {
        let mut profiles = MemoryProfiles::new().with_profile("p1", "Ada");
        assert_eq!(profiles.record_game(Some("p1"), &summary(1_200, GamePhase::Lost)), Some(1));
        assert_eq!(profiles.record_game(Some("p1"), &summary(0, GamePhase::Lost)), None);
        assert_eq!(profiles.record_game(None, &summary(3_000, GamePhase::Won)), Some(1));

        let lifetime = profiles.profile("p1").unwrap().lifetime;
        assert_eq!(lifetime.total_games_played, 2);
        assert_eq!(lifetime.high_score, 1_200);
        assert_eq!(lifetime.total_asteroids_destroyed, 12);
        assert_eq!(profiles.high_score("p1"), 1_200);
        assert_eq!(profiles.high_score("ghost"), 0);

        let board = &profiles.leaderboard.entries;
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].player_id, None);
        assert_eq!(board[1].player_name, "Ada");
    }

    #[test]
    fn test_memory_profiles_weak_areas() {
        let mut profiles = MemoryProfiles::new().with_profile("p1", "Ada");
        let question = Question {
            text: "8 × 7".into(),
            answer: 56,
            operator: Operator::Mul,
            table: Some(8),
        };
        for _ in 0..10 {
            profiles.record_answer("p1", &AnswerRecord::new(&question, Some(54), 900), false);
        }
        let weak = profiles.weak_areas("p1");
        assert_eq!(weak.len(), 2);
        assert_eq!(profiles.answers.len(), 10);
        assert!(profiles.weak_areas("ghost").is_empty());
    }
}
