//! Session state and core simulation types
//!
//! Everything the tick and answer-resolution code mutates lives here.

use std::collections::HashSet;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::effects::{EffectState, PowerUpKind, TimedEffect};
use super::entity::{Arena, Difficulty, FallingEntity};
use super::question::{OperationConfig, Operator, Question};
use crate::consts::*;

/// Victory rule for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GameMode {
    /// Play until out of lives
    #[default]
    Infinite,
    /// Survive until the countdown ends
    Time { limit_ms: u64 },
    /// Destroy `target` asteroids
    Asteroids { target: u32 },
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Infinite => "infinite",
            GameMode::Time { .. } => "time",
            GameMode::Asteroids { .. } => "asteroids",
        }
    }
}

/// Relentless spawn intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelentlessLevel {
    One,
    Two,
    Three,
}

impl RelentlessLevel {
    pub fn spawn_interval_ms(&self) -> u64 {
        match self {
            RelentlessLevel::One => 1_200,
            RelentlessLevel::Two => 900,
            RelentlessLevel::Three => 600,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(RelentlessLevel::One),
            2 => Some(RelentlessLevel::Two),
            3 => Some(RelentlessLevel::Three),
            _ => None,
        }
    }
}

/// How new asteroids are spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPolicy {
    /// Capped by difficulty, gated by a minimum delay
    #[default]
    Normal,
    /// Uncapped, fixed interval
    Relentless(RelentlessLevel),
}

impl SpawnPolicy {
    pub fn is_relentless(&self) -> bool {
        matches!(self, SpawnPolicy::Relentless(_))
    }
}

/// Everything fixed at session start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub operation: OperationConfig,
    pub difficulty: Difficulty,
    pub mode: GameMode,
    pub split_mode: bool,
    pub spawn_policy: SpawnPolicy,
    pub arena: Arena,
    pub seed: u64,
    /// Lives at session start, capped at `MAX_LIVES`
    pub starting_lives: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            operation: OperationConfig::default(),
            difficulty: Difficulty::Medium,
            mode: GameMode::Infinite,
            split_mode: false,
            spawn_policy: SpawnPolicy::Normal,
            arena: Arena::default(),
            seed: 0,
            starting_lives: STARTING_LIVES,
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Playing,
    Paused,
    /// Mode target reached
    Won,
    /// Out of lives
    Lost,
    /// Player quit
    Abandoned,
}

impl GamePhase {
    pub fn is_over(&self) -> bool {
        matches!(self, GamePhase::Won | GamePhase::Lost | GamePhase::Abandoned)
    }
}

/// Notifications for the presentation layer. The simulation never waits on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    AsteroidSpawned {
        id: u32,
    },
    PowerUpSpawned {
        id: u32,
        kind: PowerUpKind,
    },
    /// Score is already applied; the explosion should play after `visual_delay_ms`
    AsteroidDestroyed {
        id: u32,
        pos: Vec2,
        points: u64,
        combo: u32,
        time_bonus: f64,
        visual_delay_ms: u64,
        secondary: bool,
    },
    FragmentsSpawned {
        parent: u32,
        children: [u32; 2],
    },
    ComboMilestone {
        combo: u32,
        pos: Vec2,
    },
    /// Asteroid hit the planet; carries the answer the player missed
    ReachedTarget {
        id: u32,
        pos: Vec2,
        question: String,
        answer: i32,
    },
    PowerUpLost {
        id: u32,
    },
    PowerUpCollected {
        kind: PowerUpKind,
        pos: Vec2,
    },
    PowerUpActivated {
        kind: PowerUpKind,
    },
    EffectExpired {
        effect: TimedEffect,
    },
    ShieldBlocked,
    LifeGained {
        lives: u8,
    },
    LifeLost {
        lives: u8,
    },
    WrongAnswer {
        given: i32,
    },
    Victory,
    Defeat,
}

/// One resolved answer, forwarded to the stats collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub correct_answer: i32,
    /// What the player typed, when it was wrong
    pub given_answer: Option<i32>,
    pub operator: Operator,
    pub table: Option<i32>,
    pub response_time_ms: u64,
}

impl AnswerRecord {
    pub fn new(question: &Question, given: Option<i32>, response_time_ms: u64) -> Self {
        Self {
            question: question.text.clone(),
            correct_answer: question.answer,
            given_answer: given,
            operator: question.operator,
            table: question.table,
            response_time_ms,
        }
    }
}

/// What a submitted answer did
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Nothing on screen; input ignored
    Ignored,
    PowerUpCollected {
        kind: PowerUpKind,
        record: AnswerRecord,
    },
    Correct {
        id: u32,
        points: u64,
        record: AnswerRecord,
    },
    /// `record` describes the asteroid judged closest to landing, which is
    /// only a guess at what the player was aiming for
    Wrong {
        record: AnswerRecord,
    },
}

impl AnswerOutcome {
    /// Stats record and correctness, if the answer counts
    pub fn record(&self) -> Option<(&AnswerRecord, bool)> {
        match self {
            AnswerOutcome::Ignored => None,
            AnswerOutcome::PowerUpCollected { record, .. } => Some((record, true)),
            AnswerOutcome::Correct { record, .. } => Some((record, true)),
            AnswerOutcome::Wrong { record } => Some((record, false)),
        }
    }
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct SessionState {
    pub config: SessionConfig,
    pub rng: Pcg32,
    pub phase: GamePhase,
    pub score: u64,
    /// Current multiplier, never below 1
    pub combo: u32,
    pub max_combo: u32,
    pub lives: u8,
    pub asteroids_destroyed: u32,
    /// Live asteroids and power-ups, in spawn order
    pub entities: Vec<FallingEntity>,
    pub effects: EffectState,
    /// Session time of the last asteroid spawn
    pub last_spawn: Option<u64>,
    /// Session time of the last tick
    pub time_ms: u64,
    /// Pending notifications for the presentation layer
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        let rng = Pcg32::seed_from_u64(config.seed);
        let lives = config.starting_lives.clamp(1, MAX_LIVES);
        Self {
            config,
            rng,
            phase: GamePhase::Playing,
            score: 0,
            combo: 1,
            max_combo: 1,
            lives,
            asteroids_destroyed: 0,
            entities: Vec::new(),
            effects: EffectState::default(),
            last_spawn: None,
            time_ms: 0,
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn asteroids(&self) -> impl Iterator<Item = &FallingEntity> {
        self.entities.iter().filter(|e| e.active && e.is_asteroid())
    }

    pub fn asteroid_count(&self) -> usize {
        self.asteroids().count()
    }

    /// The power-up capsule on screen, if any
    pub fn power_up(&self) -> Option<&FallingEntity> {
        self.entities
            .iter()
            .find(|e| e.active && e.power_up_kind().is_some())
    }

    /// Answers currently on screen (asteroids and power-up)
    pub fn live_answers(&self) -> HashSet<i32> {
        self.entities
            .iter()
            .filter(|e| e.active)
            .map(|e| e.answer())
            .collect()
    }

    /// Index of the live, unhit asteroid closest to the planet
    pub fn nearest_asteroid(&self) -> Option<usize> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.active && !e.hit && e.is_asteroid())
            .max_by(|(_, a), (_, b)| a.pos.y.total_cmp(&b.pos.y))
            .map(|(i, _)| i)
    }

    /// Countdown remaining in time mode
    pub fn remaining_ms(&self) -> Option<u64> {
        match self.config.mode {
            GameMode::Time { limit_ms } => Some(limit_ms.saturating_sub(self.time_ms)),
            _ => None,
        }
    }

    /// Drop entities marked inactive
    pub fn compact(&mut self) {
        self.entities.retain(|e| e.active);
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}
