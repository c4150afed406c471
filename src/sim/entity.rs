//! Falling entities: asteroids and power-up capsules
//!
//! Both kinds travel in a straight line fixed at spawn toward the planet at
//! the bottom-centre of the arena. Asteroids additionally carry the timed
//! velocity modifiers (repulsion, slowdown) driven by the effect controller.

use std::collections::HashSet;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::effects::PowerUpKind;
use super::question::{OperationConfig, Question, QuestionGenerator};
use crate::consts::*;

/// Play area bounds in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: REFERENCE_HEIGHT,
        }
    }
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Height of the planet band, scaled from the reference resolution
    pub fn earth_margin(&self) -> f32 {
        REFERENCE_EARTH_MARGIN * (self.height / REFERENCE_HEIGHT)
    }

    /// y coordinate an entity's leading edge must cross to count as landed
    pub fn earth_line(&self) -> f32 {
        self.height - self.earth_margin()
    }

    /// Point every entity is aimed at
    pub fn target(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.earth_line())
    }

    /// Laser muzzle position (bottom centre)
    pub fn cannon(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height - CANNON_OFFSET)
    }
}

/// Difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Seconds an asteroid takes to reach the planet
    pub fn asteroid_travel_secs(&self) -> f32 {
        match self {
            Difficulty::Easy => 12.0,
            Difficulty::Medium => 7.0,
            Difficulty::Hard => 4.0,
        }
    }

    /// Power-ups fall a little slower than asteroids
    pub fn power_up_travel_secs(&self) -> f32 {
        match self {
            Difficulty::Easy => 14.0,
            Difficulty::Medium => 9.0,
            Difficulty::Hard => 5.0,
        }
    }

    /// Concurrent asteroid cap in normal spawn mode
    pub fn max_asteroids(&self) -> usize {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }

    /// Minimum delay between spawns in normal spawn mode (ms)
    pub fn spawn_delay_ms(&self) -> u64 {
        match self {
            Difficulty::Easy => 3_000,
            Difficulty::Medium => 2_000,
            Difficulty::Hard => 1_500,
        }
    }
}

/// What a falling entity is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Asteroid { can_split: bool, is_fragment: bool },
    PowerUp(PowerUpKind),
}

/// Spawn overrides (fragments)
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnOptions {
    pub pos: Option<Vec2>,
    pub size: Option<f32>,
    pub fragment: bool,
}

/// An asteroid or power-up falling toward the planet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallingEntity {
    pub id: u32,
    pub kind: EntityKind,
    pub question: Question,
    pub pos: Vec2,
    /// Velocity toward the target, already scaled by `slowdown_factor`
    pub base_vel: Vec2,
    /// Velocity actually applied this tick
    pub vel: Vec2,
    /// Unscaled speed toward the target (px per 60fps frame)
    pub base_speed: f32,
    pub size: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    /// Session time (ms) the entity appeared
    pub spawn_time: u64,
    pub active: bool,
    /// Struck by the laser, waiting for the explosion visual
    pub hit: bool,
    pub slowdown_factor: f32,
    pub repelled: bool,
    pub repel_end: u64,
    /// Set once the entity crossed the earth line
    #[serde(default)]
    landed: bool,
    arena: Arena,
}

impl FallingEntity {
    /// Build a new entity with a straight-line course to the planet
    #[allow(clippy::too_many_arguments)]
    fn launch<R: Rng + ?Sized>(
        id: u32,
        kind: EntityKind,
        question: Question,
        arena: Arena,
        travel_secs: f32,
        size: f32,
        pos: Option<Vec2>,
        now: u64,
        rng: &mut R,
    ) -> Self {
        let pos = pos.unwrap_or_else(|| {
            let span = (arena.width - size * 2.0).max(0.0);
            Vec2::new(rng.random::<f32>() * span + size, -size)
        });

        let to_target = arena.target() - pos;
        let distance = to_target.length();
        let base_speed = distance / (travel_secs * 60.0);
        let vel = to_target.normalize_or_zero() * base_speed;

        let rotation_speed = match kind {
            EntityKind::Asteroid { .. } => (rng.random::<f32>() - 0.5) * ASTEROID_MAX_ROTATION_SPEED,
            EntityKind::PowerUp(_) => POWERUP_ROTATION_SPEED,
        };

        Self {
            id,
            kind,
            question,
            pos,
            base_vel: vel,
            vel,
            base_speed,
            size,
            rotation: 0.0,
            rotation_speed,
            spawn_time: now,
            active: true,
            hit: false,
            slowdown_factor: 1.0,
            repelled: false,
            repel_end: 0,
            landed: false,
            arena,
        }
    }

    /// Spawn an asteroid with a freshly generated question
    #[allow(clippy::too_many_arguments)]
    pub fn asteroid<R: Rng + ?Sized>(
        id: u32,
        arena: Arena,
        config: &OperationConfig,
        difficulty: Difficulty,
        existing: &HashSet<i32>,
        options: SpawnOptions,
        now: u64,
        rng: &mut R,
    ) -> Self {
        let question = QuestionGenerator::new(config).generate(rng, existing);
        let kind = EntityKind::Asteroid {
            can_split: !options.fragment,
            is_fragment: options.fragment,
        };
        Self::launch(
            id,
            kind,
            question,
            arena,
            difficulty.asteroid_travel_secs(),
            options.size.unwrap_or(ASTEROID_SIZE),
            options.pos,
            now,
            rng,
        )
    }

    /// Spawn a power-up capsule of the given kind
    #[allow(clippy::too_many_arguments)]
    pub fn power_up<R: Rng + ?Sized>(
        id: u32,
        kind: PowerUpKind,
        arena: Arena,
        config: &OperationConfig,
        difficulty: Difficulty,
        existing: &HashSet<i32>,
        now: u64,
        rng: &mut R,
    ) -> Self {
        let question = QuestionGenerator::new(config).generate(rng, existing);
        Self::launch(
            id,
            EntityKind::PowerUp(kind),
            question,
            arena,
            difficulty.power_up_travel_secs(),
            POWERUP_SIZE,
            None,
            now,
            rng,
        )
    }

    pub fn answer(&self) -> i32 {
        self.question.answer
    }

    pub fn is_asteroid(&self) -> bool {
        matches!(self.kind, EntityKind::Asteroid { .. })
    }

    pub fn power_up_kind(&self) -> Option<PowerUpKind> {
        match self.kind {
            EntityKind::PowerUp(kind) => Some(kind),
            EntityKind::Asteroid { .. } => None,
        }
    }

    /// Whether destroying this asteroid in split mode yields fragments
    pub fn can_split(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Asteroid {
                can_split: true,
                is_fragment: false
            }
        )
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, EntityKind::Asteroid { is_fragment: true, .. })
    }

    /// Score multiplier for answering quickly
    pub fn time_bonus(&self, now: u64) -> f64 {
        let elapsed = now.saturating_sub(self.spawn_time);
        if elapsed < 2_000 {
            2.0
        } else if elapsed < 4_000 {
            1.5
        } else if elapsed < 6_000 {
            1.2
        } else {
            1.0
        }
    }

    /// Advance by `dt_ms`. Returns true on the tick the entity first
    /// crosses the earth line; the caller owns removal.
    pub fn update(&mut self, dt_ms: f32, now: u64) -> bool {
        if !self.active {
            return false;
        }

        if self.repelled && now >= self.repel_end {
            self.end_repulsion();
        }

        self.pos += self.vel * (dt_ms * FRAME_SCALE);

        // Repelled entities may not leave the screen
        if self.repelled {
            self.pos.y = self.pos.y.max(-self.size);
            let max_x = (self.arena.width - self.size).max(self.size);
            self.pos.x = self.pos.x.clamp(self.size, max_x);
        }

        self.rotation += self.rotation_speed * dt_ms;

        if !self.landed && self.pos.y + self.size > self.arena.earth_line() {
            self.landed = true;
            return true;
        }
        false
    }

    /// Throw the entity back away from the planet for `duration_ms`
    pub fn apply_repulsion(&mut self, now: u64, duration_ms: u64) {
        self.repelled = true;
        self.repel_end = now + duration_ms;
        self.vel = -self.base_vel * REPULSION_BOOST;
    }

    /// Re-aim at the planet from wherever the repulsion left us
    pub fn end_repulsion(&mut self) {
        self.repelled = false;
        let to_target = self.arena.target() - self.pos;
        if to_target.length() > 0.0 {
            self.base_vel = to_target.normalize() * self.base_speed * self.slowdown_factor;
        }
        self.vel = self.base_vel;
    }

    /// Scale velocity by `factor`. No-op while already slowed.
    pub fn apply_slowdown(&mut self, factor: f32) {
        if self.slowdown_factor != 1.0 || factor <= 0.0 {
            return;
        }
        self.slowdown_factor = factor;
        self.vel *= factor;
        self.base_vel *= factor;
    }

    /// Undo `apply_slowdown`. No-op when not slowed.
    pub fn remove_slowdown(&mut self) {
        if self.slowdown_factor == 1.0 {
            return;
        }
        let inverse = 1.0 / self.slowdown_factor;
        self.vel *= inverse;
        self.base_vel *= inverse;
        self.slowdown_factor = 1.0;
    }

    /// Split into two smaller asteroids with mutually distinct answers
    /// that also avoid `existing`.
    pub fn fragments<R: Rng + ?Sized>(
        &self,
        ids: [u32; 2],
        config: &OperationConfig,
        difficulty: Difficulty,
        existing: &HashSet<i32>,
        now: u64,
        rng: &mut R,
    ) -> [FallingEntity; 2] {
        let mut used = existing.clone();
        let mut spawn = |id: u32, dx: f32, used: &mut HashSet<i32>| {
            let options = SpawnOptions {
                pos: Some(Vec2::new(self.pos.x + dx, self.pos.y)),
                size: Some(self.size * FRAGMENT_SCALE),
                fragment: true,
            };
            let fragment =
                FallingEntity::asteroid(id, self.arena, config, difficulty, used, options, now, &mut *rng);
            used.insert(fragment.answer());
            fragment
        };
        let left = spawn(ids[0], -FRAGMENT_OFFSET, &mut used);
        let right = spawn(ids[1], FRAGMENT_OFFSET, &mut used);
        [left, right]
    }

    /// Milliseconds the laser needs to reach this entity
    pub fn laser_delay_ms(&self) -> u64 {
        (self.arena.cannon().distance(self.pos) / LASER_SPEED) as u64
    }
}
