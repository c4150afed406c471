//! Save the Earth - An arithmetic arcade trainer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (questions, falling entities, power-ups, scoring)
//! - `game`: Session driver (clock, pause, persistence forwarding)
//! - `stats`: Per-profile answer statistics and weak-area detection
//! - `persistence`: Profiles, leaderboard and the collaborator trait
//! - `platform`: Time sources

pub mod error;
pub mod game;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod settings;
pub mod sim;
pub mod stats;

pub use error::StoreError;
pub use game::Game;
pub use highscores::Leaderboard;
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Screen height the earth margin is tuned for
    pub const REFERENCE_HEIGHT: f32 = 1080.0;
    /// Earth margin at the reference height (scaled linearly with the arena)
    pub const REFERENCE_EARTH_MARGIN: f32 = 120.0;
    /// Converts a millisecond delta into "60 fps frames" of travel
    pub const FRAME_SCALE: f32 = 0.06;
    /// Largest delta a single tick may advance (ms)
    pub const MAX_TICK_MS: u64 = 100;

    /// Entity sizes
    pub const ASTEROID_SIZE: f32 = 60.0;
    pub const POWERUP_SIZE: f32 = 45.0;
    pub const FRAGMENT_SCALE: f32 = 0.6;
    /// Horizontal offset of each fragment from its parent
    pub const FRAGMENT_OFFSET: f32 = 30.0;
    pub const POWERUP_ROTATION_SPEED: f32 = 0.02;
    /// Asteroid spin is drawn from [-MAX/2, MAX/2)
    pub const ASTEROID_MAX_ROTATION_SPEED: f32 = 0.015;

    /// Lives
    pub const STARTING_LIVES: u8 = 3;
    pub const MAX_LIVES: u8 = 4;

    /// Scoring
    pub const BASE_POINTS: f64 = 100.0;
    pub const MULTISHOT_POINTS: u64 = 50;
    /// Every Nth combo triggers a milestone celebration
    pub const COMBO_MILESTONE: u32 = 5;

    /// Question generation retry bound
    pub const MAX_GENERATION_ATTEMPTS: u32 = 50;

    /// Power-ups
    pub const POWERUP_SPAWN_CHANCE: f64 = 0.15;
    pub const FREEZE_DURATION_MS: u64 = 5_000;
    pub const REPULSION_DURATION_MS: u64 = 3_000;
    pub const REPULSION_BOOST: f32 = 1.5;
    pub const MULTISHOT_DURATION_MS: u64 = 10_000;
    pub const SLOWDOWN_DURATION_MS: u64 = 8_000;
    pub const SLOWDOWN_FACTOR: f32 = 0.5;

    /// Laser travel speed used for the explosion delay (px per ms)
    pub const LASER_SPEED: f32 = 3.0;
    /// Cannon muzzle height above the bottom edge
    pub const CANNON_OFFSET: f32 = 130.0;
}
