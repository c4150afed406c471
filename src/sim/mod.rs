//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Session time is passed in, never read from a clock
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering, audio or storage dependencies

pub mod effects;
pub mod entity;
pub mod question;
pub mod state;
pub mod tick;

pub use effects::{Activation, Collected, EffectState, PowerUpKind, TimedEffect};
pub use entity::{Arena, Difficulty, EntityKind, FallingEntity, SpawnOptions};
pub use question::{
    DigitCount, OperationConfig, OperationType, Operator, Question, QuestionGenerator,
};
pub use state::{
    AnswerOutcome, AnswerRecord, GameEvent, GameMode, GamePhase, RelentlessLevel, SessionConfig,
    SessionState, SpawnPolicy,
};
pub use tick::{activate_power_up, lose_life, points_for, resolve_answer, set_paused, tick};
