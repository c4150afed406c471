//! Power-up effect state machine
//!
//! `Idle -> Stored(kind) -> Active`. Only one power-up may be stored at a
//! time; collecting another replaces it. Extra life never enters storage.
//! Timed effects are absolute session-time deadlines checked once per tick.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Power-up capsule types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Shield,
    Freeze,
    Repulsor,
    ExtraLife,
    Multishot,
    Slowdown,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 6] = [
        PowerUpKind::Shield,
        PowerUpKind::Freeze,
        PowerUpKind::Repulsor,
        PowerUpKind::ExtraLife,
        PowerUpKind::Multishot,
        PowerUpKind::Slowdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUpKind::Shield => "shield",
            PowerUpKind::Freeze => "freeze",
            PowerUpKind::Repulsor => "repulsor",
            PowerUpKind::ExtraLife => "extralife",
            PowerUpKind::Multishot => "multishot",
            PowerUpKind::Slowdown => "slowdown",
        }
    }
}

/// Effects that expire on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimedEffect {
    Freeze,
    Multishot,
    Slowdown,
}

impl TimedEffect {
    pub fn duration_ms(&self) -> u64 {
        match self {
            TimedEffect::Freeze => FREEZE_DURATION_MS,
            TimedEffect::Multishot => MULTISHOT_DURATION_MS,
            TimedEffect::Slowdown => SLOWDOWN_DURATION_MS,
        }
    }
}

/// What activating the stored power-up did. Only timed variants carry a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Next impact is absorbed
    Shield,
    /// Spawning and asteroid movement halt until `until`
    Freeze { until: u64 },
    /// Every live asteroid is thrown back for `duration_ms`
    Repulsor { duration_ms: u64 },
    /// Each correct answer also destroys one more asteroid until `until`
    Multishot { until: u64 },
    /// Asteroids fall at `factor` speed until `until`
    Slowdown { until: u64, factor: f32 },
}

/// Result of collecting a power-up capsule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    Stored {
        kind: PowerUpKind,
        replaced: Option<PowerUpKind>,
    },
    ExtraLife {
        lives: u8,
    },
}

/// Per-session power-up state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectState {
    pub stored: Option<PowerUpKind>,
    pub shield_active: bool,
    pub freeze_until: Option<u64>,
    pub multishot_until: Option<u64>,
    pub slowdown_until: Option<u64>,
}

impl EffectState {
    /// Collect a power-up. Extra life applies immediately (capped at `MAX_LIVES`).
    pub fn collect(&mut self, kind: PowerUpKind, lives: &mut u8) -> Collected {
        if kind == PowerUpKind::ExtraLife {
            *lives = (*lives + 1).min(MAX_LIVES);
            return Collected::ExtraLife { lives: *lives };
        }
        let replaced = self.stored.replace(kind);
        Collected::Stored { kind, replaced }
    }

    /// Activate the stored power-up, if any
    pub fn activate(&mut self, now: u64) -> Option<Activation> {
        let kind = self.stored.take()?;
        let activation = match kind {
            PowerUpKind::Shield => {
                self.shield_active = true;
                Activation::Shield
            }
            PowerUpKind::Freeze => {
                let until = now + TimedEffect::Freeze.duration_ms();
                self.freeze_until = Some(until);
                Activation::Freeze { until }
            }
            PowerUpKind::Repulsor => Activation::Repulsor {
                duration_ms: REPULSION_DURATION_MS,
            },
            PowerUpKind::Multishot => {
                let until = now + TimedEffect::Multishot.duration_ms();
                self.multishot_until = Some(until);
                Activation::Multishot { until }
            }
            PowerUpKind::Slowdown => {
                let until = now + TimedEffect::Slowdown.duration_ms();
                self.slowdown_until = Some(until);
                Activation::Slowdown {
                    until,
                    factor: SLOWDOWN_FACTOR,
                }
            }
            // Never stored
            PowerUpKind::ExtraLife => return None,
        };
        Some(activation)
    }

    /// Clear every timed effect whose deadline has passed and report them
    pub fn expire(&mut self, now: u64) -> Vec<TimedEffect> {
        let mut expired = Vec::new();
        let slots = [
            (TimedEffect::Freeze, &mut self.freeze_until),
            (TimedEffect::Multishot, &mut self.multishot_until),
            (TimedEffect::Slowdown, &mut self.slowdown_until),
        ];
        for (effect, slot) in slots {
            if slot.is_some_and(|until| now >= until) {
                *slot = None;
                expired.push(effect);
            }
        }
        expired
    }

    /// Consume the shield on an impact. Returns true if the impact was absorbed.
    pub fn absorb_impact(&mut self) -> bool {
        std::mem::take(&mut self.shield_active)
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_until.is_some()
    }

    pub fn multishot_active(&self) -> bool {
        self.multishot_until.is_some()
    }

    pub fn slowdown_active(&self) -> bool {
        self.slowdown_until.is_some()
    }
}
