//! Session tick and answer resolution
//!
//! `tick` advances time; `resolve_answer` and `activate_power_up` apply
//! player input synchronously. All three take the current session time in
//! milliseconds. Removal is mark-then-compact: entities are flagged
//! inactive while iterating and dropped once the step is done.

use rand::Rng;
use rand::seq::IndexedRandom;

use super::effects::{Activation, Collected, PowerUpKind, TimedEffect};
use super::entity::{FallingEntity, SpawnOptions};
use super::state::{
    AnswerOutcome, AnswerRecord, GameEvent, GameMode, GamePhase, SessionState, SpawnPolicy,
};
use crate::consts::*;

/// Points for a correct answer
pub fn points_for(combo: u32, time_bonus: f64) -> u64 {
    (BASE_POINTS * combo as f64 * time_bonus).floor() as u64
}

/// Advance the session to session time `now`
pub fn tick(state: &mut SessionState, now: u64) {
    if state.phase != GamePhase::Playing {
        return;
    }

    let dt = now.saturating_sub(state.time_ms).min(MAX_TICK_MS) as f32;
    state.time_ms = now;

    expire_effects(state, now);

    if spawn_due(state, now) {
        spawn_asteroid(state, now);
        state.last_spawn = Some(now);
    }

    // Asteroids stand still while frozen; power-ups keep falling
    let frozen = state.effects.is_frozen();
    let mut landed = Vec::new();
    for entity in state.entities.iter_mut() {
        if !entity.active || (frozen && entity.is_asteroid()) {
            continue;
        }
        if entity.update(dt, now) {
            entity.active = false;
            landed.push((
                entity.id,
                entity.pos,
                entity.is_asteroid(),
                entity.question.text.clone(),
                entity.answer(),
            ));
        }
    }

    for (id, pos, is_asteroid, question, answer) in landed {
        if is_asteroid {
            state.push_event(GameEvent::ReachedTarget {
                id,
                pos,
                question,
                answer,
            });
            lose_life(state);
            if state.phase != GamePhase::Playing {
                return;
            }
        } else {
            log::debug!("Power-up {} lost", id);
            state.push_event(GameEvent::PowerUpLost { id });
        }
    }

    state.compact();
    check_victory(state);
}

fn expire_effects(state: &mut SessionState, now: u64) {
    for effect in state.effects.expire(now) {
        if effect == TimedEffect::Slowdown {
            for asteroid in state.entities.iter_mut().filter(|e| e.is_asteroid()) {
                asteroid.remove_slowdown();
            }
        }
        log::debug!("{:?} expired", effect);
        state.push_event(GameEvent::EffectExpired { effect });
    }
}

fn spawn_due(state: &SessionState, now: u64) -> bool {
    if state.effects.is_frozen() {
        return false;
    }
    let since_last = state.last_spawn.map(|t| now.saturating_sub(t));
    match state.config.spawn_policy {
        SpawnPolicy::Normal => {
            let difficulty = state.config.difficulty;
            state.asteroid_count() < difficulty.max_asteroids()
                && since_last.is_none_or(|d| d > difficulty.spawn_delay_ms())
        }
        SpawnPolicy::Relentless(level) => {
            since_last.is_none_or(|d| d > level.spawn_interval_ms())
        }
    }
}

/// Spawn one asteroid whose answer avoids everything on screen
pub fn spawn_asteroid(state: &mut SessionState, now: u64) -> u32 {
    let existing = state.live_answers();
    let id = state.next_entity_id();
    let mut asteroid = FallingEntity::asteroid(
        id,
        state.config.arena,
        &state.config.operation,
        state.config.difficulty,
        &existing,
        SpawnOptions::default(),
        now,
        &mut state.rng,
    );
    if state.effects.slowdown_active() {
        asteroid.apply_slowdown(SLOWDOWN_FACTOR);
    }
    log::debug!("Spawned asteroid {}: {}", id, asteroid.question.text);
    state.entities.push(asteroid);
    state.push_event(GameEvent::AsteroidSpawned { id });
    id
}

/// Power-up types that may currently drop
pub fn eligible_power_ups(state: &SessionState) -> Vec<PowerUpKind> {
    let multishot_allowed = state.config.split_mode || state.config.spawn_policy.is_relentless();
    PowerUpKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            PowerUpKind::ExtraLife => state.lives < MAX_LIVES,
            PowerUpKind::Multishot => multishot_allowed,
            _ => true,
        })
        .collect()
}

/// Spawn a power-up of `kind` unless one is already on screen
pub fn spawn_power_up(state: &mut SessionState, kind: PowerUpKind, now: u64) -> Option<u32> {
    if state.power_up().is_some() {
        return None;
    }
    let existing = state.live_answers();
    let id = state.next_entity_id();
    let power_up = FallingEntity::power_up(
        id,
        kind,
        state.config.arena,
        &state.config.operation,
        state.config.difficulty,
        &existing,
        now,
        &mut state.rng,
    );
    log::debug!("Spawned {} power-up {}", kind.as_str(), id);
    state.entities.push(power_up);
    state.push_event(GameEvent::PowerUpSpawned { id, kind });
    Some(id)
}

fn try_spawn_power_up(state: &mut SessionState, now: u64) {
    if state.power_up().is_some() || !state.rng.random_bool(POWERUP_SPAWN_CHANCE) {
        return;
    }
    let eligible = eligible_power_ups(state);
    if let Some(&kind) = eligible.choose(&mut state.rng) {
        spawn_power_up(state, kind, now);
    }
}

/// Resolve a submitted answer
pub fn resolve_answer(state: &mut SessionState, answer: i32, now: u64) -> AnswerOutcome {
    if state.phase != GamePhase::Playing {
        return AnswerOutcome::Ignored;
    }

    // Power-ups take priority over asteroids
    if let Some(idx) = state
        .entities
        .iter()
        .position(|e| e.active && e.power_up_kind().is_some() && e.answer() == answer)
    {
        return collect_power_up(state, idx, now);
    }

    // Closest matching asteroid to the planet; first found wins ties
    let mut matched: Option<usize> = None;
    let mut max_y = f32::NEG_INFINITY;
    for (i, e) in state.entities.iter().enumerate() {
        if e.active && e.is_asteroid() && e.answer() == answer && e.pos.y > max_y {
            max_y = e.pos.y;
            matched = Some(i);
        }
    }

    if let Some(idx) = matched {
        correct_answer(state, idx, now)
    } else if state.entities.iter().any(|e| e.active) {
        wrong_answer(state, answer, now)
    } else {
        AnswerOutcome::Ignored
    }
}

fn collect_power_up(state: &mut SessionState, idx: usize, now: u64) -> AnswerOutcome {
    let entity = &mut state.entities[idx];
    entity.active = false;
    let Some(kind) = entity.power_up_kind() else {
        return AnswerOutcome::Ignored;
    };
    let pos = entity.pos;
    let record = AnswerRecord::new(
        &entity.question,
        None,
        now.saturating_sub(entity.spawn_time),
    );

    let collected = state.effects.collect(kind, &mut state.lives);
    log::debug!("Collected {} power-up", kind.as_str());
    state.push_event(GameEvent::PowerUpCollected { kind, pos });
    if let Collected::ExtraLife { lives } = collected {
        state.push_event(GameEvent::LifeGained { lives });
    }
    state.compact();
    AnswerOutcome::PowerUpCollected { kind, record }
}

fn correct_answer(state: &mut SessionState, idx: usize, now: u64) -> AnswerOutcome {
    let combo = state.combo;
    let entity = &mut state.entities[idx];
    entity.hit = true;
    entity.active = false;

    let id = entity.id;
    let pos = entity.pos;
    let time_bonus = entity.time_bonus(now);
    let points = points_for(combo, time_bonus);
    let visual_delay_ms = entity.laser_delay_ms();
    let record = AnswerRecord::new(
        &entity.question,
        None,
        now.saturating_sub(entity.spawn_time),
    );
    let parent = entity.can_split().then(|| entity.clone());

    if combo > 1 && combo % COMBO_MILESTONE == 0 {
        state.push_event(GameEvent::ComboMilestone { combo, pos });
    }

    state.score += points;
    state.max_combo = state.max_combo.max(combo);
    state.combo += 1;
    state.asteroids_destroyed += 1;
    state.push_event(GameEvent::AsteroidDestroyed {
        id,
        pos,
        points,
        combo,
        time_bonus,
        visual_delay_ms,
        secondary: false,
    });

    if let Some(parent) = parent.filter(|_| state.config.split_mode) {
        split(state, &parent, now);
    }

    try_spawn_power_up(state, now);

    if state.effects.multishot_active() {
        multishot_strike(state);
    }

    state.compact();
    check_victory(state);

    AnswerOutcome::Correct { id, points, record }
}

fn split(state: &mut SessionState, parent: &FallingEntity, now: u64) {
    let existing = state.live_answers();
    let ids = [state.next_entity_id(), state.next_entity_id()];
    let fragments = parent.fragments(
        ids,
        &state.config.operation,
        state.config.difficulty,
        &existing,
        now,
        &mut state.rng,
    );
    for mut fragment in fragments {
        if state.effects.slowdown_active() {
            fragment.apply_slowdown(SLOWDOWN_FACTOR);
        }
        state.entities.push(fragment);
    }
    state.push_event(GameEvent::FragmentsSpawned {
        parent: parent.id,
        children: ids,
    });
}

/// Destroy the unhit asteroid closest to the planet for a flat reward
fn multishot_strike(state: &mut SessionState) {
    let Some(idx) = state.nearest_asteroid() else {
        return;
    };
    let entity = &mut state.entities[idx];
    entity.hit = true;
    entity.active = false;
    let event = GameEvent::AsteroidDestroyed {
        id: entity.id,
        pos: entity.pos,
        points: MULTISHOT_POINTS,
        combo: 1,
        time_bonus: 1.0,
        visual_delay_ms: entity.laser_delay_ms(),
        secondary: true,
    };
    state.score += MULTISHOT_POINTS;
    state.asteroids_destroyed += 1;
    state.push_event(event);
}

fn wrong_answer(state: &mut SessionState, given: i32, now: u64) -> AnswerOutcome {
    state.combo = 1;
    state.push_event(GameEvent::WrongAnswer { given });

    // Best guess at the intended target: the asteroid closest to landing,
    // else the power-up
    let target = state
        .nearest_asteroid()
        .or_else(|| state.entities.iter().position(|e| e.active));
    let Some(entity) = target.map(|idx| &state.entities[idx]) else {
        return AnswerOutcome::Ignored;
    };
    let record = AnswerRecord::new(
        &entity.question,
        Some(given),
        now.saturating_sub(entity.spawn_time),
    );
    AnswerOutcome::Wrong { record }
}

/// An asteroid got through. The shield absorbs one impact.
pub fn lose_life(state: &mut SessionState) {
    if state.effects.absorb_impact() {
        log::debug!("Shield absorbed an impact");
        state.push_event(GameEvent::ShieldBlocked);
        return;
    }

    state.lives = state.lives.saturating_sub(1);
    state.combo = 1;
    state.push_event(GameEvent::LifeLost { lives: state.lives });

    if state.lives == 0 {
        end_session(state, GamePhase::Lost);
    }
}

/// Activate the stored power-up. No-op when nothing is stored.
pub fn activate_power_up(state: &mut SessionState, now: u64) -> Option<Activation> {
    if state.phase != GamePhase::Playing {
        return None;
    }
    let kind = state.effects.stored?;
    let activation = state.effects.activate(now)?;

    match activation {
        Activation::Repulsor { duration_ms } => {
            for asteroid in state.entities.iter_mut().filter(|e| e.active && e.is_asteroid()) {
                asteroid.apply_repulsion(now, duration_ms);
            }
        }
        Activation::Slowdown { factor, .. } => {
            for asteroid in state.entities.iter_mut().filter(|e| e.active && e.is_asteroid()) {
                asteroid.apply_slowdown(factor);
            }
        }
        Activation::Shield | Activation::Freeze { .. } | Activation::Multishot { .. } => {}
    }

    log::debug!("Activated {}", kind.as_str());
    state.push_event(GameEvent::PowerUpActivated { kind });
    Some(activation)
}

fn check_victory(state: &mut SessionState) {
    if state.phase != GamePhase::Playing {
        return;
    }
    let won = match state.config.mode {
        GameMode::Infinite => false,
        GameMode::Time { limit_ms } => state.time_ms >= limit_ms,
        GameMode::Asteroids { target } => state.asteroids_destroyed >= target,
    };
    if won {
        end_session(state, GamePhase::Won);
    }
}

/// Move to a terminal phase and tear down entities and timers
pub fn end_session(state: &mut SessionState, phase: GamePhase) {
    state.phase = phase;
    state.entities.clear();
    state.effects = Default::default();
    match phase {
        GamePhase::Won => {
            log::info!("Victory with {} points", state.score);
            state.push_event(GameEvent::Victory);
        }
        GamePhase::Lost => {
            log::info!("Defeat with {} points", state.score);
            state.push_event(GameEvent::Defeat);
        }
        _ => {}
    }
}

/// Toggle the paused phase
pub fn set_paused(state: &mut SessionState, paused: bool) {
    match (state.phase, paused) {
        (GamePhase::Playing, true) => state.phase = GamePhase::Paused,
        (GamePhase::Paused, false) => state.phase = GamePhase::Playing,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{Arena, Difficulty};
    use crate::sim::question::{OperationConfig, Operator, Question};
    use crate::sim::state::{RelentlessLevel, SessionConfig};
    use std::collections::HashSet;

    fn session(config: SessionConfig) -> SessionState {
        SessionState::new(SessionConfig {
            operation: OperationConfig::multiplication([7]),
            ..config
        })
    }

    fn place_asteroid(state: &mut SessionState, answer: i32, y: f32, now: u64) -> u32 {
        let id = state.next_entity_id();
        let mut asteroid = FallingEntity::asteroid(
            id,
            state.config.arena,
            &state.config.operation,
            state.config.difficulty,
            &HashSet::new(),
            SpawnOptions::default(),
            now,
            &mut state.rng,
        );
        asteroid.question = Question {
            text: format!("{} × 1", answer),
            answer,
            operator: Operator::Mul,
            table: Some(answer),
        };
        asteroid.pos.y = y;
        state.entities.push(asteroid);
        id
    }

    fn place_power_up(state: &mut SessionState, kind: PowerUpKind, answer: i32) -> u32 {
        let id = spawn_power_up(state, kind, 0).unwrap();
        let power_up = state.entities.iter_mut().find(|e| e.id == id).unwrap();
        power_up.question.answer = answer;
        id
    }

    fn asteroid_ids(state: &SessionState) -> Vec<u32> {
        state.asteroids().map(|a| a.id).collect()
    }

    #[test]
    fn test_points_formula() {
        assert_eq!(points_for(3, 1.5), 450);
        assert_eq!(points_for(1, 1.2), 120);
        assert_eq!(points_for(7, 1.2), 840);
    }

    #[test]
    fn test_first_tick_spawns_table_question() {
        let mut state = session(SessionConfig::default());
        tick(&mut state, 16);
        assert_eq!(state.asteroid_count(), 1);
        let q = &state.asteroids().next().unwrap().question;
        assert_eq!(q.answer % 7, 0);
        assert!((7..=70).contains(&q.answer));
        assert!(q.text.starts_with("7 × "));
    }

    #[test]
    fn test_normal_spawn_respects_cap() {
        let mut state = session(SessionConfig::default());
        for t in 1..300 {
            tick(&mut state, t * 16);
        }
        // Medium allows one asteroid at a time
        assert_eq!(state.asteroid_count(), 1);
    }

    #[test]
    fn test_normal_spawn_waits_for_delay() {
        // Hard allows two on screen, so only the delay holds the second back
        let mut state = session(SessionConfig {
            difficulty: Difficulty::Hard,
            ..SessionConfig::default()
        });
        tick(&mut state, 16);
        assert_eq!(state.asteroid_count(), 1);
        assert_eq!(state.last_spawn, Some(16));

        let mut t = 16;
        while t < 16 + Difficulty::Hard.spawn_delay_ms() {
            t += 16;
            tick(&mut state, t);
            assert_eq!(state.asteroid_count(), 1, "second spawn at {}", t);
        }
        t += 16;
        tick(&mut state, t);
        assert_eq!(state.asteroid_count(), 2);
        assert_eq!(state.last_spawn, Some(t));
    }

    #[test]
    fn test_relentless_ignores_cap() {
        let mut state = session(SessionConfig {
            spawn_policy: SpawnPolicy::Relentless(RelentlessLevel::Three),
            difficulty: Difficulty::Easy,
            ..SessionConfig::default()
        });
        for t in 1..=200 {
            tick(&mut state, t * 16);
        }
        // Spawns at 16ms then every >600ms up to 3200ms
        assert!(state.asteroid_count() >= 5);
    }

    #[test]
    fn test_correct_answer_scores_and_removes() {
        let mut state = session(SessionConfig::default());
        state.combo = 3;
        let id = place_asteroid(&mut state, 21, 100.0, 0);
        let outcome = resolve_answer(&mut state, 21, 2_500);
        match outcome {
            AnswerOutcome::Correct {
                id: hit, points, record,
            } => {
                assert_eq!(hit, id);
                assert_eq!(points, 450);
                assert_eq!(record.correct_answer, 21);
                assert_eq!(record.response_time_ms, 2_500);
                assert_eq!(record.given_answer, None);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(state.score, 450);
        assert_eq!(state.combo, 4);
        assert_eq!(state.asteroids_destroyed, 1);
        assert!(!asteroid_ids(&state).contains(&id));
    }

    #[test]
    fn test_closest_matching_asteroid_wins() {
        let mut state = session(SessionConfig::default());
        let far = place_asteroid(&mut state, 14, 100.0, 0);
        let near = place_asteroid(&mut state, 14, 500.0, 0);
        resolve_answer(&mut state, 14, 100);
        assert_eq!(asteroid_ids(&state), vec![far]);
        assert!(!asteroid_ids(&state).contains(&near));
    }

    #[test]
    fn test_combo_monotonic_and_reset() {
        let mut state = session(SessionConfig::default());
        // Answers outside the 7 table so a dropped power-up never collides
        for n in 1..=6u32 {
            place_asteroid(&mut state, 1_000 + n as i32, 100.0, 0);
            assert_eq!(state.combo, n);
            assert!(matches!(
                resolve_answer(&mut state, 1_000 + n as i32, 10),
                AnswerOutcome::Correct { .. }
            ));
        }
        assert_eq!(state.max_combo, 6);

        place_asteroid(&mut state, 7, 100.0, 0);
        assert!(matches!(
            resolve_answer(&mut state, 8, 10),
            AnswerOutcome::Wrong { .. }
        ));
        assert_eq!(state.combo, 1);
        assert_eq!(state.max_combo, 6);
    }

    #[test]
    fn test_wrong_answer_records_nearest_asteroid() {
        let mut state = session(SessionConfig::default());
        state.combo = 4;
        place_asteroid(&mut state, 14, 100.0, 0);
        place_asteroid(&mut state, 28, 600.0, 1_000);
        match resolve_answer(&mut state, 99, 3_000) {
            AnswerOutcome::Wrong { record } => {
                assert_eq!(record.correct_answer, 28);
                assert_eq!(record.given_answer, Some(99));
                assert_eq!(record.response_time_ms, 2_000);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(state.combo, 1);
        assert_eq!(state.asteroid_count(), 2);
    }

    #[test]
    fn test_empty_screen_has_no_penalty() {
        let mut state = session(SessionConfig::default());
        state.combo = 5;
        assert_eq!(resolve_answer(&mut state, 42, 0), AnswerOutcome::Ignored);
        assert_eq!(state.combo, 5);
    }

    #[test]
    fn test_power_up_match_takes_priority() {
        let mut state = session(SessionConfig::default());
        let asteroid = place_asteroid(&mut state, 35, 500.0, 0);
        place_power_up(&mut state, PowerUpKind::Freeze, 35);
        assert!(matches!(
            resolve_answer(&mut state, 35, 100),
            AnswerOutcome::PowerUpCollected {
                kind: PowerUpKind::Freeze,
                ..
            }
        ));
        assert_eq!(state.effects.stored, Some(PowerUpKind::Freeze));
        assert_eq!(asteroid_ids(&state), vec![asteroid]);
        assert!(state.power_up().is_none());
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_wrong_answer_with_only_power_up() {
        let mut state = session(SessionConfig::default());
        place_power_up(&mut state, PowerUpKind::Shield, 12);
        assert!(matches!(
            resolve_answer(&mut state, 13, 100),
            AnswerOutcome::Wrong { .. }
        ));
    }

    #[test]
    fn test_extra_life_applies_immediately() {
        let mut state = session(SessionConfig::default());
        state.lives = MAX_LIVES;
        place_power_up(&mut state, PowerUpKind::ExtraLife, 12);
        resolve_answer(&mut state, 12, 100);
        assert_eq!(state.lives, MAX_LIVES);
        assert_eq!(state.effects.stored, None);

        state.lives = 2;
        place_power_up(&mut state, PowerUpKind::ExtraLife, 12);
        resolve_answer(&mut state, 12, 100);
        assert_eq!(state.lives, 3);
    }

    #[test]
    fn test_shield_absorbs_one_impact() {
        let mut state = session(SessionConfig::default());
        state.effects.stored = Some(PowerUpKind::Shield);
        assert_eq!(activate_power_up(&mut state, 0), Some(Activation::Shield));

        lose_life(&mut state);
        assert_eq!(state.lives, STARTING_LIVES);
        assert!(!state.effects.shield_active);

        lose_life(&mut state);
        assert_eq!(state.lives, STARTING_LIVES - 1);
    }

    #[test]
    fn test_asteroid_landing_costs_life() {
        let mut state = session(SessionConfig::default());
        state.combo = 3;
        let earth_line = state.config.arena.earth_line();
        place_asteroid(&mut state, 7, earth_line - 60.5, 0);
        state.last_spawn = Some(0);
        tick(&mut state, 100);
        assert_eq!(state.lives, STARTING_LIVES - 1);
        assert_eq!(state.combo, 1);
        assert!(state.events.iter().any(|e| matches!(e, GameEvent::ReachedTarget { answer: 7, .. })));
    }

    #[test]
    fn test_defeat_when_out_of_lives() {
        let mut state = session(SessionConfig::default());
        place_asteroid(&mut state, 7, 0.0, 0);
        for _ in 0..STARTING_LIVES {
            lose_life(&mut state);
        }
        assert_eq!(state.phase, GamePhase::Lost);
        assert!(state.entities.is_empty());
        assert_eq!(state.events.last(), Some(&GameEvent::Defeat));
        assert_eq!(resolve_answer(&mut state, 7, 0), AnswerOutcome::Ignored);
    }

    #[test]
    fn test_freeze_halts_asteroids_not_power_ups() {
        let mut state = session(SessionConfig::default());
        place_asteroid(&mut state, 7, 100.0, 0);
        place_power_up(&mut state, PowerUpKind::Shield, 99);
        state.effects.stored = Some(PowerUpKind::Freeze);
        state.last_spawn = Some(0);
        activate_power_up(&mut state, 0);

        let asteroid_pos: Vec<_> = state.asteroids().map(|a| a.pos).collect();
        let power_up_pos = state.power_up().unwrap().pos;
        let count = state.entities.len();
        for t in 1..=312 {
            tick(&mut state, t * 16);
        }
        assert_eq!(state.asteroids().map(|a| a.pos).collect::<Vec<_>>(), asteroid_pos);
        assert_eq!(state.entities.len(), count);
        assert_ne!(state.power_up().unwrap().pos, power_up_pos);

        tick(&mut state, 5_008);
        assert!(!state.effects.is_frozen());
        assert_ne!(state.asteroids().next().unwrap().pos, asteroid_pos[0]);
    }

    #[test]
    fn test_repulsor_pushes_every_asteroid() {
        let mut state = session(SessionConfig::default());
        place_asteroid(&mut state, 7, 300.0, 0);
        place_asteroid(&mut state, 14, 400.0, 0);
        state.effects.stored = Some(PowerUpKind::Repulsor);
        let activation = activate_power_up(&mut state, 1_000);
        assert_eq!(
            activation,
            Some(Activation::Repulsor {
                duration_ms: REPULSION_DURATION_MS
            })
        );
        for asteroid in state.asteroids() {
            assert!(asteroid.repelled);
            assert_eq!(asteroid.repel_end, 1_000 + REPULSION_DURATION_MS);
            assert!(asteroid.vel.y < 0.0);
        }
        assert_eq!(state.effects.stored, None);
    }

    #[test]
    fn test_slowdown_covers_new_spawns_and_reverts() {
        let mut state = session(SessionConfig::default());
        place_asteroid(&mut state, 7, 100.0, 0);
        state.effects.stored = Some(PowerUpKind::Slowdown);
        activate_power_up(&mut state, 0);
        assert_eq!(state.asteroids().next().unwrap().slowdown_factor, SLOWDOWN_FACTOR);

        let spawned = spawn_asteroid(&mut state, 10);
        let fresh = state.entities.iter().find(|e| e.id == spawned).unwrap();
        assert_eq!(fresh.slowdown_factor, SLOWDOWN_FACTOR);

        state.last_spawn = Some(SLOWDOWN_DURATION_MS);
        tick(&mut state, SLOWDOWN_DURATION_MS);
        assert!(!state.effects.slowdown_active());
        assert!(state.asteroids().all(|a| a.slowdown_factor == 1.0));
    }

    #[test]
    fn test_split_mode_spawns_fragments() {
        let mut state = session(SessionConfig {
            split_mode: true,
            ..SessionConfig::default()
        });
        state.config.operation = OperationConfig::multiplication(1..=10);
        let parent = place_asteroid(&mut state, 7, 200.0, 0);
        let parent_size = state.entities[0].size;
        resolve_answer(&mut state, 7, 100);

        let fragments: Vec<_> = state.asteroids().filter(|a| a.is_fragment()).collect();
        assert_eq!(fragments.len(), 2);
        for f in &fragments {
            assert!((f.size - parent_size * FRAGMENT_SCALE).abs() < 1e-6);
            assert!(!f.can_split());
        }
        assert_ne!(fragments[0].answer(), fragments[1].answer());
        assert!(state.events.iter().any(
            |e| matches!(e, GameEvent::FragmentsSpawned { parent: p, .. } if *p == parent)
        ));

        // Fragments never split again
        let answer = fragments[0].answer();
        let before = state.asteroid_count();
        resolve_answer(&mut state, answer, 200);
        assert_eq!(state.asteroid_count(), before - 1);
    }

    #[test]
    fn test_multishot_destroys_extra_asteroid() {
        let mut state = session(SessionConfig::default());
        place_asteroid(&mut state, 7, 100.0, 0);
        let nearest = place_asteroid(&mut state, 14, 700.0, 0);
        let other = place_asteroid(&mut state, 21, 300.0, 0);
        state.effects.stored = Some(PowerUpKind::Multishot);
        activate_power_up(&mut state, 0);

        resolve_answer(&mut state, 7, 100);
        assert_eq!(asteroid_ids(&state), vec![other]);
        assert_eq!(state.score, 200 + MULTISHOT_POINTS);
        assert_eq!(state.asteroids_destroyed, 2);
        assert!(state.events.iter().any(|e| matches!(
            e,
            GameEvent::AsteroidDestroyed { id, secondary: true, points: 50, .. } if *id == nearest
        )));
    }

    #[test]
    fn test_asteroids_mode_victory() {
        let mut state = session(SessionConfig {
            mode: GameMode::Asteroids { target: 5 },
            ..SessionConfig::default()
        });
        for n in 1..=5 {
            place_asteroid(&mut state, 1_000 + n, 100.0, 0);
            resolve_answer(&mut state, 1_000 + n, 10);
            if n < 5 {
                assert_eq!(state.phase, GamePhase::Playing);
            }
        }
        assert_eq!(state.phase, GamePhase::Won);
        assert_eq!(state.lives, STARTING_LIVES);
        assert_eq!(state.events.last(), Some(&GameEvent::Victory));
    }

    #[test]
    fn test_time_mode_victory() {
        let mut state = session(SessionConfig {
            mode: GameMode::Time { limit_ms: 1_000 },
            difficulty: Difficulty::Easy,
            ..SessionConfig::default()
        });
        let mut t = 0;
        while state.phase == GamePhase::Playing {
            t += 50;
            tick(&mut state, t);
        }
        assert_eq!(state.phase, GamePhase::Won);
        assert_eq!(t, 1_000);
    }

    #[test]
    fn test_eligible_power_ups() {
        let mut state = session(SessionConfig::default());
        let kinds = eligible_power_ups(&state);
        assert!(kinds.contains(&PowerUpKind::ExtraLife));
        assert!(!kinds.contains(&PowerUpKind::Multishot));

        state.lives = MAX_LIVES;
        state.config.split_mode = true;
        let kinds = eligible_power_ups(&state);
        assert!(!kinds.contains(&PowerUpKind::ExtraLife));
        assert!(kinds.contains(&PowerUpKind::Multishot));
    }

    #[test]
    fn test_single_power_up_on_screen() {
        let mut state = session(SessionConfig::default());
        assert!(spawn_power_up(&mut state, PowerUpKind::Shield, 0).is_some());
        assert!(spawn_power_up(&mut state, PowerUpKind::Freeze, 0).is_none());
    }

    #[test]
    fn test_power_up_roll() {
        let mut state = session(SessionConfig {
            seed: 99,
            ..SessionConfig::default()
        });
        state.lives = MAX_LIVES;
        let mut spawned = 0;
        for _ in 0..1_000 {
            try_spawn_power_up(&mut state, 0);
            if let Some(kind) = state.power_up().and_then(|p| p.power_up_kind()) {
                assert!(kind != PowerUpKind::ExtraLife && kind != PowerUpKind::Multishot);
                spawned += 1;
                state.entities.clear();
            }
        }
        // 15% of 1000 rolls
        assert!((80..=230).contains(&spawned), "{} capsules", spawned);

        spawn_power_up(&mut state, PowerUpKind::Shield, 0);
        for _ in 0..200 {
            try_spawn_power_up(&mut state, 0);
        }
        assert_eq!(state.entities.iter().filter(|e| !e.is_asteroid()).count(), 1);
    }

    #[test]
    fn test_multishot_expires_through_tick() {
        let mut state = session(SessionConfig::default());
        state.effects.stored = Some(PowerUpKind::Multishot);
        activate_power_up(&mut state, 0);

        tick(&mut state, MULTISHOT_DURATION_MS - 16);
        assert!(state.effects.multishot_active());
        tick(&mut state, MULTISHOT_DURATION_MS);
        assert!(!state.effects.multishot_active());
        assert!(state.events.contains(&GameEvent::EffectExpired {
            effect: TimedEffect::Multishot
        }));
    }

    #[test]
    fn test_pause_stops_ticks() {
        let mut state = session(SessionConfig::default());
        set_paused(&mut state, true);
        tick(&mut state, 16);
        assert!(state.entities.is_empty());
        set_paused(&mut state, false);
        tick(&mut state, 32);
        assert_eq!(state.asteroid_count(), 1);
    }

    #[test]
    fn test_determinism() {
        let config = SessionConfig {
            seed: 99_999,
            arena: Arena::new(1280.0, 720.0),
            ..SessionConfig::default()
        };
        let mut a = session(config.clone());
        let mut b = session(config);
        for t in 1..500 {
            tick(&mut a, t * 16);
            tick(&mut b, t * 16);
        }
        assert_eq!(a.entities.len(), b.entities.len());
        for (x, y) in a.entities.iter().zip(&b.entities) {
            assert_eq!(x.question, y.question);
            assert_eq!(x.pos, y.pos);
        }
        assert_eq!(a.lives, b.lives);
    }
}
