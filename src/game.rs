//! Session driver
//!
//! `Game` owns one session and its collaborators: the clock that provides
//! session time, and the profile service answers and results are forwarded
//! to. The presentation layer calls `update` once per frame, forwards player
//! input, and drains events for feedback.

use crate::persistence::{GameSummary, ProfileService};
use crate::platform::Clock;
use crate::sim::tick::end_session;
use crate::sim::{
    Activation, AnswerOutcome, FallingEntity, GameEvent, GamePhase, OperationConfig,
    SessionConfig, SessionState, activate_power_up, resolve_answer, set_paused, tick,
};
use crate::stats::training_config;

/// How a finished session went
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub summary: GameSummary,
    /// Score reached the profile's best (guests: any non-zero score)
    pub is_new_record: bool,
    /// Leaderboard rank, if an entry was posted
    pub rank: Option<usize>,
}

/// One play session
pub struct Game<P: ProfileService> {
    state: SessionState,
    profiles: P,
    profile_id: Option<String>,
    clock: Box<dyn Clock>,
    /// Clock time the session started
    started_at: u64,
    /// Clock time of the current pause
    paused_at: Option<u64>,
    paused_total: u64,
    result: Option<GameResult>,
}

impl<P: ProfileService> Game<P> {
    pub fn new(
        config: SessionConfig,
        profiles: P,
        profile_id: Option<String>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let started_at = clock.now_ms();
        log::info!(
            "Session started: {} / {} / {} (seed {})",
            config.mode.as_str(),
            config.difficulty.as_str(),
            config.operation.op.as_str(),
            config.seed
        );
        Self {
            state: SessionState::new(config),
            profiles,
            profile_id,
            clock,
            started_at,
            paused_at: None,
            paused_total: 0,
            result: None,
        }
    }

    /// Start over with a new configuration, keeping profile and clock
    pub fn restart(&mut self, config: SessionConfig) {
        log::info!("Session restarted (seed {})", config.seed);
        self.state = SessionState::new(config);
        self.started_at = self.clock.now_ms();
        self.paused_at = None;
        self.paused_total = 0;
        self.result = None;
    }

    /// Swap in a session state, e.g. one restored from a snapshot. Session
    /// time keeps running from the current clock.
    pub fn load_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Milliseconds of play so far. Paused time does not count.
    pub fn session_time(&self) -> u64 {
        let now = self.paused_at.unwrap_or_else(|| self.clock.now_ms());
        now.saturating_sub(self.started_at)
            .saturating_sub(self.paused_total)
    }

    /// Advance the simulation to the current clock time. Returns false once
    /// the session is over.
    pub fn update(&mut self) -> bool {
        if self.state.phase.is_over() {
            return false;
        }
        let now = self.session_time();
        tick(&mut self.state, now);
        self.finish_if_over();
        !self.state.phase.is_over()
    }

    /// Parse and submit typed input. Non-numeric or empty input is rejected
    /// here and never reaches the simulation.
    pub fn submit_input(&mut self, input: &str) -> Option<AnswerOutcome> {
        let answer = input.trim().parse::<i32>().ok()?;
        Some(self.submit_answer(answer))
    }

    pub fn submit_answer(&mut self, answer: i32) -> AnswerOutcome {
        if self.state.phase != GamePhase::Playing {
            return AnswerOutcome::Ignored;
        }
        let now = self.session_time();
        let outcome = resolve_answer(&mut self.state, answer, now);

        if let (Some((record, correct)), Some(id)) = (outcome.record(), self.profile_id.as_deref()) {
            self.profiles.record_answer(id, record, correct);
        }

        self.finish_if_over();
        outcome
    }

    /// Activate the stored power-up, if any
    pub fn toggle_power_up(&mut self) -> Option<Activation> {
        let now = self.session_time();
        activate_power_up(&mut self.state, now)
    }

    pub fn pause(&mut self) {
        if self.state.phase != GamePhase::Playing {
            return;
        }
        set_paused(&mut self.state, true);
        self.paused_at = Some(self.clock.now_ms());
        log::info!("Paused");
    }

    pub fn resume(&mut self) {
        if self.state.phase != GamePhase::Paused {
            return;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += self.clock.now_ms().saturating_sub(paused_at);
        }
        set_paused(&mut self.state, false);
        log::info!("Resumed");
    }

    /// Abandon the session. Nothing is recorded.
    pub fn quit(&mut self) {
        if self.state.phase.is_over() {
            return;
        }
        if self.paused_at.is_some() {
            self.resume();
        }
        end_session(&mut self.state, GamePhase::Abandoned);
        log::info!("Session abandoned at {} points", self.state.score);
    }

    /// Take every pending event, oldest first
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.state.events)
    }

    pub fn entities(&self) -> &[FallingEntity] {
        &self.state.entities
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    pub fn into_profiles(self) -> P {
        self.profiles
    }

    /// High score of the active profile (0 for guests)
    pub fn high_score(&self) -> u64 {
        self.profile_id
            .as_deref()
            .map(|id| self.profiles.high_score(id))
            .unwrap_or(0)
    }

    /// Drill built from the active profile's weak areas
    pub fn training_operation(&self, fallback: &OperationConfig) -> Option<OperationConfig> {
        let id = self.profile_id.as_deref()?;
        training_config(&self.profiles.weak_areas(id), fallback)
    }

    fn finish_if_over(&mut self) {
        if self.result.is_some() || !matches!(self.state.phase, GamePhase::Won | GamePhase::Lost) {
            return;
        }

        let summary = GameSummary {
            score: self.state.score,
            max_combo: self.state.max_combo,
            asteroids_destroyed: self.state.asteroids_destroyed,
            mode: self.state.config.mode,
            difficulty: self.state.config.difficulty,
            outcome: self.state.phase,
            duration_ms: self.session_time(),
        };
        let previous_best = self.high_score();
        let is_new_record = summary.score > 0 && summary.score >= previous_best;
        let rank = self
            .profiles
            .record_game(self.profile_id.as_deref(), &summary);

        log::info!(
            "Game over ({:?}): {} points, best combo {}, {} destroyed{}",
            summary.outcome,
            summary.score,
            summary.max_combo,
            summary.asteroids_destroyed,
            if is_new_record { ", new record" } else { "" }
        );
        self.result = Some(GameResult {
            summary,
            is_new_record,
            rank,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryProfiles;
    use crate::platform::ManualClock;
    use crate::sim::{GameMode, OperationConfig};

    fn game(config: SessionConfig) -> (Game<MemoryProfiles>, ManualClock) {
        let clock = ManualClock::new(10_000);
        let profiles = MemoryProfiles::new().with_profile("p1", "Ada");
        let game = Game::new(
            config,
            profiles,
            Some("p1".to_string()),
            Box::new(clock.clone()),
        );
        (game, clock)
    }

    fn config() -> SessionConfig {
        SessionConfig {
            operation: OperationConfig::multiplication([7]),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_pause_freezes_session_time() {
        let (mut game, clock) = game(config());
        clock.advance(1_000);
        assert_eq!(game.session_time(), 1_000);

        game.pause();
        clock.advance(60_000);
        assert_eq!(game.session_time(), 1_000);
        assert!(game.update());
        assert_eq!(game.submit_answer(7), AnswerOutcome::Ignored);

        game.resume();
        clock.advance(16);
        assert_eq!(game.session_time(), 1_016);
    }

    #[test]
    fn test_input_parsing() {
        let (mut game, clock) = game(config());
        clock.advance(16);
        game.update();
        assert_eq!(game.submit_input(""), None);
        assert_eq!(game.submit_input("abc"), None);

        let answer = game.entities()[0].answer();
        let outcome = game.submit_input(&format!(" {} ", answer));
        assert!(matches!(outcome, Some(AnswerOutcome::Correct { .. })));
        assert_eq!(game.profiles().answers.len(), 1);
        assert!(game.profiles().answers[0].2);
    }

    #[test]
    fn test_guest_answers_not_recorded() {
        let clock = ManualClock::new(0);
        let mut game = Game::new(config(), MemoryProfiles::new(), None, Box::new(clock.clone()));
        clock.advance(16);
        game.update();
        let answer = game.entities()[0].answer();
        game.submit_answer(answer + 1);
        assert!(game.profiles().answers.is_empty());
        assert_eq!(game.high_score(), 0);
    }

    #[test]
    fn test_defeat_records_game() {
        let (mut game, clock) = game(SessionConfig {
            difficulty: crate::sim::Difficulty::Hard,
            ..config()
        });
        while game.update() {
            clock.advance(50);
        }
        assert_eq!(game.phase(), GamePhase::Lost);
        let result = game.result().unwrap();
        assert_eq!(result.summary.score, 0);
        assert!(!result.is_new_record);
        assert_eq!(result.rank, None);

        let profiles = game.into_profiles();
        assert_eq!(profiles.profile("p1").unwrap().lifetime.total_games_played, 1);
        assert!(profiles.leaderboard.is_empty());
    }

    #[test]
    fn test_quit_records_nothing() {
        let (mut game, clock) = game(config());
        clock.advance(16);
        game.update();
        game.pause();
        game.quit();
        assert_eq!(game.phase(), GamePhase::Abandoned);
        assert!(game.entities().is_empty());
        assert!(game.result().is_none());
        assert!(!game.update());
        assert_eq!(game.profiles().profile("p1").unwrap().lifetime.total_games_played, 0);
    }

    #[test]
    fn test_victory_posts_and_sets_record() {
        let (mut game, clock) = game(SessionConfig {
            mode: GameMode::Asteroids { target: 3 },
            difficulty: crate::sim::Difficulty::Easy,
            ..config()
        });
        while game.phase() == GamePhase::Playing {
            clock.advance(100);
            game.update();
            let answers: Vec<i32> = game.state().asteroids().map(|a| a.answer()).collect();
            for answer in answers {
                game.submit_answer(answer);
            }
        }
        assert_eq!(game.phase(), GamePhase::Won);
        let result = game.result().unwrap().clone();
        assert!(result.is_new_record);
        assert_eq!(result.rank, Some(1));
        assert_eq!(game.high_score(), result.summary.score);

        let events = game.drain_events();
        assert_eq!(events.last(), Some(&GameEvent::Victory));
        assert!(game.drain_events().is_empty());
    }

    #[test]
    fn test_restart_starts_fresh() {
        let (mut game, clock) = game(SessionConfig {
            mode: GameMode::Asteroids { target: 1 },
            ..config()
        });
        clock.advance(16);
        game.update();
        let answer = game.entities()[0].answer();
        game.submit_answer(answer);
        assert_eq!(game.phase(), GamePhase::Won);
        assert!(game.result().is_some());

        clock.advance(5_000);
        game.restart(config());
        assert_eq!(game.phase(), GamePhase::Playing);
        assert_eq!(game.session_time(), 0);
        assert_eq!(game.state().score, 0);
        assert!(game.result().is_none());
        assert_eq!(game.profile_id(), Some("p1"));
        assert_eq!(game.high_score(), game.profiles().profile("p1").unwrap().lifetime.high_score);
        assert!(game.high_score() > 0);
    }

    #[test]
    fn test_training_operation() {
        let (mut game, clock) = game(config());
        assert_eq!(game.training_operation(&OperationConfig::default()), None);

        // Ten wrong answers on the 7 table
        let mut wrong = 0;
        while wrong < 10 {
            clock.advance(16);
            game.update();
            if game.state().asteroid_count() > 0 {
                if let AnswerOutcome::Wrong { .. } = game.submit_answer(-1) {
                    wrong += 1;
                }
            }
        }
        let drill = game.training_operation(&OperationConfig::default()).unwrap();
        assert_eq!(drill.tables.iter().copied().collect::<Vec<_>>(), vec![7]);
    }
}
