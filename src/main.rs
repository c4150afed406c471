//! Save the Earth - headless runner
//!
//! Drives sessions with a scripted player, and manages the profile store and
//! leaderboard from the command line.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use save_the_earth::Game;
use save_the_earth::game::GameResult;
use save_the_earth::highscores::format_date;
use save_the_earth::persistence::{
    AVATARS, Avatar, COLORS, MemoryProfiles, ProfileDraft, ProfileService, ProfileStore,
};
use save_the_earth::platform::{ManualClock, unix_millis};
use save_the_earth::settings::Settings;
use save_the_earth::sim::{
    Difficulty, GameEvent, GameMode, GamePhase, OperationType, RelentlessLevel,
};

/// Frame length the scripted player runs at
const FRAME_MS: u64 = 16;

#[derive(Parser, Debug)]
#[command(name = "save-the-earth")]
#[command(about = "Arithmetic arcade trainer: headless sessions, profiles and leaderboard")]
struct Cli {
    /// Profile store (created on first write)
    #[arg(long, default_value = "profiles.json")]
    store: PathBuf,
    /// Settings file used as defaults for `simulate`
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play one session with a scripted player
    Simulate {
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, value_enum)]
        difficulty: Option<CliDifficulty>,
        /// multiplication, addition, subtraction, division, combined, fractions, percentages, powers
        #[arg(long)]
        operation: Option<String>,
        /// Comma-separated tables, e.g. 3,7,8
        #[arg(long)]
        tables: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<CliMode>,
        /// Seconds for time mode, asteroid count for asteroids mode
        #[arg(long)]
        target: Option<u64>,
        #[arg(long)]
        split: bool,
        /// Relentless spawning level (1-3)
        #[arg(long)]
        relentless: Option<u8>,
        /// Drill the profile's weak areas instead of the configured operation
        #[arg(long)]
        training: bool,
        /// Chance the scripted player answers correctly
        #[arg(long, default_value_t = 0.85)]
        accuracy: f64,
        /// Milliseconds before the scripted player answers a new asteroid
        #[arg(long, default_value_t = 2_500)]
        reaction_ms: u64,
        /// Give up after this many seconds of play
        #[arg(long, default_value_t = 300)]
        max_secs: u64,
        /// Record answers and the result to the active profile
        #[arg(long)]
        record: bool,
        /// Print every game event
        #[arg(long)]
        events: bool,
        /// Sessions to play back to back, seeds counting up from `seed`
        #[arg(long, default_value_t = 1)]
        games: u32,
    },
    /// Show the leaderboard
    Leaderboard {
        #[arg(long, value_enum)]
        mode: Option<CliMode>,
        #[arg(long, value_enum)]
        difficulty: Option<CliDifficulty>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Remove every leaderboard entry
    ResetLeaderboard,
    /// List profiles
    Profiles,
    /// Create a profile
    CreateProfile {
        #[arg(long)]
        name: String,
        /// astronaut, robot, alien, rocket, star, planet, moon, sun
        #[arg(long)]
        avatar: Option<String>,
        /// cyan, violet, red, green, yellow, pink, lime, blue
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename or restyle a profile
    UpdateProfile {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    DeleteProfile {
        id: String,
    },
    /// Select the active profile; omit the ID to play as a guest
    SelectProfile {
        id: Option<String>,
    },
    /// Lifetime and per-area statistics of a profile
    Stats {
        id: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliDifficulty {
    Easy,
    Medium,
    Hard,
}

impl From<CliDifficulty> for Difficulty {
    fn from(value: CliDifficulty) -> Self {
        match value {
            CliDifficulty::Easy => Difficulty::Easy,
            CliDifficulty::Medium => Difficulty::Medium,
            CliDifficulty::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    Infinite,
    Time,
    Asteroids,
}

impl CliMode {
    fn as_str(&self) -> &'static str {
        match self {
            CliMode::Infinite => "infinite",
            CliMode::Time => "time",
            CliMode::Asteroids => "asteroids",
        }
    }

    fn to_mode(self, target: Option<u64>) -> GameMode {
        match self {
            CliMode::Infinite => GameMode::Infinite,
            CliMode::Time => Settings::time_mode(target.unwrap_or(60)),
            CliMode::Asteroids => GameMode::Asteroids {
                target: target.unwrap_or(20) as u32,
            },
        }
    }
}

/// Scripted player: answers asteroids that have been on screen for
/// `reaction_ms`, closest to the planet first
struct Autoplayer {
    rng: Pcg32,
    accuracy: f64,
    reaction_ms: u64,
}

impl Autoplayer {
    fn play<P: ProfileService>(
        &mut self,
        game: &mut Game<P>,
        clock: &ManualClock,
        max_ms: u64,
        print_events: bool,
    ) -> Option<GameResult> {
        while game.update() {
            if game.session_time() >= max_ms {
                game.quit();
                break;
            }

            if game.state().effects.stored.is_some() {
                game.toggle_power_up();
            }

            let now = game.session_time();
            let ready = game
                .state()
                .asteroids()
                .filter(|a| now.saturating_sub(a.spawn_time) >= self.reaction_ms)
                .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
                .map(|a| a.answer());
            let capsule = game.state().power_up().map(|p| p.answer());

            if let Some(answer) = ready {
                let typed = if self.rng.random_bool(self.accuracy) {
                    answer
                } else {
                    answer + self.rng.random_range(1..=3)
                };
                game.submit_answer(typed);
            } else if let Some(answer) = capsule {
                game.submit_answer(answer);
            }

            for event in game.drain_events() {
                if print_events {
                    println!("t={} {:?}", game.session_time(), event);
                } else if let GameEvent::ReachedTarget { question, answer, .. } = event {
                    log::debug!("Missed {} = {}", question, answer);
                }
            }
            clock.advance(FRAME_MS);
        }
        game.result().cloned()
    }
}

/// A batch of scripted sessions
struct Run<'a> {
    settings: &'a Settings,
    seed: u64,
    games: u32,
    max_ms: u64,
    print_events: bool,
}

impl Run<'_> {
    fn play<P: ProfileService>(&self, player: &mut Autoplayer, game: &mut Game<P>, clock: &ManualClock) {
        for i in 0..self.games {
            if i > 0 {
                game.restart(self.settings.session_config(self.seed + i as u64));
            }
            if self.games > 1 {
                println!("game={}", i + 1);
            }
            let result = player.play(game, clock, self.max_ms, self.print_events);
            print_result(result.as_ref(), game.phase(), game.state().score);
        }
    }
}

fn parse_tables(raw: &str) -> Result<Vec<i32>> {
    raw.split(',')
        .map(|t| {
            t.trim()
                .parse::<i32>()
                .map_err(|_| anyhow!("invalid table '{t}'"))
        })
        .collect()
}

fn avatar_from(id: &str) -> Result<Avatar> {
    AVATARS
        .iter()
        .find(|(avatar, _, _)| *avatar == id)
        .map(|(avatar, _, _)| Avatar::Predefined(avatar.to_string()))
        .ok_or_else(|| anyhow!("unknown avatar '{id}'"))
}

fn color_from(id: &str) -> Result<String> {
    COLORS
        .iter()
        .find(|(color, _, _)| *color == id)
        .map(|(_, hex, _)| hex.to_string())
        .ok_or_else(|| anyhow!("unknown color '{id}'"))
}

fn print_result(result: Option<&GameResult>, phase: GamePhase, score: u64) {
    println!("outcome={:?}", phase);
    println!("score={}", score);
    if let Some(result) = result {
        println!("max_combo={}", result.summary.max_combo);
        println!("destroyed={}", result.summary.asteroids_destroyed);
        println!("duration_ms={}", result.summary.duration_ms);
        println!("new_record={}", result.is_new_record);
        if let Some(rank) = result.rank {
            println!("leaderboard_rank={}", rank);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let Cli {
        store: store_path,
        settings: settings_path,
        command,
    } = Cli::parse();

    match command {
        Commands::Simulate {
            seed,
            difficulty,
            operation,
            tables,
            mode,
            target,
            split,
            relentless,
            training,
            accuracy,
            reaction_ms,
            max_secs,
            record,
            events,
            games,
        } => {
            let mut settings = Settings::load(&settings_path)?;
            if let Some(d) = difficulty {
                settings.difficulty = d.into();
            }
            if let Some(op) = operation {
                settings.operation.op = OperationType::from_str(&op)
                    .ok_or_else(|| anyhow!("unknown operation '{op}'"))?;
            }
            if let Some(tables) = tables {
                settings.operation.tables = parse_tables(&tables)?.into_iter().collect();
            }
            if let Some(mode) = mode {
                settings.mode = mode.to_mode(target);
            }
            settings.split_mode |= split;
            if let Some(level) = relentless {
                settings.relentless = Some(
                    RelentlessLevel::from_level(level)
                        .ok_or_else(|| anyhow!("relentless level must be 1-3"))?,
                );
            }
            if !(0.0..=1.0).contains(&accuracy) {
                return Err(anyhow!("accuracy must be between 0 and 1"));
            }

            let store = ProfileStore::open(&store_path)?;
            let profile_id = store
                .active_id()
                .map(str::to_string)
                .or(settings.active_profile.clone());
            if training {
                let id = profile_id
                    .as_deref()
                    .ok_or_else(|| anyhow!("training needs an active profile"))?;
                match save_the_earth::stats::training_config(
                    &store.weak_areas(id),
                    &settings.operation,
                ) {
                    Some(drill) => settings.operation = drill,
                    None => println!("training=no weak areas, using configured operation"),
                }
            }

            let mut player = Autoplayer {
                rng: Pcg32::seed_from_u64(seed ^ 0x5eed),
                accuracy,
                reaction_ms,
            };
            let clock = ManualClock::new(0);
            let config = settings.session_config(seed);
            let max_ms = max_secs * 1_000;

            let run = Run {
                settings: &settings,
                seed,
                games: games.max(1),
                max_ms,
                print_events: events,
            };
            if record {
                let mut game = Game::new(config, store, profile_id, Box::new(clock.clone()));
                run.play(&mut player, &mut game, &clock);
            } else {
                let profiles = MemoryProfiles::new();
                let mut game = Game::new(config, profiles, None, Box::new(clock.clone()));
                run.play(&mut player, &mut game, &clock);
            }
        }
        Commands::Leaderboard {
            mode,
            difficulty,
            limit,
        } => {
            let store = ProfileStore::open(&store_path)?;
            let now = unix_millis();
            let entries = store
                .leaderboard()
                .filter(mode.map(|m| m.as_str()), difficulty.map(Difficulty::from));
            if entries.is_empty() {
                println!("No scores yet");
            }
            for (rank, entry) in entries.iter().take(limit).enumerate() {
                println!(
                    "{:>3}. {} {:<16} {:>8}  {:<9} {:<6} {}",
                    rank + 1,
                    entry.player_avatar,
                    entry.player_name,
                    entry.score,
                    entry.mode,
                    entry.difficulty.as_str(),
                    format_date(entry.date, now)
                );
            }
        }
        Commands::ResetLeaderboard => {
            let mut store = ProfileStore::open(&store_path)?;
            store.reset_leaderboard()?;
            println!("leaderboard=cleared");
        }
        Commands::Profiles => {
            let store = ProfileStore::open(&store_path)?;
            for profile in store.profiles() {
                let marker = if store.active_id() == Some(profile.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {} {} {:<16} record={} games={}",
                    marker,
                    profile.id,
                    profile.avatar.emoji(),
                    profile.name,
                    profile.lifetime.high_score,
                    profile.lifetime.total_games_played
                );
            }
        }
        Commands::CreateProfile {
            name,
            avatar,
            color,
        } => {
            let mut store = ProfileStore::open(&store_path)?;
            let profile = store.create_profile(ProfileDraft {
                name: Some(name),
                avatar: avatar.as_deref().map(avatar_from).transpose()?,
                accent_color: color.as_deref().map(color_from).transpose()?,
            })?;
            println!("id={}", profile.id);
        }
        Commands::UpdateProfile {
            id,
            name,
            avatar,
            color,
        } => {
            let mut store = ProfileStore::open(&store_path)?;
            let profile = store.update_profile(
                &id,
                ProfileDraft {
                    name,
                    avatar: avatar.as_deref().map(avatar_from).transpose()?,
                    accent_color: color.as_deref().map(color_from).transpose()?,
                },
            )?;
            println!("name={}", profile.name);
        }
        Commands::DeleteProfile { id } => {
            let mut store = ProfileStore::open(&store_path)?;
            store.delete_profile(&id)?;
            println!("deleted={}", id);
        }
        Commands::SelectProfile { id } => {
            let mut store = ProfileStore::open(&store_path)?;
            store.set_active(id.as_deref())?;
            println!("active={}", id.as_deref().unwrap_or("guest"));
        }
        Commands::Stats { id } => {
            let store = ProfileStore::open(&store_path)?;
            let id = id
                .or_else(|| store.active_id().map(str::to_string))
                .ok_or_else(|| anyhow!("no profile given and none active"))?;
            let stats = store
                .detailed_stats(&id)
                .ok_or_else(|| anyhow!("unknown profile '{id}'"))?;
            println!("high_score={}", stats.lifetime.high_score);
            println!("games={}", stats.lifetime.total_games_played);
            println!("best_combo={}", stats.lifetime.best_combo);
            println!("destroyed={}", stats.lifetime.total_asteroids_destroyed);
            println!("average_score={}", stats.average_score);
            println!("leaderboard_entries={}", stats.leaderboard_entries);
            println!("average_destroyed={}", stats.average_asteroids_per_game);

            for weak in store.weak_areas(&id) {
                println!(
                    "weak: {} {:.0}% over {} answers",
                    weak.area,
                    weak.success_rate * 100.0,
                    weak.samples
                );
            }
            if let Some(profile) = store.profile(&id) {
                for error in profile.answers.frequent_errors.iter().take(5) {
                    println!(
                        "mistake: {} = {} (answered {}) x{}",
                        error.question, error.correct_answer, error.given_answer, error.count
                    );
                }
            }
        }
    }

    Ok(())
}
