//! Splitfall headless runner
//!
//! Plays a scripted session through the fixed-step clock, saves it with the
//! file store, restores it into a fresh world and prints a summary.
//!
//! Usage: `splitfall [--tuning FILE] [--seconds N] [--save-dir DIR] [--user UID] [--seed N]`

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::path::PathBuf;

    use splitfall::highscores::{RunReporter, ScoreSubmission, ScoreSubmitter};
    use splitfall::persistence::{
        FileStore, Identity, MemoryRemote, PersistenceGateway, RestoreOutcome,
    };
    use splitfall::sim::{GamePhase, SimulationClock, TickInput, World, tick};
    use splitfall::{Settings, Tuning, platform};

    /// Display refresh the session pretends to run at
    const FRAME_DT: f32 = 1.0 / 60.0;

    struct Options {
        tuning: Option<PathBuf>,
        seconds: f32,
        save_dir: PathBuf,
        user: Option<String>,
        seed: u64,
    }

    impl Options {
        fn parse() -> Self {
            let mut options = Options {
                tuning: None,
                seconds: 60.0,
                save_dir: std::env::temp_dir().join("splitfall"),
                user: None,
                seed: platform::now_ms() as u64,
            };
            let mut args = std::env::args().skip(1);
            while let Some(arg) = args.next() {
                let value = args.next();
                match (arg.as_str(), value) {
                    ("--tuning", Some(v)) => options.tuning = Some(PathBuf::from(v)),
                    ("--seconds", Some(v)) => match v.parse::<f32>() {
                        Ok(s) if s.is_finite() && s > 0.0 => options.seconds = s,
                        _ => log::warn!("Ignoring --seconds {}", v),
                    },
                    ("--save-dir", Some(v)) => options.save_dir = PathBuf::from(v),
                    ("--user", Some(v)) => options.user = Some(v),
                    ("--seed", Some(v)) => match v.parse() {
                        Ok(seed) => options.seed = seed,
                        Err(_) => log::warn!("Ignoring --seed {}", v),
                    },
                    (other, _) => log::warn!("Unknown argument {}", other),
                }
            }
            options
        }
    }

    /// Stands in for the remote leaderboard
    struct LogSubmitter;

    impl ScoreSubmitter for LogSubmitter {
        fn submit(&mut self, submission: &ScoreSubmission) -> splitfall::persistence::Result<()> {
            log::info!(
                "Submitting score {} (level {}, run {})",
                submission.score,
                submission.level,
                submission.run_id
            );
            Ok(())
        }
    }

    /// Stay under the nearest high target so shots reach it
    fn autopilot(world: &World, tuning: &Tuning) -> TickInput {
        let player_x = world.player.pos.x;
        let aim = world
            .targets
            .iter()
            .filter(|t| t.pos.y < tuning.field_height * 0.6)
            .min_by(|a, b| {
                (a.pos.x - player_x)
                    .abs()
                    .total_cmp(&(b.pos.x - player_x).abs())
            })
            .map(|t| t.pos.x)
            .unwrap_or(tuning.field_width / 2.0);

        TickInput {
            pointer_x: Some(aim),
            start: matches!(world.phase, GamePhase::Ready),
            resume: world.phase == GamePhase::Paused,
            ..Default::default()
        }
    }

    pub fn run() {
        env_logger::init();
        let options = Options::parse();

        let tuning = match &options.tuning {
            Some(path) => Tuning::load(path).unwrap_or_else(|e| {
                log::warn!("Failed to load tuning from {}: {}", path.display(), e);
                Tuning::default()
            }),
            None => Tuning::default(),
        };

        let identity = Identity::from_uid(options.user.as_deref());
        let mut gateway =
            PersistenceGateway::new(FileStore::new(&options.save_dir), identity, &tuning);
        let mut remote = MemoryRemote::new();
        let mut reporter = RunReporter::new();
        let mut submitter = LogSubmitter;

        let mut world = World::new(options.seed, &tuning);
        let mut settings = Settings::default();
        let outcome = gateway.restore(Some(&mut remote), &mut world, &mut settings, &tuning);
        log::info!("Startup restore: {:?}", outcome);
        if world.phase == GamePhase::GameOver {
            world = World::new(options.seed, &tuning);
        }

        let mut clock = SimulationClock::default();
        let start_ms = platform::now_ms();
        let frames = (options.seconds / FRAME_DT).ceil() as u64;
        for frame in 0..frames {
            let now = start_ms + frame as f64 * FRAME_DT as f64 * 1000.0;
            clock.run_frame(FRAME_DT, |dt| {
                let input = autopilot(&world, &tuning);
                tick(&mut world, &input, &settings, &tuning, dt);
                gateway.autosave(&mut world, settings, &tuning, now);
                reporter.observe(&world, now, &mut submitter);
            });
            gateway.pump_remote(&mut remote, now);
            if world.phase == GamePhase::GameOver {
                break;
            }
        }

        let end_ms = start_ms + options.seconds as f64 * 1000.0;
        gateway.flush(&mut world, settings, &tuning, end_ms);
        gateway.pump_remote(&mut remote, end_ms);

        let mut restored = World::new(0, &tuning);
        let mut restored_settings = Settings::default();
        let outcome = gateway.restore(
            Some(&mut remote),
            &mut restored,
            &mut restored_settings,
            &tuning,
        );

        println!("Session summary");
        println!("  phase:      {:?}", world.phase);
        println!("  score:      {}", world.score);
        println!("  level:      {}", world.level);
        println!("  elapsed:    {:.1}s ({} ticks)", world.elapsed, world.ticks);
        println!("  targets:    {}", world.targets.len());
        println!("  save dir:   {}", options.save_dir.display());
        match outcome {
            RestoreOutcome::Restored { source, saved_at } => println!(
                "  restored:   {:?} save from {:.0}, phase {:?}, score {}",
                source, saved_at, restored.phase, restored.score
            ),
            other => println!("  restored:   {:?}", other),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The browser build drives the library from its own frame callback
}
