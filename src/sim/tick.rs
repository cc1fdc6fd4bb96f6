//! Fixed timestep simulation tick
//!
//! Core game loop that advances the world deterministically. Stage order
//! within a step is fixed: input → fire → spawn → integrate → collide →
//! lifecycle → timer decay.

use glam::Vec2;

use super::state::{ControlMode, GamePhase, Projectile, SimEvent, World};
use super::{collision, lifecycle, physics, spawner};
use crate::settings::Settings;
use crate::tuning::Tuning;

/// Half-width kept between the player and the side walls
const PLAYER_MARGIN: f32 = 20.0;
/// Muzzle offset above the player's center
const MUZZLE_OFFSET: f32 = 18.0;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Left key held
    pub left: bool,
    /// Right key held
    pub right: bool,
    /// Pointer-drag target x
    pub pointer_x: Option<f32>,
    /// Start (or restart after game over)
    pub start: bool,
    pub pause: bool,
    pub resume: bool,
}

/// Begin a run; a finished world is replaced by a fresh one
pub fn start_run(world: &mut World, tuning: &Tuning) {
    if world.phase == GamePhase::GameOver {
        let seed = world
            .seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(world.ticks | 1);
        *world = World::new(seed, tuning);
    }
    world.phase = GamePhase::Playing;
    world.events.push(SimEvent::RunStarted);
    log::info!("Run started (seed {})", world.seed);
}

/// Advance the world by one fixed timestep
pub fn tick(world: &mut World, input: &TickInput, settings: &Settings, tuning: &Tuning, dt: f32) {
    world.events.clear();

    match world.phase {
        GamePhase::Ready | GamePhase::GameOver if input.start => start_run(world, tuning),
        GamePhase::Playing if input.pause => {
            world.phase = GamePhase::Paused;
            world.events.push(SimEvent::Paused);
            log::info!("Paused");
            return;
        }
        GamePhase::Paused if input.resume || input.start => {
            world.phase = GamePhase::Playing;
            world.events.push(SimEvent::Resumed);
            log::info!("Resumed");
        }
        _ => {}
    }

    if world.phase != GamePhase::Playing {
        return;
    }

    world.ticks += 1;
    world.elapsed += dt;
    world.since_save += dt;
    update_level(world, tuning);

    update_player(world, input, tuning, dt);
    fire(world, tuning, dt);
    spawner::update_spawner(world, tuning, dt);
    physics::integrate(world, tuning, dt);
    let report = collision::resolve(world, tuning, settings, dt);
    lifecycle::apply(world, tuning, report.player_hit);
    lifecycle::decay_timers(world, dt);

    // Ensure deterministic ordering
    world.normalize_order();
}

fn update_level(world: &mut World, tuning: &Tuning) {
    let level = (1 + (world.elapsed / tuning.level_duration) as u32).min(tuning.max_level);
    if level > world.level {
        world.level = level;
        world.events.push(SimEvent::LevelUp { level });
        log::info!("Level {}", level);
    }
}

fn update_player(world: &mut World, input: &TickInput, tuning: &Tuning, dt: f32) {
    let player = &mut world.player;
    let keys = match (input.left, input.right) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    };

    if keys != 0.0 {
        player.control = ControlMode::Keyboard;
        player.pos.x += keys * tuning.player_speed * dt;
    } else if let Some(x) = input.pointer_x.filter(|x| x.is_finite()) {
        player.control = ControlMode::Pointer;
        player.move_toward(x, dt, tuning.pointer_speed);
    }

    let max_x = (tuning.field_width - PLAYER_MARGIN).max(PLAYER_MARGIN);
    player.pos.x = player.pos.x.clamp(PLAYER_MARGIN, max_x);
    player.pos.y = tuning.player_y();
    player.bob_phase = (player.bob_phase + dt * 4.0) % std::f32::consts::TAU;
}

/// Auto-fire using the pattern from the active buffs
fn fire(world: &mut World, tuning: &Tuning, dt: f32) {
    world.fire_cooldown -= dt;
    if world.fire_cooldown > 0.0 {
        return;
    }

    let pattern = world.buffs.fire_pattern(tuning);
    world.fire_cooldown = pattern.interval;

    let origin = world.player.pos - Vec2::new(0.0, MUZZLE_OFFSET);
    let mid = (pattern.count as f32 - 1.0) / 2.0;
    for i in 0..pattern.count {
        let angle = (i as f32 - mid) * pattern.spread;
        let dir = Vec2::new(angle.sin(), -angle.cos());
        let id = world.next_entity_id();
        world.projectiles.push(Projectile {
            id,
            pos: origin,
            prev_pos: origin,
            vel: dir * tuning.projectile_speed,
            radius: tuning.projectile_radius,
            kind: pattern.kind,
            pierce_left: pattern.pierce.max(1),
            damage: pattern.damage.max(1),
            hit_ids: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::buffs::PowerUpKind;
    use crate::sim::state::{ProjectileKind, Target};

    fn playing(seed: u64, tuning: &Tuning) -> World {
        let mut world = World::new(seed, tuning);
        let start = TickInput {
            start: true,
            ..Default::default()
        };
        tick(&mut world, &start, &Settings::default(), tuning, SIM_DT);
        world
    }

    #[test]
    fn test_tick_ready_to_playing() {
        let tuning = Tuning::default();
        let mut world = World::new(12345, &tuning);
        tick(&mut world, &TickInput::default(), &Settings::default(), &tuning, SIM_DT);
        assert_eq!(world.phase, GamePhase::Ready);
        assert_eq!(world.ticks, 0);

        let world = playing(12345, &tuning);
        assert_eq!(world.phase, GamePhase::Playing);
        assert_eq!(world.ticks, 1);
    }

    #[test]
    fn test_cramped_tuning_runs_without_panicking() {
        let tuning = Tuning::from_json_str(r#"{ "field_height": 10.0 }"#).unwrap();
        let mut world = playing(3, &tuning);
        let id = world.next_entity_id();
        let pos = Vec2::new(tuning.field_width / 2.0, tuning.field_height / 2.0);
        let apex = tuning.apex_band().0;
        world
            .targets
            .push(Target::new(id, pos, Vec2::ZERO, 100, apex, &tuning));

        for _ in 0..240 {
            tick(&mut world, &TickInput::default(), &Settings::default(), &tuning, SIM_DT);
        }
        for t in &world.targets {
            assert!(t.pos.is_finite());
            assert!(t.pos.y <= tuning.floor_y() - t.radius + 1e-3);
        }
    }

    #[test]
    fn test_tick_pause_resume() {
        let tuning = Tuning::default();
        let settings = Settings::default();
        let mut world = playing(1, &tuning);

        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut world, &pause, &settings, &tuning, SIM_DT);
        assert_eq!(world.phase, GamePhase::Paused);
        let ticks = world.ticks;

        tick(&mut world, &TickInput::default(), &settings, &tuning, SIM_DT);
        assert_eq!(world.ticks, ticks);

        let resume = TickInput {
            resume: true,
            ..Default::default()
        };
        tick(&mut world, &resume, &settings, &tuning, SIM_DT);
        assert_eq!(world.phase, GamePhase::Playing);
        assert_eq!(world.ticks, ticks + 1);
    }

    #[test]
    fn test_determinism() {
        // Two worlds with the same seed and inputs stay identical
        let tuning = Tuning::default();
        let settings = Settings::default();
        let mut a = playing(99999, &tuning);
        let mut b = playing(99999, &tuning);

        for i in 0..600 {
            let input = TickInput {
                pointer_x: Some(100.0 + (i % 200) as f32),
                ..Default::default()
            };
            tick(&mut a, &input, &settings, &tuning, SIM_DT);
            tick(&mut b, &input, &settings, &tuning, SIM_DT);
        }

        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.score, b.score);
        assert_eq!(a.targets.len(), b.targets.len());
        for (ta, tb) in a.targets.iter().zip(&b.targets) {
            assert_eq!(ta.id, tb.id);
            assert_eq!(ta.pos, tb.pos);
        }
    }

    #[test]
    fn test_keyboard_moves_and_switches_mode() {
        let tuning = Tuning::default();
        let settings = Settings::default();
        let mut world = playing(1, &tuning);
        let x0 = world.player.pos.x;
        let left = TickInput {
            left: true,
            ..Default::default()
        };
        tick(&mut world, &left, &settings, &tuning, SIM_DT);
        assert!(world.player.pos.x < x0);
        assert_eq!(world.player.control, ControlMode::Keyboard);

        let pointer = TickInput {
            pointer_x: Some(10_000.0),
            ..Default::default()
        };
        for _ in 0..600 {
            tick(&mut world, &pointer, &settings, &tuning, SIM_DT);
            if world.phase != GamePhase::Playing {
                break;
            }
        }
        assert_eq!(world.player.control, ControlMode::Pointer);
        assert!(world.player.pos.x <= tuning.field_width - PLAYER_MARGIN);
    }

    #[test]
    fn test_multishot_fires_spread() {
        let tuning = Tuning::default();
        let mut world = playing(1, &tuning);
        world.projectiles.clear();
        world.buffs.apply(PowerUpKind::MultiShot, &tuning);
        world.fire_cooldown = 0.0;
        fire(&mut world, &tuning, SIM_DT);
        assert_eq!(world.projectiles.len(), 3);
        assert!(world.projectiles[0].vel.x < 0.0);
        assert!(world.projectiles[1].vel.x.abs() < 1e-3);
        assert!(world.projectiles[2].vel.x > 0.0);
        assert!(world.projectiles.iter().all(|p| p.vel.y < 0.0));
    }

    #[test]
    fn test_laser_fires_piercing() {
        let tuning = Tuning::default();
        let mut world = playing(1, &tuning);
        world.projectiles.clear();
        world.buffs.apply(PowerUpKind::Laser, &tuning);
        world.fire_cooldown = 0.0;
        fire(&mut world, &tuning, SIM_DT);
        assert_eq!(world.projectiles[0].kind, ProjectileKind::Piercing);
        assert_eq!(world.projectiles[0].pierce_left, tuning.laser_pierce);
    }

    #[test]
    fn test_target_on_player_ends_run() {
        let tuning = Tuning::default();
        let settings = Settings::default();
        let mut world = playing(1, &tuning);
        let id = world.next_entity_id();
        let pos = world.player.pos;
        world
            .targets
            .push(Target::new(id, pos, Vec2::ZERO, 50, 200.0, &tuning));
        tick(&mut world, &TickInput::default(), &settings, &tuning, SIM_DT);
        assert_eq!(world.phase, GamePhase::GameOver);
        assert!(world
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::GameOver { .. })));

        // Start again gives a fresh run
        let start = TickInput {
            start: true,
            ..Default::default()
        };
        tick(&mut world, &start, &settings, &tuning, SIM_DT);
        assert_eq!(world.phase, GamePhase::Playing);
        assert_eq!(world.score, 0);
        assert!(world.targets.is_empty());
    }

    #[test]
    fn test_level_advances_with_time() {
        let tuning = Tuning::default();
        let mut world = playing(1, &tuning);
        world.elapsed = tuning.level_duration * 2.0 + 0.1;
        update_level(&mut world, &tuning);
        assert_eq!(world.level, 3);
        assert!(world.events.contains(&SimEvent::LevelUp { level: 3 }));
    }

    #[test]
    fn test_long_run_keeps_invariants() {
        let tuning = Tuning::default();
        let settings = Settings::default();
        let mut world = playing(4242, &tuning);
        // Shield keeps the run alive long enough to stress the field
        for step in 0..120 * 60 {
            if step % 600 == 0 {
                world.buffs.apply(PowerUpKind::Shield, &tuning);
            }
            let input = TickInput {
                pointer_x: Some(((step as f32) * 0.01).sin() * 200.0 + 240.0),
                ..Default::default()
            };
            tick(&mut world, &input, &settings, &tuning, SIM_DT);
            if world.phase != GamePhase::Playing {
                break;
            }
            assert!(world.targets.len() <= tuning.global_cap(world.level));
            let mut last_id = 0;
            for t in &world.targets {
                assert!(t.id > last_id);
                last_id = t.id;
                assert!(t.hp >= 1 && t.hp <= t.max_hp);
                assert!(t.pos.is_finite() && t.vel.is_finite());
            }
        }
    }
}
