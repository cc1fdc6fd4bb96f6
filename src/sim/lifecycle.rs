//! Target death, splitting, power-up drops and pickups
//!
//! Runs after collision resolution, so every effect here observes the fully
//! advanced positions of the step.

use glam::Vec2;

use super::buffs::ShieldResponse;
use super::spawner::random_apex;
use super::state::{GamePhase, PowerUp, SimEvent, Target, World};
use crate::tuning::Tuning;

/// Horizontal launch speed of split children
const CHILD_SIDE_SPEED: f32 = 140.0;
/// Upward launch speed of split children
const CHILD_LIFT_SPEED: f32 = 320.0;
/// Upward pop of a dropped power-up
const DROP_POP_SPEED: f32 = 120.0;

/// Register a kill for the combo and return the points awarded
pub fn award_kill(world: &mut World, max_hp: u32, tuning: &Tuning) -> u64 {
    world.combo += 1;
    world.combo_timer = tuning.combo_window;
    let base = max_hp as u64 * tuning.score_per_hp;
    let points = (base as f64 * world.combo_multiplier(tuning) as f64).round() as u64;
    world.score = world.score.saturating_add(points);
    points
}

/// Remove dead targets; score, drop carried power-ups, split big ones
pub fn resolve_deaths(world: &mut World, tuning: &Tuning) -> usize {
    if !world.targets.iter().any(Target::is_dead) {
        return 0;
    }
    let (dead, alive): (Vec<Target>, Vec<Target>) =
        world.targets.drain(..).partition(Target::is_dead);
    world.targets = alive;

    let kills = dead.len();
    for target in dead {
        let points = award_kill(world, target.max_hp, tuning);
        world.add_shake(0.15 + 0.02 * target.max_hp.min(20) as f32);
        world.events.push(SimEvent::TargetKilled {
            id: target.id,
            pos: target.pos,
            points,
            combo: world.combo,
        });

        if let Some(kind) = target.carrier {
            let id = world.next_entity_id();
            world.power_ups.push(PowerUp {
                id,
                kind,
                pos: target.pos,
                vel: Vec2::new(0.0, -DROP_POP_SPEED),
                grounded: false,
                ground_time: tuning.powerup_ground_lifetime,
            });
            world.events.push(SimEvent::PowerUpDropped { id, kind });
        }

        if target.max_hp > tuning.split_threshold {
            split_target(world, &target, tuning);
        }
    }
    kills
}

/// Spawn up to two half-strength children, never exceeding the global cap
fn split_target(world: &mut World, parent: &Target, tuning: &Tuning) {
    let cap = tuning.global_cap(world.level);
    let child_hp = (parent.max_hp / 2).max(1);
    let child_radius = tuning.radius_for_hp(child_hp);
    let mut children = Vec::with_capacity(2);

    for side in [-1.0_f32, 1.0] {
        if world.targets.len() >= cap {
            break;
        }
        let x = (parent.pos.x + side * child_radius * 0.6)
            .clamp(child_radius, (tuning.field_width - child_radius).max(child_radius));
        let vel = Vec2::new(
            side * CHILD_SIDE_SPEED + parent.vel.x * 0.3,
            -CHILD_LIFT_SPEED,
        );
        let apex_y = random_apex(&mut world.rng, tuning);
        let id = world.next_entity_id();
        let mut child = Target::new(id, Vec2::new(x, parent.pos.y), vel, child_hp, apex_y, tuning);
        child.grace = tuning.child_grace;
        world.targets.push(child);
        children.push(id);
    }

    if !children.is_empty() {
        world.events.push(SimEvent::TargetSplit {
            parent: parent.id,
            children,
        });
    }
}

/// Collect power-ups touching the player
pub fn collect_power_ups(world: &mut World, tuning: &Tuning) -> usize {
    let player = world.player.pos;
    let reach = tuning.pickup_radius + tuning.powerup_radius;
    let reach_sq = reach * reach;

    let mut collected = Vec::new();
    world.power_ups.retain(|p| {
        if p.pos.distance_squared(player) <= reach_sq {
            collected.push(p.kind);
            false
        } else {
            true
        }
    });

    for &kind in &collected {
        let transition = world.buffs.apply(kind, tuning);
        world.events.push(SimEvent::PowerUpCollected { kind, transition });
    }
    collected.len()
}

/// Count down grounded power-ups and remove the expired ones
pub fn expire_power_ups(world: &mut World, dt: f32) {
    let mut expired = Vec::new();
    world.power_ups.retain_mut(|p| {
        if !p.grounded {
            return true;
        }
        p.ground_time -= dt;
        if p.ground_time > 0.0 {
            true
        } else {
            expired.push(p.id);
            false
        }
    });
    world
        .events
        .extend(expired.into_iter().map(|id| SimEvent::PowerUpExpired { id }));
}

/// Apply a player-hit; returns true if the run ended
pub fn handle_player_hit(world: &mut World, target_id: u32, tuning: &Tuning) -> bool {
    match world.buffs.absorb_hit(tuning) {
        ShieldResponse::Absorbed => {
            // Knock the offender back up so it does not sit on the hull
            if let Some(target) = world.targets.iter_mut().find(|t| t.id == target_id) {
                target.vel.y = -target.vel.y.abs().max(CHILD_LIFT_SPEED);
                target.vel = target.vel.clamp_length_max(tuning.max_target_speed);
            }
            world.add_shake(0.5);
            world.events.push(SimEvent::ShieldAbsorbed { target: target_id });
            false
        }
        ShieldResponse::Grace => false,
        ShieldResponse::Unprotected => {
            world.phase = GamePhase::GameOver;
            world.add_shake(1.0);
            world.events.push(SimEvent::GameOver { score: world.score });
            log::info!("Game over: score {} at level {}", world.score, world.level);
            true
        }
    }
}

/// Let the combo window run; a lapse resets the counter
pub fn decay_combo(world: &mut World, dt: f32) {
    if world.combo_timer <= 0.0 {
        world.combo = 0;
        return;
    }
    world.combo_timer -= dt;
    if world.combo_timer <= 0.0 {
        world.combo_timer = 0.0;
        world.combo = 0;
    }
}

/// End-of-step timer decay (runs after every other stage)
pub fn decay_timers(world: &mut World, dt: f32) {
    world.buffs.decay(dt);
    decay_combo(world, dt);
    expire_power_ups(world, dt);

    for target in &mut world.targets {
        target.flash = (target.flash - dt).max(0.0);
        target.grace = (target.grace - dt).max(0.0);
    }

    world.screen_shake *= 0.9;
    if world.screen_shake < 0.01 {
        world.screen_shake = 0.0;
    }
}

/// Full lifecycle stage for one step
pub fn apply(world: &mut World, tuning: &Tuning, player_hit: Option<u32>) {
    resolve_deaths(world, tuning);
    collect_power_ups(world, tuning);
    if let Some(target_id) = player_hit {
        handle_player_hit(world, target_id, tuning);
    }
}
