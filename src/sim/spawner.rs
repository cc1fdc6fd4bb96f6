//! Quota-aware target and power-up spawning
//!
//! Three caps gate every spawn: a global cap, a frontline cap for the
//! player's lane and a soft cap on the danger corridor directly above the
//! player. When any is full the timer is pushed out instead of spawning
//! (backpressure), and the cooldown after each attempt grows with both global
//! fill and local congestion.

use glam::Vec2;
use rand::Rng;

use super::buffs::PowerUpKind;
use super::state::{PowerUp, SimEvent, Target, World};
use crate::tuning::Tuning;

/// Margin kept between a new target and existing ones
const PLACEMENT_MARGIN: f32 = 8.0;

/// Target occupancy by zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneCounts {
    pub total: usize,
    pub frontline: usize,
    pub danger: usize,
}

/// What the spawner did this step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// Timer still running
    Waiting,
    /// A cap was full; timer pushed out
    Throttled,
    /// No candidate position was acceptable
    NoPlacement,
    Spawned(u32),
}

/// Target is in the lane the player is defending
pub fn in_frontline(pos: Vec2, player_x: f32, tuning: &Tuning) -> bool {
    (pos.x - player_x).abs() < tuning.frontline_half_width
}

/// Target is in the tight corridor directly above the player
pub fn in_danger_zone(pos: Vec2, player_x: f32, tuning: &Tuning) -> bool {
    (pos.x - player_x).abs() < tuning.danger_half_width
        && pos.y > tuning.field_height * tuning.danger_top
}

pub fn zone_counts(world: &World, tuning: &Tuning) -> ZoneCounts {
    let px = world.player.pos.x;
    world
        .targets
        .iter()
        .fold(ZoneCounts::default(), |mut counts, t| {
            counts.total += 1;
            if in_frontline(t.pos, px, tuning) {
                counts.frontline += 1;
            }
            if in_danger_zone(t.pos, px, tuning) {
                counts.danger += 1;
            }
            counts
        })
}

/// Pick an apex height inside the band
pub fn random_apex(rng: &mut impl Rng, tuning: &Tuning) -> f32 {
    let (high, low) = tuning.apex_band();
    if low - high <= f32::EPSILON {
        return high;
    }
    rng.random_range(high..=low)
}

/// Hit-points for a fresh target at this level
fn roll_hp(rng: &mut impl Rng, level: u32, tuning: &Tuning) -> u32 {
    let lo = 1 + level;
    let hi = (3 + level * 3).max(lo);
    rng.random_range(lo..=hi).min(tuning.hp_ceiling)
}

/// Cooldown after an attempt, scaled by fill and congestion
pub fn spawn_cooldown(level: u32, counts: ZoneCounts, tuning: &Tuning) -> f32 {
    let cap = tuning.global_cap(level).max(1) as f32;
    let fill = (counts.total as f32 / cap).min(1.0);
    let frontline = counts.frontline as f32 / tuning.frontline_cap(level).max(1) as f32;
    let danger = counts.danger as f32 / tuning.danger_soft_cap.max(1) as f32;
    let congestion = frontline.max(danger).min(2.0);

    tuning.spawn_interval_for_level(level)
        * (1.0 + fill * tuning.fill_cooldown_factor + congestion * tuning.congestion_cooldown_factor)
}

/// Advance the spawn timer and create at most one target
pub fn update_spawner(world: &mut World, tuning: &Tuning, dt: f32) -> SpawnOutcome {
    world.carrier_cooldown = (world.carrier_cooldown - dt).max(0.0);
    update_power_up_spawns(world, tuning, dt);

    world.spawn_timer -= dt;
    if world.spawn_timer > 0.0 {
        return SpawnOutcome::Waiting;
    }

    let counts = zone_counts(world, tuning);
    let level = world.level;
    if counts.total >= tuning.global_cap(level)
        || counts.frontline >= tuning.frontline_cap(level)
        || counts.danger >= tuning.danger_soft_cap
    {
        log::debug!(
            "Spawn throttled: total={} frontline={} danger={}",
            counts.total,
            counts.frontline,
            counts.danger
        );
        world.spawn_timer = tuning.backpressure_delay;
        return SpawnOutcome::Throttled;
    }

    let outcome = match spawn_target(world, tuning) {
        Some(id) => SpawnOutcome::Spawned(id),
        None => SpawnOutcome::NoPlacement,
    };

    let counts = zone_counts(world, tuning);
    world.spawn_timer = spawn_cooldown(level, counts, tuning);
    outcome
}

/// Try a few x positions; avoid overlaps and (usually) the player's column
fn pick_spawn_x(world: &mut World, radius: f32, spawn_y: f32, tuning: &Tuning) -> Option<f32> {
    let min_x = radius;
    let max_x = (tuning.field_width - radius).max(min_x);
    let px = world.player.pos.x;

    for _ in 0..tuning.placement_attempts.max(1) {
        let x = world.rng.random_range(min_x..=max_x);
        let candidate = Vec2::new(x, spawn_y);

        let overlaps = world.targets.iter().any(|t| {
            t.pos.distance(candidate) < t.radius + radius + PLACEMENT_MARGIN
        });
        if overlaps {
            continue;
        }

        if (x - px).abs() < tuning.danger_half_width
            && world.rng.random_bool(tuning.avoid_player_chance.clamp(0.0, 1.0))
        {
            continue;
        }

        return Some(x);
    }
    None
}

fn spawn_target(world: &mut World, tuning: &Tuning) -> Option<u32> {
    let max_hp = roll_hp(&mut world.rng, world.level, tuning);
    let radius = tuning.radius_for_hp(max_hp);
    let spawn_y = -radius;
    let x = pick_spawn_x(world, radius, spawn_y, tuning)?;

    let speed = world.rng.random_range(40.0..120.0_f32);
    let vx = if world.rng.random_bool(0.5) { speed } else { -speed };
    let apex_y = random_apex(&mut world.rng, tuning);

    let id = world.next_entity_id();
    let mut target = Target::new(
        id,
        Vec2::new(x, spawn_y),
        Vec2::new(vx, 60.0),
        max_hp,
        apex_y,
        tuning,
    );

    let carrier = world.carrier_cooldown <= 0.0
        && world.carrier_count() < tuning.max_carriers
        && world.rng.random_bool(tuning.carrier_chance.clamp(0.0, 1.0));
    if carrier {
        let kind = PowerUpKind::ALL[world.rng.random_range(0..PowerUpKind::ALL.len())];
        target.carrier = Some(kind);
        world.carrier_cooldown = tuning.carrier_cooldown;
    }

    world.targets.push(target);
    world.events.push(SimEvent::TargetSpawned { id, carrier });
    Some(id)
}

/// Free-falling power-ups, only while no carrier is on the field
fn update_power_up_spawns(world: &mut World, tuning: &Tuning, dt: f32) {
    world.power_up_timer -= dt;
    if world.power_up_timer > 0.0 {
        return;
    }
    world.power_up_timer = tuning.powerup_spawn_interval;

    if world.carrier_count() > 0 || world.power_ups.len() >= tuning.snapshot_powerup_limit {
        return;
    }

    let r = tuning.powerup_radius;
    let x = world.rng.random_range(r..=(tuning.field_width - r).max(r));
    let kind = PowerUpKind::ALL[world.rng.random_range(0..PowerUpKind::ALL.len())];
    let id = world.next_entity_id();
    world.power_ups.push(PowerUp {
        id,
        kind,
        pos: Vec2::new(x, -r),
        vel: Vec2::new(0.0, 40.0),
        grounded: false,
        ground_time: tuning.powerup_ground_lifetime,
    });
    world.events.push(SimEvent::PowerUpDropped { id, kind });
}
