//! Collision detection and response
//!
//! - Target vs target: impulse resolution (mass ~ radius²) with positional
//!   correction, run for several passes per step
//! - Anti-overcrowding: short-range repulsion plus crowd pressure when the
//!   danger corridor is over its soft cap; active even in ghost mode
//! - Projectile vs target: swept segment-vs-circle so fast shots cannot
//!   tunnel through small targets
//! - Player vs target: composite hull test

use glam::Vec2;

use super::hull::hull_overlaps;
use super::physics::stabilize_target;
use super::spawner::in_danger_zone;
use super::state::{ProjectileKind, Target, World};
use crate::closest_point_on_segment;
use crate::settings::Settings;
use crate::tuning::Tuning;

/// Result of a collision pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// Target touching the player's hull, if any
    pub player_hit: Option<u32>,
    /// Projectile impacts this step
    pub impacts: u32,
}

/// Contact normal from `a` to `b`; coincident centers push along +X
#[inline]
fn contact_normal(a: Vec2, b: Vec2) -> (Vec2, f32) {
    let delta = b - a;
    let dist = delta.length();
    if dist > 1e-4 {
        (delta / dist, dist)
    } else {
        (Vec2::X, 0.0)
    }
}

/// Borrow two distinct targets mutably (`i < j`)
#[inline]
fn pair_mut(targets: &mut [Target], i: usize, j: usize) -> (&mut Target, &mut Target) {
    let (left, right) = targets.split_at_mut(j);
    (&mut left[i], &mut right[0])
}

/// One impulse + positional-correction pass over all target pairs
pub fn resolve_target_pairs(targets: &mut [Target], tuning: &Tuning) {
    let n = targets.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = pair_mut(targets, i, j);
            let (normal, dist) = contact_normal(a.pos, b.pos);
            let overlap = a.radius + b.radius - dist;
            if overlap <= 0.0 {
                continue;
            }

            let inv_a = 1.0 / (a.radius * a.radius).max(1e-3);
            let inv_b = 1.0 / (b.radius * b.radius).max(1e-3);
            let inv_sum = inv_a + inv_b;

            let approach = (b.vel - a.vel).dot(normal);
            if approach < 0.0 {
                let impulse = -(1.0 + tuning.target_restitution) * approach / inv_sum;
                a.vel -= normal * impulse * inv_a;
                b.vel += normal * impulse * inv_b;
            }

            let correction = (overlap - tuning.collision_slop).max(0.0) / inv_sum;
            a.pos -= normal * correction * inv_a;
            b.pos += normal * correction * inv_b;
        }
    }
}

/// Short-range pairwise repulsion on velocities
pub fn apply_repulsion(targets: &mut [Target], tuning: &Tuning, dt: f32) {
    let n = targets.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = pair_mut(targets, i, j);
            let range = (a.radius + b.radius) * tuning.repulsion_range;
            let (normal, dist) = contact_normal(a.pos, b.pos);
            if dist >= range {
                continue;
            }
            let push = (1.0 - dist / range) * tuning.repulsion_strength * dt;
            a.vel -= normal * push;
            b.vel += normal * push;
        }
    }
}

/// Sideways+upward push on the danger corridor once it is over its soft cap
pub fn apply_crowd_pressure(world: &mut World, tuning: &Tuning, dt: f32) -> usize {
    let px = world.player.pos.x;
    let crowded = world
        .targets
        .iter()
        .filter(|t| in_danger_zone(t.pos, px, tuning))
        .count();
    let overflow = crowded.saturating_sub(tuning.danger_soft_cap);
    if overflow == 0 {
        return 0;
    }

    let scale = overflow as f32 * dt;
    for target in &mut world.targets {
        if !in_danger_zone(target.pos, px, tuning) {
            continue;
        }
        let side = if target.pos.x > px {
            1.0
        } else if target.pos.x < px {
            -1.0
        } else if target.id % 2 == 0 {
            1.0
        } else {
            -1.0
        };
        target.vel.x += side * tuning.crowd_push_sideways * scale;
        target.vel.y -= tuning.crowd_push_up * scale;
    }
    overflow
}

/// Does the segment `a`-`b` pass within `radius` of `center`?
pub fn segment_hits_circle(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> bool {
    closest_point_on_segment(center, a, b).distance_squared(center) <= radius * radius
}

/// Turn homing shots toward the nearest target (exponential smoothing)
pub fn steer_homing(world: &mut World, tuning: &Tuning, dt: f32) {
    let blend = 1.0 - (-tuning.homing_steer_rate * dt).exp();
    for projectile in &mut world.projectiles {
        if projectile.kind != ProjectileKind::Homing {
            continue;
        }
        let nearest = world
            .targets
            .iter()
            .filter(|t| !t.is_dead())
            .min_by(|a, b| {
                a.pos
                    .distance_squared(projectile.pos)
                    .partial_cmp(&b.pos.distance_squared(projectile.pos))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        let Some(target) = nearest else {
            continue;
        };

        let speed = projectile.vel.length();
        let desired = (target.pos - projectile.pos).normalize_or_zero() * speed;
        let steered = projectile.vel.lerp(desired, blend);
        projectile.vel = steered.normalize_or(projectile.vel.normalize_or_zero()) * speed;
    }
}

/// Swept projectile-vs-target hits; damages targets and consumes projectiles
pub fn resolve_projectile_hits(world: &mut World, tuning: &Tuning) -> u32 {
    let mut splashes: Vec<(Vec2, u32)> = Vec::new();
    let mut impacts = 0;

    for projectile in &mut world.projectiles {
        if projectile.pierce_left == 0 {
            continue;
        }
        for target in &mut world.targets {
            if target.is_dead() || target.grace > 0.0 || projectile.hit_ids.contains(&target.id) {
                continue;
            }
            let reach = target.radius + projectile.radius;
            if !segment_hits_circle(projectile.prev_pos, projectile.pos, target.pos, reach) {
                continue;
            }

            impacts += 1;
            target.take_damage(projectile.damage, tuning);
            projectile.hit_ids.push(target.id);

            match projectile.kind {
                ProjectileKind::Normal => projectile.pierce_left = 0,
                ProjectileKind::Piercing => {
                    projectile.pierce_left = projectile.pierce_left.saturating_sub(1)
                }
                ProjectileKind::Homing => {
                    let impact =
                        closest_point_on_segment(target.pos, projectile.prev_pos, projectile.pos);
                    splashes.push((impact, target.id));
                    projectile.pierce_left = 0;
                }
            }
            if projectile.pierce_left == 0 {
                break;
            }
        }
    }
    world.projectiles.retain(|p| p.pierce_left > 0);

    // Area effect around homing impacts (primary target excluded)
    let splash_sq = tuning.splash_radius * tuning.splash_radius;
    for (center, primary) in splashes {
        for target in &mut world.targets {
            if target.id == primary || target.is_dead() {
                continue;
            }
            if target.pos.distance_squared(center) <= splash_sq {
                target.take_damage(tuning.splash_damage, tuning);
            }
        }
    }

    impacts
}

/// First target overlapping the player's hull
pub fn detect_player_hit(world: &World, settings: &Settings) -> Option<u32> {
    world
        .targets
        .iter()
        .find(|t| {
            !t.is_dead() && hull_overlaps(settings.ship_model, world.player.pos, t.pos, t.radius)
        })
        .map(|t| t.id)
}

/// Full collision stage for one step
pub fn resolve(world: &mut World, tuning: &Tuning, settings: &Settings, dt: f32) -> CollisionReport {
    if settings.collision_mode.resolves_pairs() {
        for _ in 0..tuning.collision_passes {
            resolve_target_pairs(&mut world.targets, tuning);
        }
    }
    apply_repulsion(&mut world.targets, tuning, dt);
    apply_crowd_pressure(world, tuning, dt);
    for target in &mut world.targets {
        stabilize_target(target, tuning);
    }

    steer_homing(world, tuning, dt);
    let impacts = resolve_projectile_hits(world, tuning);

    CollisionReport {
        player_hit: detect_player_hit(world, settings),
        impacts,
    }
}
