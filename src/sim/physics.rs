//! Per-step integration for targets, projectiles and power-ups
//!
//! Semi-implicit Euler under constant gravity. Side walls reflect with
//! restitution. The floor does not: each target carries an apex height and
//! a floor contact sets the rebound speed needed to reach it, so bounces
//! never decay to rest.

use glam::Vec2;

use super::state::{Target, World};
use crate::tuning::Tuning;
use crate::{finite_or, is_finite_vec};

/// Rebound speed that carries a body from `contact_y` up to `apex_y`
pub fn apex_launch_speed(contact_y: f32, apex_y: f32, gravity: f32, boost: f32) -> f32 {
    let rise = (contact_y - apex_y).max(1.0);
    (2.0 * gravity * rise).sqrt() * boost
}

/// Integrate one target; returns true if it touched the floor
pub fn integrate_target(target: &mut Target, tuning: &Tuning, dt: f32) -> bool {
    target.vel.y += tuning.gravity * dt;
    target.pos += target.vel * dt;

    let r = target.radius;
    let right = tuning.field_width - r;
    if target.pos.x < r {
        target.pos.x = r;
        target.vel.x = target.vel.x.abs() * tuning.wall_restitution;
    } else if target.pos.x > right {
        target.pos.x = right;
        target.vel.x = -target.vel.x.abs() * tuning.wall_restitution;
    }

    let floor = tuning.floor_y() - r;
    if target.pos.y < floor {
        return false;
    }

    target.pos.y = floor;
    target.vel.y = -apex_launch_speed(floor, target.apex_y, tuning.gravity, tuning.bounce_boost);

    // No parking: a grounded target always keeps some sideways motion
    if target.vel.x.abs() < tuning.min_horizontal_speed {
        let dir = if target.vel.x < 0.0 { -1.0 } else { 1.0 };
        target.vel.x = dir * tuning.min_horizontal_speed;
    }
    true
}

/// Repair non-finite state and clamp runaway speeds
pub fn stabilize_target(target: &mut Target, tuning: &Tuning) {
    if !is_finite_vec(target.pos) {
        target.pos = Vec2::new(
            finite_or(target.pos.x, tuning.field_width / 2.0),
            finite_or(target.pos.y, 0.0),
        );
    }
    if !is_finite_vec(target.vel) {
        target.vel = Vec2::ZERO;
    }
    target.vel = target.vel.clamp_length_max(tuning.max_target_speed);
    target.pos.x = target
        .pos
        .x
        .clamp(target.radius, (tuning.field_width - target.radius).max(target.radius));
    target.pos.y = target
        .pos
        .y
        .clamp(
            -tuning.field_height,
            (tuning.floor_y() - target.radius).max(-tuning.field_height),
        );
}

/// Advance every moving body in the world
pub fn integrate(world: &mut World, tuning: &Tuning, dt: f32) {
    for target in &mut world.targets {
        target.record_trail();
        integrate_target(target, tuning, dt);
        stabilize_target(target, tuning);
    }

    for projectile in &mut world.projectiles {
        projectile.prev_pos = projectile.pos;
        projectile.pos += projectile.vel * dt;
    }
    let (w, h) = (tuning.field_width, tuning.field_height);
    world.projectiles.retain(|p| {
        let m = p.radius;
        is_finite_vec(p.pos) && p.pos.x > -m && p.pos.x < w + m && p.pos.y > -m && p.pos.y < h + m
    });

    let r = tuning.powerup_radius;
    let floor = tuning.floor_y() - r;
    for power_up in &mut world.power_ups {
        if power_up.grounded {
            continue;
        }
        power_up.vel.y += tuning.gravity * dt;
        power_up.vel = power_up.vel.clamp_length_max(tuning.max_target_speed);
        power_up.pos += power_up.vel * dt;
        if power_up.pos.x < r || power_up.pos.x > w - r {
            power_up.pos.x = power_up.pos.x.clamp(r, (w - r).max(r));
            power_up.vel.x = -power_up.vel.x * tuning.wall_restitution;
        }
        if power_up.pos.y >= floor {
            power_up.pos.y = floor;
            power_up.vel = Vec2::ZERO;
            power_up.grounded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(pos: Vec2, vel: Vec2, tuning: &Tuning) -> Target {
        Target::new(1, pos, vel, 4, tuning.field_height * 0.3, tuning)
    }

    #[test]
    fn test_gravity_accelerates_downward() {
        let tuning = Tuning::default();
        let mut t = target(Vec2::new(200.0, 100.0), Vec2::ZERO, &tuning);
        integrate_target(&mut t, &tuning, 0.01);
        assert!(t.vel.y > 0.0);
        assert!(t.pos.y > 100.0);
    }

    #[test]
    fn test_wall_reflects_with_restitution() {
        let tuning = Tuning::default();
        let mut t = target(Vec2::new(tuning.field_width - 1.0, 100.0), Vec2::new(200.0, 0.0), &tuning);
        integrate_target(&mut t, &tuning, 0.01);
        assert!(t.vel.x < 0.0);
        assert!((t.vel.x.abs() - 200.0 * tuning.wall_restitution).abs() < 0.01);
        assert!(t.pos.x <= tuning.field_width - t.radius);
    }

    #[test]
    fn test_floor_bounce_reaches_apex() {
        let tuning = Tuning::default();
        let apex = tuning.field_height * 0.3;
        let mut t = target(
            Vec2::new(200.0, tuning.floor_y() - 5.0),
            Vec2::new(100.0, 50.0),
            &tuning,
        );
        assert!(integrate_target(&mut t, &tuning, 1.0 / 120.0));
        assert!(t.vel.y < 0.0);

        // Fly until the peak and compare with the apex target
        let mut peak = t.pos.y;
        for _ in 0..2000 {
            integrate_target(&mut t, &tuning, 1.0 / 120.0);
            if t.vel.y >= 0.0 {
                break;
            }
            peak = peak.min(t.pos.y);
        }
        // Boost lifts slightly above the apex; never below it by much
        assert!(peak <= apex + 10.0, "peak {peak} apex {apex}");
        assert!(peak > apex - 60.0, "peak {peak} apex {apex}");
    }

    #[test]
    fn test_bounces_never_decay() {
        let tuning = Tuning::default();
        let mut t = target(Vec2::new(200.0, 300.0), Vec2::new(80.0, 0.0), &tuning);
        let mut bounces = 0;
        for _ in 0..120 * 30 {
            if integrate_target(&mut t, &tuning, 1.0 / 120.0) {
                bounces += 1;
            }
        }
        assert!(bounces >= 5);
        let floor = tuning.floor_y() - t.radius;
        let speed = apex_launch_speed(floor, t.apex_y, tuning.gravity, tuning.bounce_boost);
        assert!(speed > 100.0);
    }

    #[test]
    fn test_floor_kicks_slow_horizontal() {
        let tuning = Tuning::default();
        let mut t = target(Vec2::new(200.0, tuning.floor_y()), Vec2::new(0.0, 10.0), &tuning);
        integrate_target(&mut t, &tuning, 0.01);
        assert_eq!(t.vel.x.abs(), tuning.min_horizontal_speed);
    }

    #[test]
    fn test_stabilize_repairs_nan() {
        let tuning = Tuning::default();
        let mut t = target(Vec2::new(f32::NAN, 5.0), Vec2::new(f32::INFINITY, 0.0), &tuning);
        stabilize_target(&mut t, &tuning);
        assert!(is_finite_vec(t.pos));
        assert_eq!(t.vel, Vec2::ZERO);

        t.vel = Vec2::new(1e9, 1e9);
        stabilize_target(&mut t, &tuning);
        assert!(t.vel.length() <= tuning.max_target_speed + 0.01);
    }

    #[test]
    fn test_stabilize_tolerates_target_taller_than_field() {
        let tuning = Tuning {
            field_height: 10.0,
            ..Default::default()
        };
        let mut t = Target::new(1, Vec2::new(200.0, 5.0), Vec2::ZERO, 100, 0.0, &tuning);
        assert!(t.radius > 2.0 * tuning.field_height);
        stabilize_target(&mut t, &tuning);
        assert_eq!(t.pos.y, -tuning.field_height);
    }

    #[test]
    fn test_falling_power_up_reaches_terminal_speed() {
        let tuning = Tuning::default();
        let mut world = World::new(1, &tuning);
        world.power_ups.push(super::super::state::PowerUp {
            id: 1,
            kind: super::super::buffs::PowerUpKind::Shield,
            pos: Vec2::new(100.0, -tuning.field_height),
            vel: Vec2::new(0.0, tuning.max_target_speed),
            grounded: false,
            ground_time: 1.0,
        });
        integrate(&mut world, &tuning, 0.01);
        assert!(world.power_ups[0].vel.length() <= tuning.max_target_speed + 1e-3);
    }

    #[test]
    fn test_projectiles_leave_field() {
        let tuning = Tuning::default();
        let mut world = World::new(1, &tuning);
        world.projectiles.push(super::super::state::Projectile {
            id: 1,
            pos: Vec2::new(100.0, 2.0),
            prev_pos: Vec2::new(100.0, 2.0),
            vel: Vec2::new(0.0, -800.0),
            radius: 4.0,
            kind: Default::default(),
            pierce_left: 1,
            damage: 1,
            hit_ids: Vec::new(),
        });
        integrate(&mut world, &tuning, 0.05);
        assert!(world.projectiles.is_empty());
    }
}
