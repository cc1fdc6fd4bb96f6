//! Defensive normalization of persisted snapshots
//!
//! Every external read passes through here. Input is untyped JSON from a
//! store we do not control; the output is a World that satisfies the
//! simulation's invariants. Invalid fields are coerced to defaults,
//! structurally broken entries are dropped and arrays are bounded. This
//! path never panics.

use std::collections::HashSet;

use glam::Vec2;
use serde_json::{Map, Value};

use super::snapshot::Snapshot;
use super::{PersistenceError, Result};
use crate::consts::SNAPSHOT_VERSION;
use crate::settings::Settings;
use crate::sim::{
    BuffTimers, ControlMode, GamePhase, Player, PowerUp, PowerUpKind, Projectile, ProjectileKind,
    ShieldState, Target, WeaponKind, World,
};
use crate::tuning::Tuning;

type Object = Map<String, Value>;

/// Upper bound for free-running countdowns (seconds)
const MAX_COUNTDOWN: f32 = 60.0;
/// Hit ids remembered per projectile
const MAX_HIT_IDS: usize = 32;
/// Largest entity id accepted from a snapshot
const MAX_ENTITY_ID: u32 = 1 << 30;
/// Velocities this far past the limit get clamped
const SPEED_TOLERANCE: f32 = 1.01;

fn f32_field(obj: &Object, key: &str) -> Option<f32> {
    obj.get(key)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
}

fn f32_in(obj: &Object, key: &str, default: f32, lo: f32, hi: f32) -> f32 {
    f32_field(obj, key).unwrap_or(default).clamp(lo, hi.max(lo))
}

fn u64_field(obj: &Object, key: &str) -> Option<u64> {
    let value = obj.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

fn u32_field(obj: &Object, key: &str) -> Option<u32> {
    u64_field(obj, key).map(|v| v.min(u32::MAX as u64) as u32)
}

fn str_field<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Accepts `[x, y]` (glam's serde form) or `{ "x": .., "y": .. }`
fn vec2_field(obj: &Object, key: &str) -> Option<Vec2> {
    let v = match obj.get(key)? {
        Value::Array(items) if items.len() == 2 => {
            Vec2::new(items[0].as_f64()? as f32, items[1].as_f64()? as f32)
        }
        Value::Object(xy) => Vec2::new(f32_field(xy, "x")?, f32_field(xy, "y")?),
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn limit_speed(vel: Vec2, max: f32) -> Vec2 {
    if vel.length() > max * SPEED_TOLERANCE {
        vel.clamp_length_max(max)
    } else {
        vel
    }
}

fn weapon_from_str(s: &str) -> Option<WeaponKind> {
    PowerUpKind::from_str(s).and_then(PowerUpKind::weapon)
}

fn items<'a>(obj: &'a Object, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse and normalize a snapshot from raw JSON text
pub fn normalize_str(json: &str, tuning: &Tuning) -> Result<Snapshot> {
    let value: Value = serde_json::from_str(json)?;
    normalize_snapshot(&value, tuning)
}

/// Normalize an untyped snapshot document
pub fn normalize_snapshot(value: &Value, tuning: &Tuning) -> Result<Snapshot> {
    let root = value
        .as_object()
        .ok_or_else(|| PersistenceError::MalformedSnapshot("snapshot is not an object".into()))?;

    if let Some(v) = root.get("v").and_then(Value::as_u64) {
        Snapshot::check_version(v)?;
    }

    let world_obj = root
        .get("world")
        .and_then(Value::as_object)
        .ok_or_else(|| PersistenceError::MalformedSnapshot("missing world".into()))?;

    let saved_at = root
        .get("savedAt")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite() && *t >= 0.0)
        .unwrap_or(0.0);

    let settings = normalize_settings(root.get("settings"));

    let mut world = normalize_world_object(world_obj, tuning);
    // The envelope's phase wins over the embedded one
    let phase = str_field(root, "phase")
        .and_then(GamePhase::from_str)
        .unwrap_or(world.phase);
    world.phase = phase;

    Ok(Snapshot {
        v: SNAPSHOT_VERSION,
        saved_at,
        phase,
        settings,
        world,
    })
}

pub fn normalize_settings(value: Option<&Value>) -> Settings {
    let Some(obj) = value.and_then(Value::as_object) else {
        return Settings::default();
    };
    Settings::from_strs(
        str_field(obj, "collisionMode"),
        str_field(obj, "visualMode"),
        str_field(obj, "shipModel"),
    )
}

/// Normalize an untyped world; anything unusable yields a fresh world
pub fn normalize_world(value: &Value, tuning: &Tuning) -> World {
    match value.as_object() {
        Some(obj) => normalize_world_object(obj, tuning),
        None => World::new(0, tuning),
    }
}

fn normalize_world_object(obj: &Object, tuning: &Tuning) -> World {
    let seed = u64_field(obj, "seed").unwrap_or(0);
    let mut world = World::new(seed, tuning);

    world.phase = str_field(obj, "phase")
        .and_then(GamePhase::from_str)
        .unwrap_or_default();
    world.score = u64_field(obj, "score").unwrap_or(0);
    world.elapsed = f32_field(obj, "elapsed").unwrap_or(0.0).max(0.0);
    world.level = u32_field(obj, "level")
        .unwrap_or(1)
        .clamp(1, tuning.max_level.max(1));
    world.ticks = u64_field(obj, "ticks").unwrap_or(0);

    if let Some(player) = obj.get("player").and_then(Value::as_object) {
        world.player = normalize_player(player, tuning);
    }

    world.combo = u32_field(obj, "combo").unwrap_or(0).min(10_000);
    world.combo_timer = f32_in(obj, "comboTimer", 0.0, 0.0, tuning.combo_window);
    world.screen_shake = f32_in(obj, "screenShake", 0.0, 0.0, 1.0);
    world.spawn_timer = f32_in(obj, "spawnTimer", world.spawn_timer, 0.0, MAX_COUNTDOWN);
    world.carrier_cooldown =
        f32_in(obj, "carrierCooldown", world.carrier_cooldown, 0.0, MAX_COUNTDOWN);
    world.power_up_timer = f32_in(obj, "powerUpTimer", world.power_up_timer, 0.0, MAX_COUNTDOWN);
    world.fire_cooldown = f32_in(obj, "fireCooldown", 0.0, 0.0, MAX_COUNTDOWN);

    if let Some(buffs) = obj.get("buffs").and_then(Value::as_object) {
        world.buffs = normalize_buffs(buffs, tuning);
    }

    world.targets = items(obj, "targets")
        .iter()
        .filter_map(|v| normalize_target(v, tuning))
        .collect();
    world.projectiles = items(obj, "projectiles")
        .iter()
        .filter_map(|v| normalize_projectile(v, tuning))
        .collect();
    world.power_ups = items(obj, "powerUps")
        .iter()
        .filter_map(|v| normalize_power_up(v, tuning))
        .collect();

    assign_ids(&mut world, u32_field(obj, "nextId").unwrap_or(1));

    world.normalize_order();
    world
        .targets
        .truncate(tuning.snapshot_target_limit.min(tuning.global_cap(world.level)));
    world.projectiles.truncate(tuning.snapshot_projectile_limit);
    world.power_ups.truncate(tuning.snapshot_powerup_limit);

    let mut carriers = 0;
    for target in &mut world.targets {
        if target.carrier.is_some() {
            carriers += 1;
            if carriers > tuning.max_carriers {
                target.carrier = None;
            }
        }
    }

    world.reseed_rng();
    world
}

/// Keep unique in-range ids; reassign the rest past the highest one seen
fn assign_ids(world: &mut World, stored_next: u32) {
    let mut seen = HashSet::new();
    let mut missing = 0usize;
    let mut claim = |id: &mut u32| {
        if *id == 0 || *id > MAX_ENTITY_ID || !seen.insert(*id) {
            *id = 0;
            missing += 1;
        }
    };
    world.targets.iter_mut().for_each(|t| claim(&mut t.id));
    world.projectiles.iter_mut().for_each(|p| claim(&mut p.id));
    world.power_ups.iter_mut().for_each(|p| claim(&mut p.id));

    let highest = seen.iter().copied().max().unwrap_or(0);
    let mut next = stored_next.clamp(1, MAX_ENTITY_ID).max(highest + 1);
    // Out of headroom: renumber everything from 1
    let renumber = next as usize + missing > MAX_ENTITY_ID as usize + 1;
    if renumber {
        next = 1;
    }
    let mut fresh = |id: &mut u32| {
        if renumber || *id == 0 {
            *id = next;
            next = next.saturating_add(1);
        }
    };
    world.targets.iter_mut().for_each(|t| fresh(&mut t.id));
    world.projectiles.iter_mut().for_each(|p| fresh(&mut p.id));
    world.power_ups.iter_mut().for_each(|p| fresh(&mut p.id));
    world.next_id = next;
}

fn normalize_player(obj: &Object, tuning: &Tuning) -> Player {
    let mut player = Player::new(tuning);
    if let Some(pos) = vec2_field(obj, "pos") {
        player.pos.x = pos.x.clamp(0.0, tuning.field_width);
    }
    player.control = match str_field(obj, "control").map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "keyboard" || s == "keys" => ControlMode::Keyboard,
        _ => ControlMode::Pointer,
    };
    player.bob_phase = f32_field(obj, "bobPhase")
        .unwrap_or(0.0)
        .rem_euclid(std::f32::consts::TAU);
    player
}

fn normalize_target(value: &Value, tuning: &Tuning) -> Option<Target> {
    let obj = value.as_object()?;
    let pos = vec2_field(obj, "pos")?;

    let ceiling = tuning.hp_ceiling.max(1);
    let max_hp = u32_field(obj, "maxHp")
        .or_else(|| u32_field(obj, "hp"))
        .unwrap_or(1)
        .clamp(1, ceiling);
    let hp = u32_field(obj, "hp").unwrap_or(max_hp).clamp(1, max_hp);

    let (a, b) = tuning.apex_band();
    let (high, low) = (a.min(b), a.max(b));
    let apex_y = f32_in(obj, "apexY", (high + low) / 2.0, high, low);
    let vel = limit_speed(
        vec2_field(obj, "vel").unwrap_or(Vec2::ZERO),
        tuning.max_target_speed,
    );

    let id = u32_field(obj, "id").unwrap_or(0);
    let mut target = Target::new(id, pos, vel, max_hp, apex_y, tuning);
    target.hp = hp;
    target.radius = tuning.radius_for_hp(hp);
    target.carrier = str_field(obj, "carrier").and_then(PowerUpKind::from_str);
    target.flash = f32_in(obj, "flash", 0.0, 0.0, tuning.hit_flash);
    target.grace = f32_in(obj, "grace", 0.0, 0.0, tuning.child_grace);

    let r = target.radius;
    target.pos.x = pos.x.clamp(r, (tuning.field_width - r).max(r));
    target.pos.y = pos
        .y
        .clamp(-tuning.field_height, (tuning.floor_y() - r).max(-tuning.field_height));
    Some(target)
}

fn normalize_projectile(value: &Value, tuning: &Tuning) -> Option<Projectile> {
    let obj = value.as_object()?;
    let pos = vec2_field(obj, "pos")?;
    let vel = vec2_field(obj, "vel")?;
    let max_pierce = tuning.laser_pierce.max(tuning.overdrive_pierce).max(1);
    let max_damage = tuning.homing_damage.max(1);
    let default_radius = tuning.projectile_radius.max(0.5);
    let radius = f32_in(obj, "radius", default_radius, 0.5, default_radius * 4.0);

    // Same bounds the integrator culls with
    let (w, h, m) = (tuning.field_width, tuning.field_height, radius);
    if !(pos.x > -m && pos.x < w + m && pos.y > -m && pos.y < h + m) {
        return None;
    }

    let mut hit_ids = Vec::new();
    if let Some(ids) = obj.get("hitIds").and_then(Value::as_array) {
        for id in ids.iter().filter_map(Value::as_u64) {
            let id = id.min(u32::MAX as u64) as u32;
            if !hit_ids.contains(&id) && hit_ids.len() < MAX_HIT_IDS {
                hit_ids.push(id);
            }
        }
    }

    Some(Projectile {
        id: u32_field(obj, "id").unwrap_or(0),
        pos,
        prev_pos: vec2_field(obj, "prevPos").unwrap_or(pos),
        vel: limit_speed(vel, tuning.projectile_speed * 2.0),
        radius,
        kind: str_field(obj, "kind")
            .and_then(ProjectileKind::from_str)
            .unwrap_or_default(),
        pierce_left: u32_field(obj, "pierceLeft").unwrap_or(1).clamp(1, max_pierce),
        damage: u32_field(obj, "damage").unwrap_or(1).clamp(1, max_damage),
        hit_ids,
    })
}

fn normalize_power_up(value: &Value, tuning: &Tuning) -> Option<PowerUp> {
    let obj = value.as_object()?;
    let kind = str_field(obj, "kind").and_then(PowerUpKind::from_str)?;
    let pos = vec2_field(obj, "pos")?;

    let r = tuning.powerup_radius;
    let floor = (tuning.floor_y() - r).max(0.0);
    let grounded = obj.get("grounded").and_then(Value::as_bool).unwrap_or(false);
    let lifetime = tuning.powerup_ground_lifetime.max(0.0);

    Some(PowerUp {
        id: u32_field(obj, "id").unwrap_or(0),
        kind,
        pos: Vec2::new(
            pos.x.clamp(r, (tuning.field_width - r).max(r)),
            if grounded { floor } else { pos.y.clamp(-tuning.field_height, floor) },
        ),
        vel: if grounded {
            Vec2::ZERO
        } else {
            limit_speed(
                vec2_field(obj, "vel").unwrap_or(Vec2::ZERO),
                tuning.max_target_speed,
            )
        },
        grounded,
        ground_time: f32_in(obj, "groundTime", lifetime, 0.0, lifetime),
    })
}

fn normalize_buffs(obj: &Object, tuning: &Tuning) -> BuffTimers {
    let weapon = tuning.weapon_buff_duration;
    let mut buffs = BuffTimers {
        shield: f32_in(obj, "shield", 0.0, 0.0, tuning.shield_duration),
        rapid_fire: f32_in(obj, "rapidFire", 0.0, 0.0, weapon),
        multi_shot: f32_in(obj, "multiShot", 0.0, 0.0, weapon),
        laser: f32_in(obj, "laser", 0.0, 0.0, weapon),
        homing: f32_in(obj, "homing", 0.0, 0.0, weapon),
        overdrive: f32_in(obj, "overdrive", 0.0, 0.0, tuning.overdrive_duration),
        overdrive_pair: None,
        shield_state: ShieldState::Off,
    };

    let pair = obj
        .get("overdrivePair")
        .and_then(Value::as_array)
        .filter(|items| items.len() == 2)
        .and_then(|items| {
            let a = items[0].as_str().and_then(weapon_from_str)?;
            let b = items[1].as_str().and_then(weapon_from_str)?;
            (a != b).then_some((a, b))
        });
    match pair {
        Some(pair) if buffs.overdrive > 0.0 => buffs.overdrive_pair = Some(pair),
        _ => buffs.overdrive = 0.0,
    }

    if let Some(shield) = obj.get("shieldState").and_then(Value::as_object) {
        buffs.shield_state = match str_field(shield, "state") {
            Some("armed") if buffs.shield > 0.0 => ShieldState::Armed,
            Some("decaying") => {
                let remaining = f32_in(shield, "remaining", 0.0, 0.0, tuning.shield_decay);
                if remaining > 0.0 {
                    ShieldState::Decaying { remaining }
                } else {
                    ShieldState::Off
                }
            }
            _ => ShieldState::Off,
        };
    }
    buffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::{TickInput, tick};
    use proptest::prelude::*;
    use serde_json::json;

    fn assert_world_valid(world: &World, tuning: &Tuning) {
        assert!(world.targets.len() <= tuning.global_cap(world.level));
        assert!(world.level >= 1 && world.level <= tuning.max_level);
        let mut ids = HashSet::new();
        for t in &world.targets {
            assert!(t.hp >= 1 && t.hp <= t.max_hp, "hp {} max {}", t.hp, t.max_hp);
            assert!(t.max_hp <= tuning.hp_ceiling);
            assert!(t.pos.is_finite() && t.vel.is_finite());
            assert!(t.radius.is_finite() && t.apex_y.is_finite());
            assert!(ids.insert(t.id));
        }
        for p in &world.projectiles {
            assert!(p.pos.is_finite() && p.vel.is_finite() && p.prev_pos.is_finite());
            assert!(p.pierce_left >= 1);
            assert!(ids.insert(p.id));
        }
        for p in &world.power_ups {
            assert!(p.pos.is_finite() && p.vel.is_finite() && p.ground_time.is_finite());
            assert!(ids.insert(p.id));
        }
        assert!(ids.iter().all(|&id| id > 0 && id < world.peek_next_id()));
        assert!(world.elapsed.is_finite());
        assert!(world.combo_timer.is_finite() && world.screen_shake.is_finite());
        assert!(world.player.pos.is_finite() && world.player.bob_phase.is_finite());
    }

    fn played_world(tuning: &Tuning) -> World {
        let settings = Settings::default();
        let mut world = World::new(31337, tuning);
        let start = TickInput {
            start: true,
            ..Default::default()
        };
        tick(&mut world, &start, &settings, tuning, SIM_DT);
        for step in 0..120 * 20 {
            if step % 600 == 0 {
                world.buffs.apply(PowerUpKind::Shield, tuning);
            }
            let input = TickInput {
                pointer_x: Some(((step as f32) * 0.013).sin() * 180.0 + 240.0),
                ..Default::default()
            };
            tick(&mut world, &input, &settings, tuning, SIM_DT);
        }
        world
    }

    #[test]
    fn test_rejects_non_objects() {
        let tuning = Tuning::default();
        assert!(normalize_str("not json", &tuning).is_err());
        assert!(normalize_str("[1,2,3]", &tuning).is_err());
        assert!(normalize_str("{\"v\":1}", &tuning).is_err());
        assert!(normalize_str("{\"v\":99,\"world\":{}}", &tuning).is_err());
    }

    #[test]
    fn test_empty_world_gets_defaults() {
        let tuning = Tuning::default();
        let snapshot = normalize_str("{\"world\":{}}", &tuning).unwrap();
        assert_eq!(snapshot.phase, GamePhase::Ready);
        assert_eq!(snapshot.world.level, 1);
        assert!(snapshot.world.targets.is_empty());
        assert_eq!(snapshot.settings, Settings::default());
    }

    #[test]
    fn test_coerces_bad_fields() {
        let tuning = Tuning::default();
        let value = json!({
            "v": 3,
            "savedAt": "yesterday",
            "phase": "PLAYING",
            "settings": { "collisionMode": "ghost", "shipModel": 42 },
            "world": {
                "score": -5,
                "level": 100000,
                "elapsed": "NaN",
                "targets": [
                    { "id": 1, "pos": [100.0, 100.0], "hp": 500, "maxHp": 8000, "apexY": -1e9 },
                    { "id": 1, "pos": { "x": 50.0, "y": 50.0 }, "hp": 0, "maxHp": 4 },
                    { "id": 2, "pos": "here" },
                    7
                ],
                "powerUps": [
                    { "id": 9, "kind": "laser", "pos": [10.0, 10.0], "grounded": true },
                    { "id": 10, "kind": "bomb", "pos": [10.0, 10.0] }
                ],
                "buffs": { "overdrive": 3.0, "overdrivePair": ["laser", "laser"], "shield": -4 },
                "nextId": 2
            }
        });
        let snapshot = normalize_snapshot(&value, &tuning).unwrap();
        let world = &snapshot.world;

        assert_eq!(snapshot.saved_at, 0.0);
        assert_eq!(snapshot.phase, GamePhase::Playing);
        assert_eq!(world.phase, GamePhase::Playing);
        assert_eq!(snapshot.settings.collision_mode, crate::CollisionMode::Ghost);
        assert_eq!(world.score, 0);
        assert_eq!(world.level, tuning.max_level);
        assert_eq!(world.elapsed, 0.0);

        assert_eq!(world.targets.len(), 2);
        let first = &world.targets[0];
        assert_eq!(first.max_hp, tuning.hp_ceiling);
        assert_eq!(first.hp, tuning.hp_ceiling);
        assert_eq!(first.apex_y, tuning.apex_band().0);
        assert_eq!(first.radius, tuning.radius_for_hp(first.hp));
        let second = &world.targets[1];
        assert_eq!(second.hp, 1);
        assert_eq!(second.max_hp, 4);
        assert_eq!(second.radius, tuning.radius_for_hp(1));
        assert_ne!(second.id, first.id);

        assert_eq!(world.power_ups.len(), 1);
        assert_eq!(world.power_ups[0].pos.y, tuning.floor_y() - tuning.powerup_radius);
        assert_eq!(world.buffs.overdrive, 0.0);
        assert!(world.buffs.overdrive_pair.is_none());
        assert_eq!(world.buffs.shield, 0.0);
        assert_world_valid(world, &tuning);
    }

    #[test]
    fn test_duplicate_ids_reassigned_past_highest() {
        let tuning = Tuning::default();
        let value = json!({ "world": {
            "targets": [
                { "id": 5, "pos": [100.0, 100.0] },
                { "id": 5, "pos": [200.0, 100.0] }
            ],
            "projectiles": [
                { "id": 5, "pos": [100.0, 300.0], "vel": [0.0, -700.0] }
            ],
            "nextId": 1
        }});
        let world = normalize_snapshot(&value, &tuning).unwrap().world;
        let ids: Vec<u32> = world.targets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![5, 6]);
        assert_eq!(world.projectiles[0].id, 7);
        assert_eq!(world.peek_next_id(), 8);
    }

    #[test]
    fn test_truncates_below_live_cap() {
        let tuning = Tuning::default();
        let targets: Vec<Value> = (1..=40)
            .map(|i| json!({ "id": i, "pos": [10.0 * i as f32, 100.0], "maxHp": 2 }))
            .collect();
        let value = json!({ "world": { "level": 60, "targets": targets } });
        let world = normalize_snapshot(&value, &tuning).unwrap().world;
        assert_eq!(world.targets.len(), tuning.snapshot_target_limit);

        // Low level: the live cap is the tighter bound
        let targets: Vec<Value> = (1..=40)
            .map(|i| json!({ "id": i, "pos": [10.0 * i as f32, 100.0] }))
            .collect();
        let value = json!({ "world": { "level": 1, "targets": targets } });
        let world = normalize_snapshot(&value, &tuning).unwrap().world;
        assert_eq!(world.targets.len(), tuning.global_cap(1));
    }

    #[test]
    fn test_gameplay_world_round_trip_is_idempotent() {
        let tuning = Tuning::default();
        let world = played_world(&tuning);
        let snapshot = Snapshot::capture(&world, Settings::default(), 1000.0, &tuning);

        let first = normalize_str(&snapshot.to_json().unwrap(), &tuning).unwrap();
        let second = normalize_str(&first.to_json().unwrap(), &tuning).unwrap();
        assert_eq!(first.to_value().unwrap(), second.to_value().unwrap());

        let (saved, restored) = (&snapshot.world, &first.world);
        assert_eq!(restored.score, world.score);
        assert_eq!(restored.ticks, world.ticks);
        assert_eq!(restored.targets.len(), saved.targets.len());
        for (a, b) in saved.targets.iter().zip(&restored.targets) {
            assert_eq!(a.id, b.id);
            assert_eq!((a.hp, a.max_hp), (b.hp, b.max_hp));
            assert_eq!(a.radius, b.radius, "target {}", a.id);
            assert_eq!(b.radius, tuning.radius_for_hp(b.hp));
            assert_eq!(a.pos, b.pos);
            assert_eq!(a.vel, b.vel);
            assert_eq!(a.apex_y, b.apex_y);
            assert_eq!(a.carrier, b.carrier);
            assert_eq!((a.flash, a.grace), (b.flash, b.grace));
        }
        assert_eq!(
            serde_json::to_value(&saved.projectiles).unwrap(),
            serde_json::to_value(&restored.projectiles).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&saved.power_ups).unwrap(),
            serde_json::to_value(&restored.power_ups).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&saved.buffs).unwrap(),
            serde_json::to_value(&restored.buffs).unwrap()
        );
        assert_eq!(restored.peek_next_id(), saved.peek_next_id());
        assert_world_valid(restored, &tuning);
    }

    #[test]
    fn test_damaged_target_keeps_its_size() {
        let tuning = Tuning::default();
        let mut world = World::new(1, &tuning);
        let id = world.next_entity_id();
        let apex = tuning.apex_band().0;
        let mut target = Target::new(id, Vec2::new(200.0, 300.0), Vec2::ZERO, 9, apex, &tuning);
        target.take_damage(5, &tuning);
        let live_radius = target.radius;
        world.targets.push(target);

        let snapshot = Snapshot::capture(&world, Settings::default(), 1.0, &tuning);
        let restored = normalize_str(&snapshot.to_json().unwrap(), &tuning).unwrap();
        let t = &restored.world.targets[0];
        assert_eq!((t.hp, t.max_hp), (4, 9));
        assert_eq!(t.radius, live_radius);
        assert!(t.radius < tuning.radius_for_hp(9));
    }

    #[test]
    fn test_projectile_just_past_edge_survives() {
        let tuning = Tuning::default();
        let r = tuning.projectile_radius;
        let value = json!({
            "v": 3,
            "world": {
                "projectiles": [
                    { "id": 1, "pos": [100.0, -r * 0.5], "vel": [0.0, -700.0] },
                    { "id": 2, "pos": [100.0, -r * 2.0], "vel": [0.0, -700.0] },
                    { "id": 3, "pos": [-r * 0.5, 300.0], "vel": [-300.0, -600.0] }
                ],
                "nextId": 4
            }
        });
        let world = normalize_snapshot(&value, &tuning).unwrap().world;
        let ids: Vec<u32> = world.projectiles.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    fn arb_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_map(|f| serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            prop::sample::select(vec![
                "playing", "paused", "gameover", "laser", "shield", "homing", "armed",
                "decaying", "ghost", "neon", "keyboard", "",
            ])
            .prop_map(Value::from),
        ]
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        arb_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-zA-Z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn arb_vec2() -> impl Strategy<Value = Value> {
        prop_oneof![
            (-2000.0f64..2000.0, -2000.0f64..2000.0).prop_map(|(x, y)| json!([x, y])),
            (arb_leaf(), arb_leaf()).prop_map(|(x, y)| json!([x, y])),
            arb_json(),
        ]
    }

    fn arb_entity() -> impl Strategy<Value = Value> {
        (
            arb_leaf(),
            arb_vec2(),
            arb_vec2(),
            arb_leaf(),
            arb_leaf(),
            arb_leaf(),
            arb_leaf(),
        )
            .prop_map(|(id, pos, vel, hp, max_hp, kind, apex)| {
                json!({
                    "id": id, "pos": pos, "vel": vel, "hp": hp, "maxHp": max_hp,
                    "kind": kind, "carrier": kind, "apexY": apex, "pierceLeft": hp
                })
            })
    }

    fn arb_snapshot() -> impl Strategy<Value = Value> {
        (
            arb_leaf(),
            arb_leaf(),
            prop::collection::vec(arb_entity(), 0..40),
            prop::collection::vec(arb_entity(), 0..20),
            prop::collection::vec(arb_entity(), 0..12),
            arb_json(),
            arb_leaf(),
            arb_json(),
        )
            .prop_map(|(phase, level, targets, projectiles, power_ups, buffs, next_id, settings)| {
                json!({
                    "v": 3, "savedAt": level, "phase": phase, "settings": settings,
                    "world": {
                        "level": level, "targets": targets, "projectiles": projectiles,
                        "powerUps": power_ups, "buffs": buffs, "nextId": next_id,
                        "score": next_id, "elapsed": level, "comboTimer": level
                    }
                })
            })
    }

    proptest! {
        #[test]
        fn prop_adversarial_snapshot_yields_valid_world(value in arb_snapshot()) {
            let tuning = Tuning::default();
            let snapshot = normalize_snapshot(&value, &tuning).unwrap();
            assert_world_valid(&snapshot.world, &tuning);

            // Normalizing again changes nothing
            let again = normalize_snapshot(&snapshot.to_value().unwrap(), &tuning).unwrap();
            prop_assert_eq!(snapshot.to_value().unwrap(), again.to_value().unwrap());
        }

        #[test]
        fn prop_arbitrary_json_never_panics(value in arb_json()) {
            let tuning = Tuning::default();
            if let Ok(snapshot) = normalize_snapshot(&value, &tuning) {
                assert_world_valid(&snapshot.world, &tuning);
            }
        }

        #[test]
        fn prop_arbitrary_text_never_panics(text in ".{0,200}") {
            let _ = normalize_str(&text, &Tuning::default());
        }
    }
}
