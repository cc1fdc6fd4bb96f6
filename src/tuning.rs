//! Data-driven game balance
//!
//! Every gameplay constant lives here so balance can be changed without
//! touching simulation code. Missing fields in a tuning file fall back to
//! the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tuning json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Balance constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Field ===
    pub field_width: f32,
    pub field_height: f32,
    /// Distance of the player's center above the floor
    pub player_floor_offset: f32,

    // === Physics ===
    pub gravity: f32,
    pub wall_restitution: f32,
    /// Highest permitted apex (y, smaller is higher) as a fraction of field height
    pub apex_high: f32,
    /// Lowest permitted apex as a fraction of field height
    pub apex_low: f32,
    /// Multiplier applied to the solved bounce speed
    pub bounce_boost: f32,
    pub min_horizontal_speed: f32,
    pub max_target_speed: f32,

    // === Target-target ===
    pub target_restitution: f32,
    pub collision_slop: f32,
    pub collision_passes: u32,
    /// Repulsion range as a multiple of the summed radii
    pub repulsion_range: f32,
    pub repulsion_strength: f32,
    pub crowd_push_sideways: f32,
    pub crowd_push_up: f32,

    // === Zones ===
    pub frontline_half_width: f32,
    pub danger_half_width: f32,
    /// Danger corridor starts this fraction of the field height from the top
    pub danger_top: f32,
    pub danger_soft_cap: usize,

    // === Spawning ===
    pub base_target_cap: usize,
    pub max_target_cap: usize,
    pub spawn_interval: f32,
    pub min_spawn_interval: f32,
    pub spawn_interval_per_level: f32,
    pub backpressure_delay: f32,
    pub fill_cooldown_factor: f32,
    pub congestion_cooldown_factor: f32,
    pub placement_attempts: u32,
    /// Probability of rejecting a candidate that sits above the player
    pub avoid_player_chance: f64,
    pub carrier_chance: f64,
    pub carrier_cooldown: f32,
    pub max_carriers: usize,
    pub powerup_spawn_interval: f32,
    pub level_duration: f32,
    pub max_level: u32,

    // === Targets ===
    pub hp_ceiling: u32,
    pub split_threshold: u32,
    pub child_grace: f32,
    pub hit_flash: f32,
    pub base_radius: f32,
    pub radius_per_sqrt_hp: f32,

    // === Scoring ===
    pub score_per_hp: u64,
    pub combo_window: f32,
    pub combo_step: f32,
    pub combo_max_multiplier: f32,

    // === Player / weapons ===
    pub player_speed: f32,
    pub pointer_speed: f32,
    pub fire_interval: f32,
    pub rapid_fire_interval: f32,
    pub overdrive_fire_interval: f32,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub spread_angle: f32,
    pub laser_pierce: u32,
    pub overdrive_pierce: u32,
    pub homing_damage: u32,
    pub homing_steer_rate: f32,
    pub splash_radius: f32,
    pub splash_damage: u32,

    // === Buffs ===
    pub shield_duration: f32,
    pub shield_decay: f32,
    pub weapon_buff_duration: f32,
    pub overdrive_duration: f32,

    // === Power-ups ===
    pub powerup_radius: f32,
    pub powerup_ground_lifetime: f32,
    pub pickup_radius: f32,

    // === Persistence ===
    /// Upper bound on serialized targets; below the live-play cap
    pub snapshot_target_limit: usize,
    pub snapshot_projectile_limit: usize,
    pub snapshot_powerup_limit: usize,
    pub autosave_interval: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            field_width: 480.0,
            field_height: 720.0,
            player_floor_offset: 46.0,

            gravity: 520.0,
            wall_restitution: 0.9,
            apex_high: 0.15,
            apex_low: 0.45,
            bounce_boost: 1.02,
            min_horizontal_speed: 40.0,
            max_target_speed: 900.0,

            target_restitution: 0.85,
            collision_slop: 0.5,
            collision_passes: 2,
            repulsion_range: 1.1,
            repulsion_strength: 140.0,
            crowd_push_sideways: 260.0,
            crowd_push_up: 180.0,

            frontline_half_width: 130.0,
            danger_half_width: 70.0,
            danger_top: 0.4,
            danger_soft_cap: 2,

            base_target_cap: 5,
            max_target_cap: 16,
            spawn_interval: 1.6,
            min_spawn_interval: 0.55,
            spawn_interval_per_level: 0.08,
            backpressure_delay: 0.4,
            fill_cooldown_factor: 0.8,
            congestion_cooldown_factor: 1.2,
            placement_attempts: 6,
            avoid_player_chance: 0.7,
            carrier_chance: 0.35,
            carrier_cooldown: 8.0,
            max_carriers: 2,
            powerup_spawn_interval: 18.0,
            level_duration: 25.0,
            max_level: 99,

            hp_ceiling: 120,
            split_threshold: 4,
            child_grace: 0.12,
            hit_flash: 0.08,
            base_radius: 12.0,
            radius_per_sqrt_hp: 3.0,

            score_per_hp: 10,
            combo_window: 1.6,
            combo_step: 0.25,
            combo_max_multiplier: 4.0,

            player_speed: 420.0,
            pointer_speed: 900.0,
            fire_interval: 0.16,
            rapid_fire_interval: 0.08,
            overdrive_fire_interval: 0.06,
            projectile_speed: 760.0,
            projectile_radius: 4.0,
            spread_angle: 0.18,
            laser_pierce: 3,
            overdrive_pierce: 4,
            homing_damage: 2,
            homing_steer_rate: 8.0,
            splash_radius: 48.0,
            splash_damage: 1,

            shield_duration: 12.0,
            shield_decay: 1.2,
            weapon_buff_duration: 8.0,
            overdrive_duration: 6.0,

            powerup_radius: 12.0,
            powerup_ground_lifetime: 5.0,
            pickup_radius: 26.0,

            snapshot_target_limit: 14,
            snapshot_projectile_limit: 96,
            snapshot_powerup_limit: 8,
            autosave_interval: 1.0,
        }
    }
}

impl Tuning {
    /// Parse overrides from JSON; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        Ok(tuning.sanitized())
    }

    /// Load overrides from a JSON file
    pub fn load(path: &Path) -> Result<Self, TuningError> {
        let json = std::fs::read_to_string(path)?;
        let tuning = Self::from_json_str(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Clamp values that would break the simulation back into a safe range
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |v: f32, d: f32| if v.is_finite() && v > 0.0 { v } else { d };

        self.field_width = positive(self.field_width, defaults.field_width);
        self.field_height = positive(self.field_height, defaults.field_height);
        self.gravity = positive(self.gravity, defaults.gravity);
        self.spawn_interval = positive(self.spawn_interval, defaults.spawn_interval);
        self.min_spawn_interval = positive(self.min_spawn_interval, defaults.min_spawn_interval);
        self.fire_interval = positive(self.fire_interval, defaults.fire_interval);
        self.rapid_fire_interval = positive(self.rapid_fire_interval, defaults.rapid_fire_interval);
        self.overdrive_fire_interval =
            positive(self.overdrive_fire_interval, defaults.overdrive_fire_interval);
        self.level_duration = positive(self.level_duration, defaults.level_duration);
        self.combo_window = positive(self.combo_window, defaults.combo_window);
        self.max_target_speed = positive(self.max_target_speed, defaults.max_target_speed);
        self.projectile_speed = positive(self.projectile_speed, defaults.projectile_speed);

        self.wall_restitution = self.wall_restitution.clamp(0.0, 1.0);
        self.target_restitution = self.target_restitution.clamp(0.0, 1.0);
        self.apex_high = self.apex_high.clamp(0.0, 0.9);
        self.apex_low = self.apex_low.clamp(self.apex_high, 0.9);
        self.collision_passes = self.collision_passes.clamp(1, 8);
        self.hp_ceiling = self.hp_ceiling.max(1);
        self.split_threshold = self.split_threshold.max(1);
        self.max_target_cap = self.max_target_cap.max(1);
        self.base_target_cap = self.base_target_cap.clamp(1, self.max_target_cap);
        self.snapshot_target_limit = self.snapshot_target_limit.min(self.max_target_cap);
        self.max_level = self.max_level.max(1);

        let non_negative = |v: f32, d: f32| if v.is_finite() && v >= 0.0 { v } else { d };
        self.base_radius = non_negative(self.base_radius, defaults.base_radius);
        self.radius_per_sqrt_hp = non_negative(self.radius_per_sqrt_hp, defaults.radius_per_sqrt_hp);
        // The largest target must fit between the walls and under the floor
        let min_extent = 4.0 * self.radius_for_hp(self.hp_ceiling);
        self.field_width = self.field_width.max(min_extent);
        self.field_height = self.field_height.max(min_extent);
        self.player_floor_offset = non_negative(self.player_floor_offset, 0.0).min(self.field_height);
        self
    }

    /// Floor line targets and power-ups rest on
    pub fn floor_y(&self) -> f32 {
        self.field_height
    }

    /// Player center height
    pub fn player_y(&self) -> f32 {
        self.field_height - self.player_floor_offset
    }

    /// Global live-target cap for a level
    pub fn global_cap(&self, level: u32) -> usize {
        (self.base_target_cap + level as usize).min(self.max_target_cap)
    }

    /// Cap for targets in the player's lane
    pub fn frontline_cap(&self, level: u32) -> usize {
        (self.global_cap(level) / 3).max(2)
    }

    /// Base spawn interval before congestion scaling
    pub fn spawn_interval_for_level(&self, level: u32) -> f32 {
        let drop = self.spawn_interval_per_level * level.saturating_sub(1) as f32;
        (self.spawn_interval - drop).max(self.min_spawn_interval)
    }

    /// Target radius as a pure function of hit-points
    pub fn radius_for_hp(&self, hp: u32) -> f32 {
        self.base_radius + self.radius_per_sqrt_hp * (hp.max(1) as f32).sqrt()
    }

    /// Apex band as absolute y values (high, low)
    pub fn apex_band(&self) -> (f32, f32) {
        (
            self.field_height * self.apex_high,
            self.field_height * self.apex_low,
        )
    }
}
