//! World state and core simulation types
//!
//! All state that must be persisted for Continue/determinism lives here.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::buffs::{BuffTimers, BuffTransition, PowerUpKind};
use crate::consts::TRAIL_LENGTH;
use crate::tuning::Tuning;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    /// Waiting for start input
    #[default]
    Ready,
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// Run ended
    GameOver,
}

impl GamePhase {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ready" | "idle" => Some(GamePhase::Ready),
            "playing" | "running" => Some(GamePhase::Playing),
            "paused" => Some(GamePhase::Paused),
            "gameover" | "game_over" | "over" => Some(GamePhase::GameOver),
            _ => None,
        }
    }
}

/// Which input last steered the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Pointer,
    Keyboard,
}

/// The player's emitter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub pos: Vec2,
    pub control: ControlMode,
    /// Idle bob animation phase (radians)
    pub bob_phase: f32,
}

impl Player {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            pos: Vec2::new(tuning.field_width / 2.0, tuning.player_y()),
            control: ControlMode::Pointer,
            bob_phase: 0.0,
        }
    }

    /// Move toward `target_x` at no more than `max_speed`
    pub fn move_toward(&mut self, target_x: f32, dt: f32, max_speed: f32) {
        let max_delta = max_speed * dt;
        let delta = (target_x - self.pos.x).clamp(-max_delta, max_delta);
        self.pos.x += delta;
    }
}

/// Projectile damage kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectileKind {
    /// Single hit, then removed
    #[default]
    Normal,
    /// Survives until its pierce count is exhausted
    Piercing,
    /// Steers toward the nearest target; splashes on impact
    Homing,
}

impl ProjectileKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Some(ProjectileKind::Normal),
            "piercing" | "pierce" | "laser" => Some(ProjectileKind::Piercing),
            "homing" => Some(ProjectileKind::Homing),
            _ => None,
        }
    }
}

/// A shot fired by the player
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: u32,
    pub pos: Vec2,
    /// Position at the start of the current step (swept collision)
    pub prev_pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub kind: ProjectileKind,
    /// Hits left before removal
    pub pierce_left: u32,
    pub damage: u32,
    /// Targets already hit (a piercing shot hits each target once)
    #[serde(default)]
    pub hit_ids: Vec<u32>,
}

/// A falling, bouncing, splitting target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub hp: u32,
    pub max_hp: u32,
    /// Power-up dropped on death
    #[serde(default)]
    pub carrier: Option<PowerUpKind>,
    /// Rebound peak height (y of the apex)
    pub apex_y: f32,
    /// Hit flash timer (presentation)
    #[serde(default)]
    pub flash: f32,
    /// Spawn grace during which projectiles pass through
    #[serde(default)]
    pub grace: f32,
    /// Recent positions, newest first (presentation)
    #[serde(skip)]
    pub trail: Vec<Vec2>,
}

impl Target {
    pub fn new(id: u32, pos: Vec2, vel: Vec2, max_hp: u32, apex_y: f32, tuning: &Tuning) -> Self {
        let max_hp = max_hp.clamp(1, tuning.hp_ceiling);
        Self {
            id,
            pos,
            vel,
            radius: tuning.radius_for_hp(max_hp),
            hp: max_hp,
            max_hp,
            carrier: None,
            apex_y,
            flash: 0.0,
            grace: 0.0,
            trail: Vec::with_capacity(TRAIL_LENGTH),
        }
    }

    /// Apply damage; returns true if this brought hit-points to zero
    pub fn take_damage(&mut self, amount: u32, tuning: &Tuning) -> bool {
        if self.hp == 0 {
            return false;
        }
        self.hp = self.hp.saturating_sub(amount);
        self.flash = tuning.hit_flash;
        if self.hp > 0 {
            self.radius = tuning.radius_for_hp(self.hp);
        }
        self.hp == 0
    }

    pub fn is_dead(&self) -> bool {
        self.hp == 0
    }

    /// Record current position to trail
    pub fn record_trail(&mut self) {
        self.trail.insert(0, self.pos);
        self.trail.truncate(TRAIL_LENGTH);
    }
}

/// A collectible power-up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub grounded: bool,
    /// Seconds left once grounded
    pub ground_time: f32,
}

/// Things that happened during a step (presentation and autosave hooks)
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    RunStarted,
    Paused,
    Resumed,
    TargetSpawned { id: u32, carrier: bool },
    TargetKilled { id: u32, pos: Vec2, points: u64, combo: u32 },
    TargetSplit { parent: u32, children: Vec<u32> },
    PowerUpDropped { id: u32, kind: PowerUpKind },
    PowerUpCollected { kind: PowerUpKind, transition: BuffTransition },
    PowerUpExpired { id: u32 },
    ShieldAbsorbed { target: u32 },
    LevelUp { level: u32 },
    GameOver { score: u64 },
}

fn default_rng() -> Pcg32 {
    Pcg32::seed_from_u64(0)
}

/// Complete world state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub phase: GamePhase,
    pub score: u64,
    /// Seconds of play
    pub elapsed: f32,
    pub level: u32,
    /// Simulation step counter
    pub ticks: u64,
    /// Run seed for reproducibility
    pub seed: u64,
    pub player: Player,
    /// Live targets (sorted by id for determinism)
    pub targets: Vec<Target>,
    pub projectiles: Vec<Projectile>,
    pub power_ups: Vec<PowerUp>,
    pub buffs: BuffTimers,
    pub combo: u32,
    /// Seconds left before the combo lapses
    pub combo_timer: f32,
    pub screen_shake: f32,
    pub spawn_timer: f32,
    pub carrier_cooldown: f32,
    pub power_up_timer: f32,
    pub fire_cooldown: f32,
    /// Seconds since the last autosave
    #[serde(skip)]
    pub since_save: f32,
    /// Events from the most recent step
    #[serde(skip)]
    pub events: Vec<SimEvent>,
    #[serde(skip, default = "default_rng")]
    pub rng: Pcg32,
    /// Next entity ID
    pub(crate) next_id: u32,
}

impl World {
    /// Create a fresh world with the given seed
    pub fn new(seed: u64, tuning: &Tuning) -> Self {
        Self {
            phase: GamePhase::Ready,
            score: 0,
            elapsed: 0.0,
            level: 1,
            ticks: 0,
            seed,
            player: Player::new(tuning),
            targets: Vec::new(),
            projectiles: Vec::new(),
            power_ups: Vec::new(),
            buffs: BuffTimers::default(),
            combo: 0,
            combo_timer: 0.0,
            screen_shake: 0.0,
            spawn_timer: 0.5,
            carrier_cooldown: tuning.carrier_cooldown / 2.0,
            power_up_timer: tuning.powerup_spawn_interval,
            fire_cooldown: 0.0,
            since_save: 0.0,
            events: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Next ID that would be handed out
    pub fn peek_next_id(&self) -> u32 {
        self.next_id
    }

    /// Re-derive the RNG after a restore so replays stay deterministic per tick
    pub fn reseed_rng(&mut self) {
        self.rng = Pcg32::seed_from_u64(self.seed ^ self.ticks.rotate_left(17));
    }

    /// Ensure entity lists are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.targets.sort_by_key(|t| t.id);
        self.projectiles.sort_by_key(|p| p.id);
        self.power_ups.sort_by_key(|p| p.id);
    }

    /// Live carrier count
    pub fn carrier_count(&self) -> usize {
        self.targets.iter().filter(|t| t.carrier.is_some()).count()
    }

    /// Current combo score multiplier
    pub fn combo_multiplier(&self, tuning: &Tuning) -> f32 {
        let steps = self.combo.saturating_sub(1) as f32;
        (1.0 + steps * tuning.combo_step).min(tuning.combo_max_multiplier)
    }

    /// Add screen shake (clamped to 1.0)
    pub fn add_shake(&mut self, amount: f32) {
        self.screen_shake = (self.screen_shake + amount).min(1.0);
    }
}
