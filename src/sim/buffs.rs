//! Timed buffs and their upgrade transitions
//!
//! Weapon buffs stack into Overdrive: picking up a weapon power-up while a
//! *different* weapon buff is running consumes both and enters the combined
//! state. The shield is a separate state machine (armed → decaying → armed/off).

use serde::{Deserialize, Serialize};

use super::state::ProjectileKind;
use crate::tuning::Tuning;

/// Power-up kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerUpKind {
    Shield,
    RapidFire,
    MultiShot,
    Laser,
    Homing,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 5] = [
        PowerUpKind::Shield,
        PowerUpKind::RapidFire,
        PowerUpKind::MultiShot,
        PowerUpKind::Laser,
        PowerUpKind::Homing,
    ];

    /// Weapon category, `None` for the shield
    pub fn weapon(self) -> Option<WeaponKind> {
        match self {
            PowerUpKind::Shield => None,
            PowerUpKind::RapidFire => Some(WeaponKind::RapidFire),
            PowerUpKind::MultiShot => Some(WeaponKind::MultiShot),
            PowerUpKind::Laser => Some(WeaponKind::Laser),
            PowerUpKind::Homing => Some(WeaponKind::Homing),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "shield" => Some(PowerUpKind::Shield),
            "rapidfire" | "rapid_fire" | "rapid" => Some(PowerUpKind::RapidFire),
            "multishot" | "multi_shot" | "multi" => Some(PowerUpKind::MultiShot),
            "laser" => Some(PowerUpKind::Laser),
            "homing" => Some(PowerUpKind::Homing),
            _ => None,
        }
    }
}

/// Weapon buff categories (everything except the shield)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeaponKind {
    RapidFire,
    MultiShot,
    Laser,
    Homing,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 4] = [
        WeaponKind::RapidFire,
        WeaponKind::MultiShot,
        WeaponKind::Laser,
        WeaponKind::Homing,
    ];
}

/// Shield lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ShieldState {
    #[default]
    Off,
    /// Will absorb the next hit
    Armed,
    /// Absorbed a hit; protects but cannot re-arm until `remaining` runs out
    Decaying { remaining: f32 },
}

/// What a pickup did to the buff state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuffTransition {
    ShieldArmed,
    ShieldExtended,
    Activated(WeaponKind),
    Refreshed(WeaponKind),
    Upgraded { from: WeaponKind, with: WeaponKind },
    OverdriveExtended,
}

/// Outcome of a player-hit against the shield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldResponse {
    /// An armed shield took the hit and started decaying
    Absorbed,
    /// Shield is decaying; overlap ignored
    Grace,
    Unprotected,
}

/// Buff timers (seconds remaining)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuffTimers {
    pub shield: f32,
    pub rapid_fire: f32,
    pub multi_shot: f32,
    pub laser: f32,
    pub homing: f32,
    pub overdrive: f32,
    /// Categories combined into the running overdrive
    pub overdrive_pair: Option<(WeaponKind, WeaponKind)>,
    pub shield_state: ShieldState,
}

/// Shot layout derived from the active buffs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirePattern {
    pub count: u32,
    pub spread: f32,
    pub kind: ProjectileKind,
    pub pierce: u32,
    pub damage: u32,
    pub interval: f32,
}

impl BuffTimers {
    pub fn weapon_timer(&self, kind: WeaponKind) -> f32 {
        match kind {
            WeaponKind::RapidFire => self.rapid_fire,
            WeaponKind::MultiShot => self.multi_shot,
            WeaponKind::Laser => self.laser,
            WeaponKind::Homing => self.homing,
        }
    }

    fn weapon_timer_mut(&mut self, kind: WeaponKind) -> &mut f32 {
        match kind {
            WeaponKind::RapidFire => &mut self.rapid_fire,
            WeaponKind::MultiShot => &mut self.multi_shot,
            WeaponKind::Laser => &mut self.laser,
            WeaponKind::Homing => &mut self.homing,
        }
    }

    pub fn overdrive_active(&self) -> bool {
        self.overdrive > 0.0 && self.overdrive_pair.is_some()
    }

    /// Apply a collected power-up
    pub fn apply(&mut self, kind: PowerUpKind, tuning: &Tuning) -> BuffTransition {
        let Some(weapon) = kind.weapon() else {
            self.shield = tuning.shield_duration;
            return match self.shield_state {
                ShieldState::Off => {
                    self.shield_state = ShieldState::Armed;
                    BuffTransition::ShieldArmed
                }
                // A decaying shield re-arms on its own once the decay ends
                ShieldState::Armed | ShieldState::Decaying { .. } => BuffTransition::ShieldExtended,
            };
        };

        if self.overdrive_active() {
            self.overdrive = tuning.overdrive_duration;
            return BuffTransition::OverdriveExtended;
        }

        // Longest-running other weapon becomes the upgrade partner
        let partner = WeaponKind::ALL
            .into_iter()
            .filter(|&k| k != weapon && self.weapon_timer(k) > 0.0)
            .max_by(|a, b| {
                self.weapon_timer(*a)
                    .partial_cmp(&self.weapon_timer(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        if let Some(from) = partner {
            *self.weapon_timer_mut(from) = 0.0;
            *self.weapon_timer_mut(weapon) = 0.0;
            self.overdrive = tuning.overdrive_duration;
            self.overdrive_pair = Some((from, weapon));
            log::debug!("Buff upgrade: {:?} + {:?} -> overdrive", from, weapon);
            return BuffTransition::Upgraded { from, with: weapon };
        }

        let timer = self.weapon_timer_mut(weapon);
        let was_active = *timer > 0.0;
        *timer = tuning.weapon_buff_duration;
        if was_active {
            BuffTransition::Refreshed(weapon)
        } else {
            BuffTransition::Activated(weapon)
        }
    }

    /// Consult the shield for a hit-causing overlap
    pub fn absorb_hit(&mut self, tuning: &Tuning) -> ShieldResponse {
        match self.shield_state {
            ShieldState::Armed => {
                self.shield_state = ShieldState::Decaying {
                    remaining: tuning.shield_decay,
                };
                ShieldResponse::Absorbed
            }
            ShieldState::Decaying { .. } => ShieldResponse::Grace,
            ShieldState::Off => ShieldResponse::Unprotected,
        }
    }

    /// Advance all timers
    pub fn decay(&mut self, dt: f32) {
        let tick = |t: &mut f32| *t = (*t - dt).max(0.0);
        tick(&mut self.shield);
        tick(&mut self.rapid_fire);
        tick(&mut self.multi_shot);
        tick(&mut self.laser);
        tick(&mut self.homing);
        tick(&mut self.overdrive);
        if self.overdrive <= 0.0 {
            self.overdrive_pair = None;
        }

        self.shield_state = match self.shield_state {
            ShieldState::Armed if self.shield <= 0.0 => ShieldState::Off,
            ShieldState::Decaying { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    ShieldState::Decaying { remaining }
                } else if self.shield > 0.0 {
                    ShieldState::Armed
                } else {
                    ShieldState::Off
                }
            }
            other => other,
        };
    }

    /// Current shot layout
    pub fn fire_pattern(&self, tuning: &Tuning) -> FirePattern {
        if let Some((a, b)) = self.overdrive_pair.filter(|_| self.overdrive > 0.0) {
            let has = |k: WeaponKind| a == k || b == k;
            let homing = has(WeaponKind::Homing);
            return FirePattern {
                count: if has(WeaponKind::MultiShot) { 5 } else { 3 },
                spread: tuning.spread_angle,
                kind: if homing {
                    ProjectileKind::Homing
                } else {
                    ProjectileKind::Piercing
                },
                pierce: tuning.overdrive_pierce,
                damage: if homing { tuning.homing_damage } else { 1 },
                interval: tuning.overdrive_fire_interval,
            };
        }

        let (kind, pierce, damage) = if self.laser > 0.0 {
            (ProjectileKind::Piercing, tuning.laser_pierce, 1)
        } else if self.homing > 0.0 {
            (ProjectileKind::Homing, 1, tuning.homing_damage)
        } else {
            (ProjectileKind::Normal, 1, 1)
        };

        FirePattern {
            count: if self.multi_shot > 0.0 { 3 } else { 1 },
            spread: tuning.spread_angle,
            kind,
            pierce,
            damage,
            interval: if self.rapid_fire > 0.0 {
                tuning.rapid_fire_interval
            } else {
                tuning.fire_interval
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_weapon_activates() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        let t = buffs.apply(PowerUpKind::Laser, &tuning);
        assert_eq!(t, BuffTransition::Activated(WeaponKind::Laser));
        assert_eq!(buffs.laser, tuning.weapon_buff_duration);
        assert!(!buffs.overdrive_active());
    }

    #[test]
    fn test_same_weapon_refreshes() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        buffs.apply(PowerUpKind::Homing, &tuning);
        buffs.decay(3.0);
        let t = buffs.apply(PowerUpKind::Homing, &tuning);
        assert_eq!(t, BuffTransition::Refreshed(WeaponKind::Homing));
        assert_eq!(buffs.homing, tuning.weapon_buff_duration);
        assert!(!buffs.overdrive_active());
    }

    #[test]
    fn test_different_weapon_upgrades_to_overdrive() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        buffs.apply(PowerUpKind::Laser, &tuning);
        let t = buffs.apply(PowerUpKind::MultiShot, &tuning);

        assert_eq!(
            t,
            BuffTransition::Upgraded {
                from: WeaponKind::Laser,
                with: WeaponKind::MultiShot
            }
        );
        assert!(buffs.overdrive_active());
        assert_eq!(
            buffs.overdrive_pair,
            Some((WeaponKind::Laser, WeaponKind::MultiShot))
        );
        // Not an extended single timer
        assert_eq!(buffs.laser, 0.0);
        assert_eq!(buffs.multi_shot, 0.0);

        let pattern = buffs.fire_pattern(&tuning);
        assert_eq!(pattern.count, 5);
        assert_eq!(pattern.kind, ProjectileKind::Piercing);
        assert_eq!(pattern.pierce, tuning.overdrive_pierce);
    }

    #[test]
    fn test_overdrive_expires_and_clears_pair() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        buffs.apply(PowerUpKind::RapidFire, &tuning);
        buffs.apply(PowerUpKind::Homing, &tuning);
        assert_eq!(
            buffs.apply(PowerUpKind::Laser, &tuning),
            BuffTransition::OverdriveExtended
        );
        buffs.decay(tuning.overdrive_duration + 0.1);
        assert!(!buffs.overdrive_active());
        assert_eq!(buffs.overdrive_pair, None);
        assert_eq!(buffs.fire_pattern(&tuning).kind, ProjectileKind::Normal);
    }

    #[test]
    fn test_shield_absorbs_once_then_decays() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        assert_eq!(buffs.absorb_hit(&tuning), ShieldResponse::Unprotected);

        assert_eq!(
            buffs.apply(PowerUpKind::Shield, &tuning),
            BuffTransition::ShieldArmed
        );
        assert_eq!(buffs.absorb_hit(&tuning), ShieldResponse::Absorbed);
        assert_eq!(buffs.absorb_hit(&tuning), ShieldResponse::Grace);

        // Collecting during decay does not re-arm immediately
        buffs.apply(PowerUpKind::Shield, &tuning);
        assert!(matches!(buffs.shield_state, ShieldState::Decaying { .. }));

        buffs.decay(tuning.shield_decay + 0.01);
        assert_eq!(buffs.shield_state, ShieldState::Armed);
    }

    #[test]
    fn test_shield_turns_off_when_timer_runs_out() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        buffs.apply(PowerUpKind::Shield, &tuning);
        buffs.decay(tuning.shield_duration + 0.1);
        assert_eq!(buffs.shield_state, ShieldState::Off);
    }

    #[test]
    fn test_rapid_fire_shortens_interval() {
        let tuning = Tuning::default();
        let mut buffs = BuffTimers::default();
        let base = buffs.fire_pattern(&tuning).interval;
        buffs.apply(PowerUpKind::RapidFire, &tuning);
        assert!(buffs.fire_pattern(&tuning).interval < base);
    }
}
