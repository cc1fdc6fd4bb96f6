//! Versioned snapshot envelope
//!
//! The same JSON shape is written to the local store and the remote
//! document: `{ v, savedAt, phase, settings, world }`.

use serde::{Deserialize, Serialize};

use super::{PersistenceError, Result, normalize};
use crate::consts::SNAPSHOT_VERSION;
use crate::settings::Settings;
use crate::sim::{GamePhase, World};
use crate::tuning::Tuning;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version
    pub v: u32,
    /// Epoch milliseconds
    pub saved_at: f64,
    pub phase: GamePhase,
    pub settings: Settings,
    pub world: World,
}

impl Snapshot {
    /// Capture the world for saving, bounding every array to the snapshot limits
    pub fn capture(world: &World, settings: Settings, saved_at: f64, tuning: &Tuning) -> Self {
        let mut world = world.clone();
        world.normalize_order();
        world
            .targets
            .truncate(tuning.snapshot_target_limit.min(tuning.global_cap(world.level)));
        world.projectiles.truncate(tuning.snapshot_projectile_limit);
        world.power_ups.truncate(tuning.snapshot_powerup_limit);
        for target in &mut world.targets {
            target.trail.clear();
        }
        world.events.clear();

        Self {
            v: SNAPSHOT_VERSION,
            saved_at: if saved_at.is_finite() { saved_at } else { 0.0 },
            phase: world.phase,
            settings,
            world,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse and normalize untrusted JSON
    pub fn from_json(json: &str, tuning: &Tuning) -> Result<Self> {
        normalize::normalize_str(json, tuning)
    }

    /// Parse, falling back to `None` (with a warning) on malformed input
    pub fn from_json_or_discard(json: &str, tuning: &Tuning) -> Option<Self> {
        match Self::from_json(json, tuning) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!("Discarding saved snapshot: {}", e);
                None
            }
        }
    }

    /// Restored phases never resume motion directly
    pub fn paused_for_restore(mut self) -> Self {
        if self.phase == GamePhase::Playing {
            self.phase = GamePhase::Paused;
            self.world.phase = GamePhase::Paused;
        }
        self
    }

    /// Reject envelopes written by a newer format
    pub(crate) fn check_version(v: u64) -> Result<u32> {
        match u32::try_from(v) {
            Ok(v) if v <= SNAPSHOT_VERSION => Ok(v),
            _ => Err(PersistenceError::MalformedSnapshot(format!(
                "unsupported snapshot version {}",
                v
            ))),
        }
    }
}
