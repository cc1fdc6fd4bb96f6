//! Player settings
//!
//! Persisted inside every snapshot so a restored run keeps its look and
//! collision behaviour.

use serde::{Deserialize, Serialize};

/// Whether targets resolve pairwise collisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollisionMode {
    /// Targets bounce off each other
    #[default]
    Solid,
    /// Targets pass through each other (repulsion still applies)
    Ghost,
}

impl CollisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionMode::Solid => "solid",
            CollisionMode::Ghost => "ghost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "solid" | "on" | "bounce" => Some(CollisionMode::Solid),
            "ghost" | "off" | "none" => Some(CollisionMode::Ghost),
            _ => None,
        }
    }

    pub fn resolves_pairs(&self) -> bool {
        *self == CollisionMode::Solid
    }
}

/// Presentation theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisualMode {
    #[default]
    Classic,
    Neon,
    Minimal,
}

impl VisualMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualMode::Classic => "classic",
            VisualMode::Neon => "neon",
            VisualMode::Minimal => "minimal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "classic" | "default" => Some(VisualMode::Classic),
            "neon" => Some(VisualMode::Neon),
            "minimal" | "min" => Some(VisualMode::Minimal),
            _ => None,
        }
    }
}

/// Cosmetic ship; also selects the player's hitbox shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShipModel {
    #[default]
    Arrow,
    Saucer,
    Needle,
}

impl ShipModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipModel::Arrow => "arrow",
            ShipModel::Saucer => "saucer",
            ShipModel::Needle => "needle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "arrow" | "fighter" => Some(ShipModel::Arrow),
            "saucer" | "ufo" => Some(ShipModel::Saucer),
            "needle" => Some(ShipModel::Needle),
            _ => None,
        }
    }
}

/// Settings stored alongside the world in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub collision_mode: CollisionMode,
    pub visual_mode: VisualMode,
    pub ship_model: ShipModel,
}

impl Settings {
    /// Build settings from loosely-typed strings; unknown values use defaults
    pub fn from_strs(collision: Option<&str>, visual: Option<&str>, ship: Option<&str>) -> Self {
        Self {
            collision_mode: collision
                .and_then(CollisionMode::from_str)
                .unwrap_or_default(),
            visual_mode: visual.and_then(VisualMode::from_str).unwrap_or_default(),
            ship_model: ship.and_then(ShipModel::from_str).unwrap_or_default(),
        }
    }
}
