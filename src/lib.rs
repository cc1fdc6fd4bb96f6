//! Splitfall - arena survival simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, collisions, spawning, lifecycle)
//! - `persistence`: Snapshot save/restore across a local and a remote store
//! - `platform`: Browser/native platform abstraction
//! - `highscores`: Leaderboard normalization and score submission
//! - `tuning`: Data-driven game balance

pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use highscores::{HighScores, LeaderboardEntry};
pub use settings::{CollisionMode, Settings, ShipModel, VisualMode};
pub use tuning::Tuning;

use glam::Vec2;

/// Structural constants (not balance values; see `tuning` for those)
pub mod consts {
    /// Fixed simulation timestep (120 Hz for stable stacking)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest wall-clock delta accepted for one frame (seconds)
    pub const MAX_FRAME_DELTA: f32 = 0.1;

    /// Snapshot format version
    pub const SNAPSHOT_VERSION: u32 = 3;
    /// Prefix for local storage keys
    pub const STORAGE_KEY_PREFIX: &str = "splitfall:save";
    /// Remote collection holding one save document per user
    pub const REMOTE_COLLECTION: &str = "arenaSaves";
    /// Remote write coalescing window (ms)
    pub const REMOTE_DEBOUNCE_MS: f64 = 2500.0;

    /// Leaderboard size
    pub const LEADERBOARD_SIZE: usize = 10;

    /// Trail samples kept per target
    pub const TRAIL_LENGTH: usize = 6;
}

/// Closest point to `p` on segment `a`-`b`
#[inline]
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Returns the value if finite, otherwise the fallback
#[inline]
pub fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

/// Vector with both components finite
#[inline]
pub fn is_finite_vec(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
