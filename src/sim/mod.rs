//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or storage dependencies

pub mod buffs;
pub mod clock;
pub mod collision;
pub mod hull;
pub mod lifecycle;
pub mod physics;
pub mod spawner;
pub mod state;
pub mod tick;

pub use buffs::{BuffTimers, BuffTransition, FirePattern, PowerUpKind, ShieldState, WeaponKind};
pub use clock::{FrameSteps, SimulationClock, interpolate};
pub use collision::CollisionReport;
pub use spawner::{SpawnOutcome, ZoneCounts};
pub use state::{
    ControlMode, GamePhase, Player, PowerUp, Projectile, ProjectileKind, SimEvent, Target, World,
};
pub use tick::{TickInput, start_run, tick};
