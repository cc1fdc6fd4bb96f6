//! Snapshot save/restore across a local and a remote store
//!
//! Features:
//! - Versioned JSON snapshot envelope
//! - Defensive normalization of untrusted input
//! - Synchronous local writes, debounced single-slot remote writes
//! - Newest-wins restore guarded by a restore token

pub mod gateway;
pub mod normalize;
pub mod remote;
pub mod restore;
pub mod snapshot;
pub mod store;

pub use gateway::{AutosavePolicy, PersistenceGateway, SaveUrgency};
pub use normalize::{normalize_snapshot, normalize_str, normalize_world};
pub use remote::{MemoryRemote, PendingWrite, RemoteStore, RemoteSync, remote_path};
pub use restore::{RestoreOutcome, RestoreSource, RestoreTicket, RestoreTracker, pick_newest};
pub use snapshot::Snapshot;
pub use store::{FileStore, Identity, LocalStore, MemoryStore, storage_key};

#[cfg(target_arch = "wasm32")]
pub use store::BrowserStore;

use thiserror::Error;

/// Everything that can go wrong at the persistence boundary
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("local store error: {0}")]
    Local(String),
    #[error("remote store error: {0}")]
    Remote(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
