//! Best-effort remote snapshot sync
//!
//! Remote writes go through a single-slot mailbox: the newest snapshot
//! overwrites any pending one, at most one write is in flight, and a write
//! offered mid-flight goes out after the in-flight one completes. Nothing
//! here owns a timer; the frame loop polls with the current time.

use std::collections::HashMap;

use serde_json::Value;

use super::{PersistenceError, Result};
use crate::consts::{REMOTE_COLLECTION, REMOTE_DEBOUNCE_MS};

/// Document path holding a user's save
pub fn remote_path(uid: &str) -> String {
    format!("{}/{}", REMOTE_COLLECTION, uid)
}

/// Remote document store (one document per user)
pub trait RemoteStore {
    fn read(&mut self, path: &str) -> Result<Option<Value>>;
    /// With `merge`, top-level fields not in `body` are preserved
    fn write(&mut self, path: &str, body: &Value, merge: bool) -> Result<()>;
}

/// A snapshot waiting for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub path: String,
    pub body: Value,
    pub saved_at: f64,
}

/// Single-slot, debounced remote write mailbox
#[derive(Debug)]
pub struct RemoteSync {
    pending: Option<PendingWrite>,
    due_at: f64,
    in_flight: bool,
    debounce_ms: f64,
    superseded: u64,
}

impl Default for RemoteSync {
    fn default() -> Self {
        Self::new(REMOTE_DEBOUNCE_MS)
    }
}

impl RemoteSync {
    pub fn new(debounce_ms: f64) -> Self {
        Self {
            pending: None,
            due_at: 0.0,
            in_flight: false,
            debounce_ms: debounce_ms.max(0.0),
            superseded: 0,
        }
    }

    /// Queue the latest snapshot. Later offers within the same window
    /// replace the payload but keep the original due time.
    pub fn offer(&mut self, write: PendingWrite, now: f64, immediate: bool) {
        match self.pending.replace(write) {
            Some(old) => {
                self.superseded += 1;
                log::debug!("Remote write superseded (savedAt {})", old.saved_at);
            }
            None => self.due_at = now + self.debounce_ms,
        }
        if immediate {
            self.due_at = self.due_at.min(now);
        }
    }

    /// Take the pending write if it is due and nothing is in flight
    pub fn poll(&mut self, now: f64) -> Option<PendingWrite> {
        if self.in_flight || now < self.due_at {
            return None;
        }
        let write = self.pending.take()?;
        self.in_flight = true;
        Some(write)
    }

    /// Report the outcome of the in-flight write
    pub fn complete(&mut self, result: Result<()>) {
        self.in_flight = false;
        if let Err(e) = result {
            log::warn!("Remote save failed: {}", e);
        }
    }

    /// Poll and deliver through a synchronous store
    pub fn pump(&mut self, store: &mut dyn RemoteStore, now: f64) -> Option<bool> {
        let write = self.poll(now)?;
        let result = store.write(&write.path, &write.body, true);
        let ok = result.is_ok();
        self.complete(result);
        Some(ok)
    }

    /// Drop anything queued (identity changed)
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Writes replaced before they were sent
    pub fn superseded_count(&self) -> u64 {
        self.superseded
    }
}

/// In-process remote store (tests and headless runs)
#[derive(Debug, Default)]
pub struct MemoryRemote {
    docs: HashMap<String, Value>,
    /// Fail every call while set
    pub offline: bool,
    pub writes: usize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc(&self, path: &str) -> Option<&Value> {
        self.docs.get(path)
    }
}

impl RemoteStore for MemoryRemote {
    fn read(&mut self, path: &str) -> Result<Option<Value>> {
        if self.offline {
            return Err(PersistenceError::Remote("offline".into()));
        }
        Ok(self.docs.get(path).cloned())
    }

    fn write(&mut self, path: &str, body: &Value, merge: bool) -> Result<()> {
        if self.offline {
            return Err(PersistenceError::Remote("offline".into()));
        }
        self.writes += 1;
        if merge {
            if let (Some(Value::Object(existing)), Value::Object(fields)) =
                (self.docs.get_mut(path), body)
            {
                for (k, v) in fields {
                    existing.insert(k.clone(), v.clone());
                }
                return Ok(());
            }
        }
        self.docs.insert(path.to_string(), body.clone());
        Ok(())
    }
}
