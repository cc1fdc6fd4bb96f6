//! Local snapshot stores
//!
//! Local writes are synchronous and authoritative. The browser build keeps
//! saves in `localStorage`; the native build writes one file per key with
//! an atomic replace.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::Result;
#[cfg(target_arch = "wasm32")]
use super::PersistenceError;
use crate::consts::STORAGE_KEY_PREFIX;

/// Who the saves belong to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Guest,
    User(String),
}

impl Identity {
    /// Blank ids fall back to the guest identity
    pub fn from_uid(uid: Option<&str>) -> Self {
        match uid.map(str::trim) {
            Some(uid) if !uid.is_empty() => Identity::User(uid.to_string()),
            _ => Identity::Guest,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Guest => None,
            Identity::User(uid) => Some(uid),
        }
    }
}

/// Local storage key, namespaced per identity
pub fn storage_key(identity: &Identity) -> String {
    match identity {
        Identity::Guest => format!("{}:guest", STORAGE_KEY_PREFIX),
        Identity::User(uid) => format!("{}:{}", STORAGE_KEY_PREFIX, uid),
    }
}

/// Synchronous key-value store for snapshots
pub trait LocalStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store (tests and headless runs)
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LocalStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File for a key; anything outside `[A-Za-z0-9_-]` becomes `_`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

impl LocalStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        write_atomic(&self.path_for(key), value.as_bytes())?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to a sibling temp file, then swap it into place
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// `window.localStorage` (WASM only)
#[cfg(target_arch = "wasm32")]
pub struct BrowserStore {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl BrowserStore {
    pub fn new() -> Result<Self> {
        let storage = web_sys::window()
            .ok_or_else(|| PersistenceError::Local("no window".into()))?
            .local_storage()
            .map_err(|e| PersistenceError::Local(format!("{:?}", e)))?
            .ok_or_else(|| PersistenceError::Local("localStorage unavailable".into()))?;
        Ok(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl LocalStore for BrowserStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| PersistenceError::Local(format!("{:?}", e)))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| PersistenceError::Local(format!("{:?}", e)))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| PersistenceError::Local(format!("{:?}", e)))
    }
}
