//! Key-value storage behind the client.
//!
//! The client only ever sees [`KeyValueStore`]: a string-keyed, string-valued
//! store with the same shape as a browser's `localStorage`. [`MemoryStore`]
//! keeps everything in process memory; [`crate::local_db_state::AppDbState`]
//! persists to LMDB.

use std::collections::HashMap;
use std::sync::RwLock;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A poisoned lock only means another thread panicked mid-call; the map itself
// is still a valid map, so keep using it.
impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.clear();
        Ok(())
    }
}

/// Reads and decodes `key`.
///
/// Backend errors and corrupt JSON are logged and reported as absent; callers
/// never see a read failure.
pub fn read_json<T, S>(store: &S, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let raw = match store.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read key {key}: {e}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt value under {key}: {e}");
            None
        }
    }
}

pub fn write_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_string(value)?;
    store.set_item(key, &json)
}

/// Names of every key the client reads or writes, under one prefix.
#[derive(Debug, Clone)]
pub struct StorageKeys {
    prefix: String,
}

impl StorageKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn session(&self) -> String {
        format!("{}_session", self.prefix)
    }

    pub fn user(&self) -> String {
        format!("{}_user", self.prefix)
    }

    pub fn users(&self) -> String {
        format!("{}_users", self.prefix)
    }

    pub fn table(&self, table: &str) -> String {
        format!("{}_table_{}", self.prefix, table)
    }

    /// Legacy user id -> role map.
    pub fn roles(&self) -> String {
        format!("{}_roles", self.prefix)
    }

    /// Email -> role, for sign-ups whose user id is not known yet.
    pub fn roles_by_email(&self) -> String {
        format!("{}_roles_by_email", self.prefix)
    }

    pub fn pending_profiles(&self) -> String {
        format!("{}_pending_profiles", self.prefix)
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_KEY_PREFIX)
    }
}
