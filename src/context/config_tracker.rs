//! Registry of configuration producers for `/config_dump`.
//!
//! Producers register a callback under a unique key and hold the returned
//! [`EntryOwner`]. Dropping the owner unregisters the callback.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::{Map, Value};

pub type ConfigCallback = Arc<dyn Fn() -> Value + Send + Sync>;

type Entries = Mutex<BTreeMap<String, ConfigCallback>>;

#[derive(Default)]
pub struct ConfigTracker {
    entries: Arc<Entries>,
}

impl ConfigTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`. Returns `None` if the key is taken.
    pub fn add(
        &self,
        key: impl Into<String>,
        callback: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Option<EntryOwner> {
        let key = key.into();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return None;
        }
        entries.insert(key.clone(), Arc::new(callback));
        Some(EntryOwner {
            key,
            entries: Arc::downgrade(&self.entries),
        })
    }

    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    /// `{"configs": {key: value, ...}}` with keys sorted. Callbacks run
    /// outside the lock.
    pub fn dump(&self) -> Value {
        let callbacks: Vec<(String, ConfigCallback)> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect()
        };

        let mut configs = Map::new();
        for (key, callback) in callbacks {
            configs.insert(key, callback());
        }
        let mut root = Map::new();
        root.insert("configs".to_string(), Value::Object(configs));
        Value::Object(root)
    }
}

/// Keeps a tracker entry registered while alive.
pub struct EntryOwner {
    key: String,
    entries: Weak<Entries>,
}

impl EntryOwner {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for EntryOwner {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.key);
        }
    }
}
