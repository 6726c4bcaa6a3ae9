//! Layered runtime values.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to read runtime override file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse runtime override file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where a runtime value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Static,
    Override,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Static => "static",
            Layer::Override => "override",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub raw_value: String,
    pub uint_value: Option<u64>,
    pub layer: Layer,
}

impl Entry {
    pub fn new(raw_value: impl Into<String>, layer: Layer) -> Self {
        let raw_value = raw_value.into();
        let uint_value = raw_value.trim().parse::<u64>().ok();
        Self {
            raw_value,
            uint_value,
            layer,
        }
    }
}

/// An immutable view of all runtime values.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: BTreeMap<String, Entry>,
}

impl Snapshot {
    fn merge(static_layer: &BTreeMap<String, String>, override_layer: &BTreeMap<String, String>) -> Self {
        let mut values = BTreeMap::new();
        for (key, value) in static_layer {
            values.insert(key.clone(), Entry::new(value.clone(), Layer::Static));
        }
        for (key, value) in override_layer {
            values.insert(key.clone(), Entry::new(value.clone(), Layer::Override));
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|e| e.raw_value.as_str())
    }

    pub fn get_integer(&self, key: &str, default: u64) -> u64 {
        self.values
            .get(key)
            .and_then(|e| e.uint_value)
            .unwrap_or(default)
    }

    /// A feature is enabled when its value is a non-zero integer or `true`.
    pub fn feature_enabled(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(entry) => match entry.uint_value {
                Some(v) => v > 0,
                None => entry.raw_value.trim().eq_ignore_ascii_case("true"),
            },
            None => default,
        }
    }

    /// Entries ordered by key.
    pub fn sorted_entries(&self) -> Vec<(String, Entry)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Owns the static layer and publishes merged snapshots.
pub struct RuntimeLoader {
    static_layer: BTreeMap<String, String>,
    snapshot: ArcSwap<Snapshot>,
}

impl RuntimeLoader {
    pub fn new(static_layer: BTreeMap<String, String>) -> Self {
        let snapshot = Snapshot::merge(&static_layer, &BTreeMap::new());
        Self {
            static_layer,
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Replace the override layer.
    pub fn reload_overrides(&self, overrides: BTreeMap<String, String>) {
        let snapshot = Snapshot::merge(&self.static_layer, &overrides);
        tracing::info!(
            entries = snapshot.len(),
            overrides = overrides.len(),
            "Runtime snapshot reloaded"
        );
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Read an override file and swap it in. On error the current snapshot stays.
    pub fn load_override_file(&self, path: &Path) -> Result<(), RuntimeError> {
        let content = fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;
        self.reload_overrides(layer_from_table(&table));
        Ok(())
    }
}

impl Default for RuntimeLoader {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

/// Flatten a TOML table into dotted keys with string values.
pub fn layer_from_table(table: &toml::Table) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(&mut out, "", table);
    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, table: &toml::Table) {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(inner) => flatten_into(out, &name, inner),
            toml::Value::String(s) => {
                out.insert(name, s.clone());
            }
            other => {
                out.insert(name, other.to_string());
            }
        }
    }
}
