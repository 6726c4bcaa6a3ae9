//! Text and JSON renderings of stats and runtime values.
//!
//! Inputs arrive already ordered by name, so output is a pure function of
//! the input and stable across calls.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::runtime::Entry;
use crate::stats::store::StatsStore;

/// Counters and gauges merged into one name-ordered map.
/// A gauge sharing a counter's name is shadowed by the counter.
pub fn all_stats(store: &StatsStore) -> BTreeMap<String, u64> {
    let mut all = BTreeMap::new();
    for counter in store.counters() {
        all.entry(counter.name().to_string())
            .or_insert_with(|| counter.value());
    }
    for gauge in store.gauges() {
        all.entry(gauge.name().to_string())
            .or_insert_with(|| gauge.value());
    }
    all
}

/// `name: value` lines.
pub fn stats_as_text(all_stats: &BTreeMap<String, u64>) -> String {
    let mut out = String::new();
    for (name, value) in all_stats {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}

/// One JSON member per stat.
pub fn stats_as_json(all_stats: &BTreeMap<String, u64>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(all_stats)
}

/// One JSON member per runtime key: `{"value": <uint or string>, "layer": "<layer>"}`.
pub fn runtime_as_json(entries: &[(String, Entry)]) -> Result<String, serde_json::Error> {
    let mut object = Map::new();
    for (name, entry) in entries {
        let value = match entry.uint_value {
            Some(v) => Value::from(v),
            None => Value::from(entry.raw_value.clone()),
        };
        let mut member = Map::new();
        member.insert("value".to_string(), value);
        member.insert("layer".to_string(), Value::from(entry.layer.as_str()));
        object.insert(name.clone(), Value::Object(member));
    }
    serde_json::to_string_pretty(&Value::Object(object))
}
