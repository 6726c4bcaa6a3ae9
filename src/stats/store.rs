//! In-process counter and gauge storage.
//!
//! # Responsibilities
//! - Own counter/gauge values for the whole process
//! - Keep each metric's tag-extracted name and tags alongside its full name
//! - Provide prefixed scopes (e.g. `http.admin.`)
//! - Snapshot metrics sorted by name, reset counters
//!
//! # Design Decisions
//! - Values are atomics, metrics are shared as `Arc`s; updates never lock
//! - `DashMap` for registration so concurrent get-or-create is safe
//! - Counters are monotonic except for an explicit reset

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// A name/value pair attached to a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Identity shared by counters and gauges.
#[derive(Debug, Clone)]
struct MetricName {
    name: String,
    tag_extracted_name: String,
    tags: Vec<Tag>,
}

/// A monotonically increasing value.
pub struct Counter {
    id: MetricName,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_tags(name.clone(), name, Vec::new())
    }

    pub fn with_tags(
        name: impl Into<String>,
        tag_extracted_name: impl Into<String>,
        tags: Vec<Tag>,
    ) -> Self {
        Self {
            id: MetricName {
                name: name.into(),
                tag_extracted_name: tag_extracted_name.into(),
                tags,
            },
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn tag_extracted_name(&self) -> &str {
        &self.id.tag_extracted_name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.id.tags
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Raise the value to `value` if it is currently lower.
    pub fn absolute(&self, value: u64) {
        self.value.fetch_max(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.id.name)
            .field("value", &self.value())
            .finish()
    }
}

/// A value that can go up and down.
pub struct Gauge {
    id: MetricName,
    value: AtomicU64,
}

impl Gauge {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_tags(name.clone(), name, Vec::new())
    }

    pub fn with_tags(
        name: impl Into<String>,
        tag_extracted_name: impl Into<String>,
        tags: Vec<Tag>,
    ) -> Self {
        Self {
            id: MetricName {
                name: name.into(),
                tag_extracted_name: tag_extracted_name.into(),
                tags,
            },
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn tag_extracted_name(&self) -> &str {
        &self.id.tag_extracted_name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.id.tags
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn dec(&self) {
        self.sub(1);
    }

    pub fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Subtract, saturating at zero.
    pub fn sub(&self, amount: u64) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(amount))
            });
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge")
            .field("name", &self.id.name)
            .field("value", &self.value())
            .finish()
    }
}

/// Process-wide metric storage.
#[derive(Debug, Default)]
pub struct StatsStore {
    counters: DashMap<String, Arc<Counter>>,
    gauges: DashMap<String, Arc<Gauge>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create an untagged counter.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        self.counter_with_tags(name, name, Vec::new())
    }

    /// Get or create a counter. Tags only apply when the counter is first created.
    pub fn counter_with_tags(
        &self,
        name: &str,
        tag_extracted_name: &str,
        tags: Vec<Tag>,
    ) -> Arc<Counter> {
        Arc::clone(
            self.counters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Counter::with_tags(name, tag_extracted_name, tags)))
                .value(),
        )
    }

    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        self.gauge_with_tags(name, name, Vec::new())
    }

    pub fn gauge_with_tags(
        &self,
        name: &str,
        tag_extracted_name: &str,
        tags: Vec<Tag>,
    ) -> Arc<Gauge> {
        Arc::clone(
            self.gauges
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Gauge::with_tags(name, tag_extracted_name, tags)))
                .value(),
        )
    }

    /// Look up a counter without creating it.
    pub fn find_counter(&self, name: &str) -> Option<Arc<Counter>> {
        self.counters.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn find_gauge(&self, name: &str) -> Option<Arc<Gauge>> {
        self.gauges.get(name).map(|e| Arc::clone(e.value()))
    }

    /// All counters, sorted by full name.
    pub fn counters(&self) -> Vec<Arc<Counter>> {
        let mut counters: Vec<Arc<Counter>> =
            self.counters.iter().map(|e| Arc::clone(e.value())).collect();
        counters.sort_by(|a, b| a.name().cmp(b.name()));
        counters
    }

    /// All gauges, sorted by full name.
    pub fn gauges(&self) -> Vec<Arc<Gauge>> {
        let mut gauges: Vec<Arc<Gauge>> =
            self.gauges.iter().map(|e| Arc::clone(e.value())).collect();
        gauges.sort_by(|a, b| a.name().cmp(b.name()));
        gauges
    }

    pub fn reset_counters(&self) {
        for entry in self.counters.iter() {
            entry.value().reset();
        }
    }

    pub fn scope(self: &Arc<Self>, prefix: impl Into<String>) -> Scope {
        Scope {
            store: Arc::clone(self),
            prefix: prefix.into(),
        }
    }
}

/// A prefixed view of the store.
#[derive(Debug, Clone)]
pub struct Scope {
    store: Arc<StatsStore>,
    prefix: String,
}

impl Scope {
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        self.store.counter(&format!("{}{}", self.prefix, name))
    }

    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        self.store.gauge(&format!("{}{}", self.prefix, name))
    }
}
