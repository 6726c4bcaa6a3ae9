//! Bridge from the `metrics` facade into [`StatsStore`].
//!
//! Subsystems record with `metrics::counter!` / `metrics::gauge!`; once the
//! recorder is installed those values show up on `/stats` and
//! `/stats/prometheus`. Labels become tags. The full stat name places the
//! label values after the first dotted segment, so
//! `counter!("cluster.upstream_cx_total", "cluster_name" => "foo")` is stored as
//! `cluster.foo.upstream_cx_total` with tag-extracted name
//! `cluster.upstream_cx_total`. Histograms are dropped.

use std::sync::Arc;

use metrics::{
    CounterFn, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SetRecorderError,
    SharedString, Unit,
};

use crate::stats::store::{Counter, Gauge, StatsStore, Tag};

pub struct StoreRecorder {
    store: Arc<StatsStore>,
}

impl StoreRecorder {
    pub fn new(store: Arc<StatsStore>) -> Self {
        Self { store }
    }

    /// Install as the process-wide recorder. Fails if one is already set.
    pub fn install(self) -> Result<(), SetRecorderError<Self>> {
        metrics::set_global_recorder(self)
    }
}

/// Full stat name and tags for a `metrics` key.
fn stat_name(key: &Key) -> (String, Vec<Tag>) {
    let tags: Vec<Tag> = key
        .labels()
        .map(|label| Tag::new(label.key(), label.value()))
        .collect();
    if tags.is_empty() {
        return (key.name().to_string(), tags);
    }

    let values: Vec<&str> = tags.iter().map(|t| t.value.as_str()).collect();
    let values = values.join(".");
    let name = match key.name().split_once('.') {
        Some((head, tail)) => format!("{}.{}.{}", head, values, tail),
        None => format!("{}.{}", key.name(), values),
    };
    (name, tags)
}

impl Recorder for StoreRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Counter {
        let (name, tags) = stat_name(key);
        metrics::Counter::from_arc(self.store.counter_with_tags(&name, key.name(), tags))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Gauge {
        let (name, tags) = stat_name(key);
        metrics::Gauge::from_arc(self.store.gauge_with_tags(&name, key.name(), tags))
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

impl CounterFn for Counter {
    fn increment(&self, value: u64) {
        self.add(value);
    }

    fn absolute(&self, value: u64) {
        Counter::absolute(self, value);
    }
}

// Gauges hold whole numbers; fractional and negative inputs are truncated/clamped.
impl GaugeFn for Gauge {
    fn increment(&self, value: f64) {
        self.add(value as u64);
    }

    fn decrement(&self, value: f64) {
        self.sub(value as u64);
    }

    fn set(&self, value: f64) {
        Gauge::set(self, value as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_counter_lands_in_store() {
        let store = Arc::new(StatsStore::new());
        let recorder = StoreRecorder::new(store.clone());

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("cluster.upstream_cx_total", "cluster_name" => "foo").increment(3);
            metrics::counter!("server.live").increment(1);
        });

        let counter = store.counter("cluster.foo.upstream_cx_total");
        assert_eq!(counter.value(), 3);
        assert_eq!(counter.tag_extracted_name(), "cluster.upstream_cx_total");
        assert_eq!(counter.tags(), &[Tag::new("cluster_name", "foo")]);
        assert_eq!(store.counter("server.live").value(), 1);
    }

    #[test]
    fn gauge_updates_clamp_at_zero() {
        let store = Arc::new(StatsStore::new());
        let recorder = StoreRecorder::new(store.clone());

        metrics::with_local_recorder(&recorder, || {
            let gauge = metrics::gauge!("listener.active", "listener" => "http");
            gauge.set(5.0);
            gauge.decrement(2.0);
            gauge.decrement(10.0);
        });

        assert_eq!(store.gauge("listener.http.active").value(), 0);
    }

    #[test]
    fn undotted_names_append_label_values() {
        let key = Key::from_parts("requests", vec![metrics::Label::new("method", "GET")]);
        let (name, tags) = stat_name(&key);
        assert_eq!(name, "requests.GET");
        assert_eq!(tags, vec![Tag::new("method", "GET")]);
    }
}
