//! Prometheus text exposition.
//!
//! See: https://prometheus.io/docs/instrumenting/exposition_formats/
//!
//! Samples are grouped into families by canonical name
//! (`envoy_` + sanitized tag-extracted name). Each family gets one `# TYPE`
//! line followed by all of its samples, in the order they were supplied.
//! Names that differ only in characters collapsed by sanitization end up in
//! the same family.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::stats::store::{Counter, Gauge, Tag};

const METRIC_PREFIX: &str = "envoy_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Counter => f.write_str("counter"),
            MetricType::Gauge => f.write_str("gauge"),
        }
    }
}

/// One value to expose, as read from the stats store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub name: String,
    pub value: u64,
    pub tags: Vec<Tag>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: u64, tags: Vec<Tag>) -> Self {
        Self {
            name: name.into(),
            value,
            tags,
        }
    }
}

impl From<&Counter> for MetricSample {
    fn from(counter: &Counter) -> Self {
        Self::new(counter.tag_extracted_name(), counter.value(), counter.tags().to_vec())
    }
}

impl From<&Gauge> for MetricSample {
    fn from(gauge: &Gauge) -> Self {
        Self::new(gauge.tag_extracted_name(), gauge.value(), gauge.tags().to_vec())
    }
}

struct Family<'a> {
    name: String,
    kind: MetricType,
    samples: Vec<&'a MetricSample>,
}

/// Render counters and gauges. Returns the body and the number of metric
/// families (distinct canonical names) emitted.
///
/// A gauge whose canonical name matches an earlier counter joins that
/// counter's family. Samples whose name sanitizes to nothing are skipped.
pub fn format(counters: &[MetricSample], gauges: &[MetricSample]) -> (String, usize) {
    let mut families: Vec<Family<'_>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (kind, samples) in [(MetricType::Counter, counters), (MetricType::Gauge, gauges)] {
        for sample in samples {
            let Some(name) = metric_name(&sample.name) else {
                tracing::debug!(kind = %kind, value = sample.value, "Skipping metric with empty name");
                continue;
            };
            let slot = *by_name.entry(name.clone()).or_insert_with(|| {
                families.push(Family {
                    name,
                    kind,
                    samples: Vec::new(),
                });
                families.len() - 1
            });
            families[slot].samples.push(sample);
        }
    }

    let mut out = String::new();
    for family in &families {
        let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind);
        for sample in &family.samples {
            if sample.tags.is_empty() {
                let _ = writeln!(out, "{} {}", family.name, sample.value);
            } else {
                let _ = writeln!(
                    out,
                    "{}{{{}}} {}",
                    family.name,
                    formatted_tags(&sample.tags),
                    sample.value
                );
            }
        }
    }
    (out, families.len())
}

/// Comma-separated `name="value"` pairs in the supplied order.
pub fn formatted_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| format!("{}=\"{}\"", sanitize_name(&tag.name), escape_label_value(&tag.value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `envoy_` + sanitized name, or `None` when nothing is left to prefix.
pub fn metric_name(extracted_name: &str) -> Option<String> {
    let sanitized = sanitize_name(extracted_name);
    if sanitized.is_empty() {
        return None;
    }
    Some(format!("{}{}", METRIC_PREFIX, sanitized))
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`, one `_` per
/// character rather than per UTF-8 byte.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Escape `\`, `"` and newlines inside a quoted label value.
pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
