//! Stats subsystem.
//!
//! # Data Flow
//! ```text
//! Subsystems record:
//!     metrics::counter!/gauge! → recorder.rs → store.rs
//!     direct handles           → store.rs (Counter / Gauge / Scope)
//!
//! Admin reads:
//!     store.rs snapshot → format.rs     (/stats text, JSON)
//!                       → prometheus.rs (/stats/prometheus)
//! ```
//!
//! # Design Decisions
//! - Formatters are pure functions of their input
//! - Prometheus output uses tag-extracted names; `/stats` uses full names

pub mod format;
pub mod prometheus;
pub mod recorder;
pub mod store;

pub use prometheus::MetricSample;
pub use recorder::StoreRecorder;
pub use store::{Counter, Gauge, Scope, StatsStore, Tag};
