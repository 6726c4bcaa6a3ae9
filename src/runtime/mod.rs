//! Runtime feature flags and tunables.
//!
//! # Data Flow
//! ```text
//! config [runtime.values]   → static layer
//! override file (TOML)      → override layer (reloaded by config::watcher)
//!     → loader.rs merges    → Snapshot (override wins)
//!     → ArcSwap             → readers (/runtime, feature checks)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a reload builds a new one and swaps it in
//! - Readers never block writers

pub mod loader;

pub use loader::{Entry, Layer, RuntimeError, RuntimeLoader, Snapshot};
