//! Structured logging and live verbosity control.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Keep a fixed set of named loggers, one per subsystem
//! - Change logger levels at runtime (`/logging`)
//!
//! # Design Decisions
//! - Each logger maps to the tracing target `proxy_admin::<name>`
//! - The `EnvFilter` sits behind a `reload::Layer`; a level change rebuilds
//!   the whole directive and swaps it in
//! - The levels lock is held across the reload, and recorded levels change
//!   only once the new filter is live
//! - `critical` is accepted and filters like `error`

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Loggers that can be adjusted through `/logging`.
pub const LOGGERS: &[&str] = &[
    "admin",
    "config",
    "context",
    "lifecycle",
    "observability",
    "runtime",
    "stats",
];

const TARGET_PREFIX: &str = "proxy_admin";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown logger: {0}")]
    UnknownLogger(String),

    #[error("failed to apply log filter: {0}")]
    Reload(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Off,
}

impl Level {
    pub fn parse(s: &str) -> Option<Level> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warning" | "warn" => Some(Level::Warning),
            "error" => Some(Level::Error),
            "critical" => Some(Level::Critical),
            "off" => Some(Level::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
            Level::Off => "off",
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warn",
            Level::Error | Level::Critical => "error",
            Level::Off => "off",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Clone)]
struct Levels {
    base: Level,
    loggers: BTreeMap<&'static str, Level>,
}

/// Named logger levels plus the handle that applies them.
pub struct LogControl {
    levels: Mutex<Levels>,
    handle: Option<FilterHandle>,
}

impl LogControl {
    /// A control with no subscriber attached. Level changes are recorded only.
    pub fn detached(level: Level) -> Self {
        Self::build(level, None)
    }

    fn build(level: Level, handle: Option<FilterHandle>) -> Self {
        let loggers = LOGGERS.iter().map(|name| (*name, level)).collect();
        Self {
            levels: Mutex::new(Levels {
                base: level,
                loggers,
            }),
            handle,
        }
    }

    pub fn is_logger(&self, name: &str) -> bool {
        LOGGERS.contains(&name)
    }

    /// `(logger, level)` pairs ordered by logger name.
    pub fn loggers(&self) -> Vec<(&'static str, Level)> {
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        levels.loggers.iter().map(|(k, v)| (*k, *v)).collect()
    }

    pub fn level_of(&self, name: &str) -> Option<Level> {
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        levels.loggers.get(name).copied()
    }

    pub fn set_level(&self, logger: &str, level: Level) -> Result<(), LoggingError> {
        if !self.is_logger(logger) {
            return Err(LoggingError::UnknownLogger(logger.to_string()));
        }
        self.update(|levels| {
            if let Some(slot) = levels.loggers.get_mut(logger) {
                *slot = level;
            }
        })
    }

    /// Set every logger, and the level for targets outside this crate.
    pub fn set_all(&self, level: Level) -> Result<(), LoggingError> {
        self.update(|levels| {
            levels.base = level;
            for slot in levels.loggers.values_mut() {
                *slot = level;
            }
        })
    }

    fn update(&self, change: impl FnOnce(&mut Levels)) -> Result<(), LoggingError> {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = levels.clone();
        change(&mut next);
        self.apply(&render_directive(&next))?;
        *levels = next;
        Ok(())
    }

    /// Current `EnvFilter` directive string.
    pub fn directive(&self) -> String {
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        render_directive(&levels)
    }

    /// `name: level` lines, ordered by name.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, level) in self.loggers() {
            out.push_str(&format!("  {}: {}\n", name, level));
        }
        out
    }

    fn apply(&self, directive: &str) -> Result<(), LoggingError> {
        tracing::debug!(directive = %directive, "Applying log filter");
        let Some(handle) = &self.handle else {
            return Ok(());
        };
        let filter =
            EnvFilter::try_new(directive).map_err(|e| LoggingError::Reload(e.to_string()))?;
        handle
            .reload(filter)
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }
}

fn render_directive(levels: &Levels) -> String {
    let mut parts = vec![levels.base.directive().to_string()];
    for (name, level) in &levels.loggers {
        parts.push(format!("{}::{}={}", TARGET_PREFIX, name, level.directive()));
    }
    parts.join(",")
}

/// Install the global subscriber with every logger at `level`.
pub fn init_logging(level: Level) -> Result<Arc<LogControl>, LoggingError> {
    let detached = LogControl::detached(level);
    let filter =
        EnvFilter::try_new(detached.directive()).map_err(|e| LoggingError::Init(e.to_string()))?;
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(Arc::new(LogControl::build(level, Some(handle))))
}
