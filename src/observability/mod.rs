//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (targets proxy_admin::<subsystem>)
//!     → logging.rs filter (reloadable, driven by /logging)
//!     → fmt layer (stdout)
//! ```
//!
//! Metrics live in `crate::stats`.

pub mod logging;

pub use logging::{init_logging, Level, LogControl, LoggingError};
