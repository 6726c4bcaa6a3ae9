//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → context builder
//!
//! Runtime override file:
//!     watcher.rs detects change
//!     → RuntimeLoader reloads the override layer
//!     → atomic swap of the runtime snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the runtime override layer reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::ProxyConfig;
pub use validation::ValidationError;
