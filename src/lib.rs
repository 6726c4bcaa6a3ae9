//! Administrative HTTP surface for a running proxy process.
//!
//! # Architecture Overview
//!
//! ```text
//!     Operator / scraper
//!     ──────────────────▶ admin::server (axum adapter)
//!                              │
//!                              ▼
//!                         admin::lifecycle (buffer, dispatch once)
//!                              │
//!                              ▼
//!                         admin::registry (exact path → Route)
//!                              │
//!                              ▼
//!                         admin::handlers ──▶ stats::{format, prometheus}
//!                              │
//!                              ▼
//!                         context::ServerContext
//!                           ├── stats::StatsStore
//!                           ├── runtime::RuntimeLoader
//!                           ├── observability::LogControl
//!                           ├── clusters / listeners / certs
//!                           ├── profiler / hot restart
//!                           └── lifecycle::Shutdown
//! ```

pub mod admin;
pub mod config;
pub mod context;
pub mod lifecycle;
pub mod observability;
pub mod runtime;
pub mod stats;

pub use admin::{AccessLog, AdminServer, HandlerRegistry, Route};
pub use config::schema::ProxyConfig;
pub use context::ServerContext;
pub use lifecycle::Shutdown;
