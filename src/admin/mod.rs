//! Admin subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request (axum, server.rs)
//!     → lifecycle.rs  AdminFilter buffers until end of stream
//!     → registry.rs   exact-path lookup, POST check for mutating routes
//!     → handlers.rs   built-in handler reads/mutates ServerContext
//!     → request.rs    AdminResponse (status, headers, body)
//!     → access_log.rs one line per request
//! ```
//!
//! # Design Decisions
//! - Routes are plain records holding a callable; the registry is the only
//!   shared mutable structure and its lock is never held across a handler
//! - Every failure becomes a response inside dispatch (see error.rs)
//! - `AdminServer` is an explicit composition root; nothing is global

pub mod access_log;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod server;

pub use access_log::AccessLog;
pub use error::{AdminError, AdminResult};
pub use lifecycle::{AdminFilter, Dispatcher, RequestState};
pub use registry::{HandlerRegistry, Route};
pub use request::{AdminRequest, AdminResponse, QueryParams};
pub use server::{AdminServer, FilterChainFactory};
