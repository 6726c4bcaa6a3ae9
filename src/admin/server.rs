//! Admin server composition root and HTTP adapter.
//!
//! # Responsibilities
//! - Own the handler registry, seeded with the built-in routes
//! - Record admin listener stats and the access log for every HTTP request
//! - Create one [`AdminFilter`] per request and feed it from axum
//! - Cap request bodies so one POST cannot buffer without bound
//! - Serve until the context's shutdown fires
//!
//! # Data Flow
//! ```text
//! axum fallback
//!     → AdminFilter (headers, body frames, trailers)
//!     → AdminInner::dispatch (stats, access log)
//!     → HandlerRegistry::dispatch (lookup, method check, handler)
//!     → AdminResponse → axum Response
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::{BodyExt, LengthLimitError};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::admin::access_log::AccessLog;
use crate::admin::error::AdminResult;
use crate::admin::handlers::register_builtins;
use crate::admin::lifecycle::{incomplete_request, AdminFilter, Dispatcher};
use crate::admin::registry::{HandlerRegistry, Route};
use crate::admin::request::{AdminRequest, AdminResponse};
use crate::context::ServerContext;
use crate::stats::{Counter, Gauge, Scope};

/// Default cap on a buffered admin request body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Creates the per-request filter for an incoming admin stream.
pub trait FilterChainFactory {
    fn create_filter_chain(&self) -> AdminFilter;
}

/// Stats for the admin listener itself, under the listener scope.
struct ListenerStats {
    rq_total: Arc<Counter>,
    rq_active: Arc<Gauge>,
    rq_by_class: [Arc<Counter>; 5],
}

impl ListenerStats {
    fn new(scope: &Scope) -> Self {
        Self {
            rq_total: scope.counter("downstream_rq_total"),
            rq_active: scope.gauge("downstream_rq_active"),
            rq_by_class: [1, 2, 3, 4, 5]
                .map(|class| scope.counter(&format!("downstream_rq_{}xx", class))),
        }
    }

    fn record(&self, status: StatusCode) {
        self.rq_total.inc();
        let class = usize::from(status.as_u16() / 100);
        if let Some(counter) = class.checked_sub(1).and_then(|i| self.rq_by_class.get(i)) {
            counter.inc();
        }
    }
}

struct AdminInner {
    registry: Arc<HandlerRegistry>,
    context: Arc<ServerContext>,
    access_log: AccessLog,
    address: SocketAddr,
    stats: ListenerStats,
}

impl Dispatcher for AdminInner {
    fn dispatch(&self, request: &AdminRequest) -> AdminResponse {
        self.stats.rq_active.inc();
        let response = self.registry.dispatch(request);
        self.stats.rq_active.dec();

        self.stats.record(response.status);
        self.access_log.log(
            &request.method,
            &request.path_and_query,
            response.status,
            response.body.len(),
        );
        response
    }
}

/// The admin endpoint of a running proxy.
#[derive(Clone)]
pub struct AdminServer {
    inner: Arc<AdminInner>,
    max_body_bytes: usize,
}

impl AdminServer {
    /// Build the server and register every built-in route.
    ///
    /// `address` is the listen address reported to operators; `listener_scope`
    /// receives the admin listener's own request stats.
    pub fn new(
        access_log: AccessLog,
        address: SocketAddr,
        context: Arc<ServerContext>,
        listener_scope: Scope,
    ) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        register_builtins(&registry, &context);
        tracing::debug!(routes = registry.len(), "Admin routes registered");

        Self {
            inner: Arc::new(AdminInner {
                registry,
                context,
                access_log,
                address,
                stats: ListenerStats::new(&listener_scope),
            }),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reject request bodies larger than `bytes` with 413.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn address(&self) -> SocketAddr {
        self.inner.address
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.inner.context
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    /// Run a bodyless GET through the registry, as internal callers do.
    /// Listener stats and the access log are not touched.
    pub fn dispatch(&self, path_and_query: &str) -> AdminResponse {
        self.inner
            .registry
            .dispatch(&AdminRequest::get(path_and_query))
    }

    /// Register an additional route. Returns false if the path is taken.
    pub fn add_handler<F>(
        &self,
        path: &str,
        help_text: &str,
        handler: F,
        removable: bool,
        mutates_state: bool,
    ) -> bool
    where
        F: Fn(&AdminRequest) -> AdminResult + Send + Sync + 'static,
    {
        let added = self.inner.registry.add(
            Route::new(path, help_text, handler)
                .removable(removable)
                .mutates_state(mutates_state),
        );
        if added {
            tracing::info!(path = %path, removable, mutates_state, "Admin handler added");
        } else {
            tracing::warn!(path = %path, "Admin handler already registered");
        }
        added
    }

    /// Remove a removable route. Returns false for built-ins and unknown paths.
    pub fn remove_handler(&self, path: &str) -> bool {
        let removed = self.inner.registry.remove(path);
        if removed {
            tracing::info!(path = %path, "Admin handler removed");
        }
        removed
    }

    /// Write the listen address to `path`.
    pub fn write_address_file(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, format!("{}\n", self.inner.address))?;
        tracing::info!(path = ?path, address = %self.inner.address, "Admin address written");
        Ok(())
    }

    /// Axum router that sends every request through a fresh admin filter.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(admin_stream)
            .with_state(Arc::clone(&self.inner))
            .layer(RequestBodyLimitLayer::new(self.max_body_bytes))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until the context's shutdown is triggered.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server listening");

        let shutdown = self.inner.context.shutdown().signalled();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}

impl FilterChainFactory for AdminServer {
    fn create_filter_chain(&self) -> AdminFilter {
        let dispatcher: Arc<dyn Dispatcher> = self.inner.clone();
        AdminFilter::new(dispatcher)
    }
}

/// Feed one HTTP request through an admin filter, event by event.
async fn admin_stream(State(inner): State<Arc<AdminInner>>, request: Request) -> Response {
    let (parts, mut body): (_, Body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let dispatcher: Arc<dyn Dispatcher> = inner;
    let mut filter = AdminFilter::new(dispatcher);

    let end_stream = body.is_end_stream();
    if let Some(response) = filter.decode_headers(parts.method, path_and_query, end_stream) {
        return response.into_response();
    }

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) if is_length_limit(&e) => {
                tracing::warn!(path = %parts.uri.path(), "Admin request body too large");
                return body_too_large().into_response();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Admin request body failed");
                return incomplete_request().into_response();
            }
        };
        let response = match frame.into_data() {
            Ok(data) => filter.decode_data(&data, body.is_end_stream()),
            Err(frame) if frame.is_trailers() => filter.decode_trailers(),
            Err(_) => None,
        };
        if let Some(response) = response {
            return response.into_response();
        }
    }

    filter
        .decode_data(&[], true)
        .unwrap_or_else(incomplete_request)
        .into_response()
}

fn body_too_large() -> AdminResponse {
    AdminResponse::text(StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n")
}

/// True when a body error comes from the request body limit.
fn is_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}
