//! Per-request admin state machine.
//!
//! # States
//! ```text
//! AwaitingHeaders → Buffering → Complete → Dispatched
//! ```
//!
//! Headers, body chunks and trailers arrive from the HTTP substrate one at a
//! time. The request is buffered until end-of-stream (or trailers), then
//! dispatched exactly once. Events after dispatch are ignored. A filter
//! dropped before completion never runs a handler.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bytes::BytesMut;

use crate::admin::error::AdminError;
use crate::admin::registry::{render_help, HandlerRegistry};
use crate::admin::request::{AdminRequest, AdminResponse};

/// Resolves and runs a completed request.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &AdminRequest) -> AdminResponse;
}

impl Dispatcher for HandlerRegistry {
    fn dispatch(&self, request: &AdminRequest) -> AdminResponse {
        let path = request.path();

        let Some(route) = self.lookup(path) else {
            tracing::debug!(path = %path, "No admin route matched");
            let mut response = AdminResponse::from(AdminError::RouteNotFound {
                path: path.to_string(),
            });
            response.body.push_str(&render_help(&self.list_sorted()));
            return response;
        };

        if route.is_mutating() && request.method != Method::POST {
            tracing::warn!(
                path = %path,
                method = %request.method,
                "Admin path mutates state, refusing non-POST request"
            );
            return AdminError::MethodNotAllowedForMutation {
                path: path.to_string(),
                method: request.method.clone(),
            }
            .into();
        }

        let mut response = match route.invoke(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(path = %path, status = %e.status(), error = %e, "Admin handler failed");
                e.into()
            }
        };
        response.ensure_content_type();
        response
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    AwaitingHeaders,
    Buffering,
    Complete,
    Dispatched,
}

/// Terminal filter for one admin request.
pub struct AdminFilter {
    dispatcher: Arc<dyn Dispatcher>,
    state: RequestState,
    method: Method,
    path_and_query: String,
    body: BytesMut,
}

impl AdminFilter {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            state: RequestState::AwaitingHeaders,
            method: Method::GET,
            path_and_query: String::new(),
            body: BytesMut::new(),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Record the request line. Returns the response when `end_stream` completes the request.
    pub fn decode_headers(
        &mut self,
        method: Method,
        path_and_query: impl Into<String>,
        end_stream: bool,
    ) -> Option<AdminResponse> {
        if self.state != RequestState::AwaitingHeaders {
            tracing::debug!(state = ?self.state, "Ignoring repeated admin headers");
            return None;
        }
        self.method = method;
        self.path_and_query = path_and_query.into();
        self.state = RequestState::Buffering;

        if end_stream {
            self.on_complete()
        } else {
            None
        }
    }

    pub fn decode_data(&mut self, data: &[u8], end_stream: bool) -> Option<AdminResponse> {
        if self.state != RequestState::Buffering {
            tracing::trace!(state = ?self.state, bytes = data.len(), "Ignoring admin body data");
            return None;
        }
        self.body.extend_from_slice(data);

        if end_stream {
            self.on_complete()
        } else {
            None
        }
    }

    /// Trailers always end the stream.
    pub fn decode_trailers(&mut self) -> Option<AdminResponse> {
        if self.state != RequestState::Buffering {
            return None;
        }
        self.on_complete()
    }

    fn on_complete(&mut self) -> Option<AdminResponse> {
        self.state = RequestState::Complete;

        let request = AdminRequest::new(
            self.method.clone(),
            std::mem::take(&mut self.path_and_query),
            std::mem::take(&mut self.body).freeze(),
        );
        tracing::debug!(
            method = %request.method,
            path = %request.path_and_query,
            body_bytes = request.body.len(),
            "Dispatching admin request"
        );
        let response = self.dispatcher.dispatch(&request);

        self.state = RequestState::Dispatched;
        Some(response)
    }
}

impl Drop for AdminFilter {
    fn drop(&mut self) {
        if self.state != RequestState::Dispatched {
            tracing::debug!(
                state = ?self.state,
                path = %self.path_and_query,
                "Admin request torn down before dispatch"
            );
        }
    }
}

/// Response for a stream that ended without ever completing.
pub(crate) fn incomplete_request() -> AdminResponse {
    AdminResponse::text(
        StatusCode::BAD_REQUEST,
        "request ended before it could be dispatched\n",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::registry::Route;
    use crate::admin::request::TEXT_PLAIN;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Fixture {
        registry: Arc<HandlerRegistry>,
        calls: Arc<AtomicUsize>,
        seen_body: Arc<Mutex<Vec<u8>>>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(HandlerRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_body = Arc::new(Mutex::new(Vec::new()));

        let (c, b) = (calls.clone(), seen_body.clone());
        registry.add(Route::new("/echo", "echo the body", move |req: &AdminRequest| {
            c.fetch_add(1, Ordering::SeqCst);
            *b.lock().unwrap() = req.body.to_vec();
            Ok(AdminResponse::new(StatusCode::OK, String::from_utf8_lossy(&req.body)))
        }));

        let c = calls.clone();
        registry.add(
            Route::new("/mutate", "change things", move |_req: &AdminRequest| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(AdminResponse::ok("OK\n"))
            })
            .mutates_state(true),
        );

        Fixture { registry, calls, seen_body }
    }

    fn filter(fixture: &Fixture) -> AdminFilter {
        AdminFilter::new(fixture.registry.clone())
    }

    #[test]
    fn headers_only_request_dispatches_immediately() {
        let fx = fixture();
        let mut filter = filter(&fx);
        let response = filter.decode_headers(Method::GET, "/echo", true).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(filter.state(), RequestState::Dispatched);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chunked_body_with_trailers_dispatches_once() {
        let fx = fixture();
        let mut filter = filter(&fx);
        assert!(filter.decode_headers(Method::GET, "/echo?x=1", false).is_none());
        assert_eq!(filter.state(), RequestState::Buffering);
        assert!(filter.decode_data(b"hello ", false).is_none());
        assert!(filter.decode_data(b"admin ", false).is_none());
        assert!(filter.decode_data(b"world", false).is_none());
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);

        let response = filter.decode_trailers().unwrap();
        assert_eq!(response.body, "hello admin world");
        assert_eq!(*fx.seen_body.lock().unwrap(), b"hello admin world".to_vec());

        // Anything after dispatch is a no-op.
        assert!(filter.decode_data(b"late", true).is_none());
        assert!(filter.decode_trailers().is_none());
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn end_stream_on_data_completes() {
        let fx = fixture();
        let mut filter = filter(&fx);
        filter.decode_headers(Method::POST, "/echo", false);
        let response = filter.decode_data(b"payload", true).unwrap();
        assert_eq!(response.body, "payload");
        assert_eq!(filter.state(), RequestState::Dispatched);
    }

    #[test]
    fn default_content_type_is_text_plain() {
        let fx = fixture();
        let mut filter = filter(&fx);
        let response = filter.decode_headers(Method::GET, "/echo", true).unwrap();
        assert_eq!(response.content_type(), Some(TEXT_PLAIN));
    }

    #[test]
    fn unknown_path_is_404_with_help() {
        let fx = fixture();
        let mut filter = filter(&fx);
        let response = filter.decode_headers(Method::GET, "/nope?a=b", true).unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.body.starts_with("invalid path: /nope\n"));
        assert!(response.body.contains("  /echo: echo the body\n"));
        assert!(response.body.contains("  /mutate: change things\n"));
    }

    #[test]
    fn mutating_route_requires_post() {
        let fx = fixture();
        for method in [Method::GET, Method::HEAD, Method::PUT] {
            let mut filter = filter(&fx);
            let response = filter.decode_headers(method, "/mutate", true).unwrap();
            assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        }
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);

        let mut filter = filter(&fx);
        let response = filter.decode_headers(Method::POST, "/mutate", true).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_before_complete_runs_nothing() {
        let fx = fixture();
        {
            let mut filter = filter(&fx);
            filter.decode_headers(Method::POST, "/mutate", false);
            filter.decode_data(b"partial", false);
        }
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn data_before_headers_is_ignored() {
        let fx = fixture();
        let mut filter = filter(&fx);
        assert!(filter.decode_data(b"stray", true).is_none());
        assert_eq!(filter.state(), RequestState::AwaitingHeaders);
        let response = filter.decode_headers(Method::GET, "/echo", true).unwrap();
        assert_eq!(response.body, "");
    }

    #[test]
    fn handler_errors_become_responses() {
        let registry = Arc::new(HandlerRegistry::new());
        registry.add(Route::new("/bad", "always fails", |_req: &AdminRequest| {
            Err(AdminError::invalid_query("usage: /bad?x=y"))
        }));
        let mut filter = AdminFilter::new(registry);
        let response = filter.decode_headers(Method::GET, "/bad", true).unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, "usage: /bad?x=y\n");
    }
}
