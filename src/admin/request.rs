//! Admin request and response values.
//!
//! # Responsibilities
//! - Carry the method, path+query and buffered body of a completed request
//! - Split the path component from the query string
//! - Parse query parameters
//! - Build responses with the right `Content-Type`
//!
//! # Design Decisions
//! - Bodies are always UTF-8 text, so the response body is a `String`
//! - Query parameters are URL-decoded; the first occurrence of a key wins

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

pub const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=UTF-8";

/// A fully buffered admin request, handed to exactly one handler.
#[derive(Debug, Clone)]
pub struct AdminRequest {
    pub method: Method,
    pub path_and_query: String,
    pub body: Bytes,
}

impl AdminRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>, body: Bytes) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            body,
        }
    }

    /// A bodyless GET, as issued by internal callers.
    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self::new(Method::GET, path_and_query, Bytes::new())
    }

    /// The path component, without the query string.
    pub fn path(&self) -> &str {
        split_path(&self.path_and_query).0
    }

    pub fn query(&self) -> Option<&str> {
        split_path(&self.path_and_query).1
    }

    pub fn query_params(&self) -> QueryParams {
        QueryParams::parse(self.query().unwrap_or(""))
    }
}

/// Split `path?query` into its path and optional query parts.
pub fn split_path(path_and_query: &str) -> (&str, Option<&str>) {
    match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    }
}

/// Decoded query parameters, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The single parameter of a one-parameter query.
    pub fn single(&self) -> Option<(&str, &str)> {
        if self.0.len() != 1 {
            return None;
        }
        self.0.iter().next().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Status, headers and body produced by a handler.
#[derive(Debug, Clone)]
pub struct AdminResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl AdminResponse {
    /// A response with no `Content-Type`; dispatch fills in text/plain.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status, body).with_content_type(TEXT_PLAIN)
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::text(StatusCode::OK, body)
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body).with_content_type(APPLICATION_JSON)
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Default to text/plain when the handler left the type unset.
    pub fn ensure_content_type(&mut self) {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        }
    }
}

impl IntoResponse for AdminResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}
