//! Admin dispatch error taxonomy.
//!
//! Every variant maps onto one HTTP status. Errors never leave dispatch:
//! they are turned into a plain-text response with a short explanation.

use axum::http::{header, HeaderValue, Method, StatusCode};
use thiserror::Error;

use crate::admin::request::AdminResponse;
use crate::context::ProfilerError;

/// Result type returned by admin handlers.
pub type AdminResult = Result<AdminResponse, AdminError>;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid path: {path}")]
    RouteNotFound { path: String },

    #[error("admin path \"{path}\" mutates state, method={method} rather than POST")]
    MethodNotAllowedForMutation { path: String, method: Method },

    #[error("{0}")]
    InvalidQueryParameter(String),

    #[error("internal formatter error: {0}")]
    FormatterInternalError(String),

    #[error("{0}")]
    Internal(String),
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            AdminError::MethodNotAllowedForMutation { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AdminError::InvalidQueryParameter(_) => StatusCode::BAD_REQUEST,
            AdminError::FormatterInternalError(_) | AdminError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        AdminError::InvalidQueryParameter(message.into())
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(e: serde_json::Error) -> Self {
        AdminError::FormatterInternalError(e.to_string())
    }
}

impl From<ProfilerError> for AdminError {
    fn from(e: ProfilerError) -> Self {
        AdminError::Internal(e.to_string())
    }
}

impl From<AdminError> for AdminResponse {
    fn from(err: AdminError) -> Self {
        let mut response = AdminResponse::text(err.status(), format!("{}\n", err));
        if matches!(err, AdminError::MethodNotAllowedForMutation { .. }) {
            response
                .headers
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AdminError::RouteNotFound { path: "/x".into() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AdminError::invalid_query("bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AdminError::FormatterInternalError("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let err = AdminError::MethodNotAllowedForMutation {
            path: "/quitquitquit".into(),
            method: Method::GET,
        };
        let response = AdminResponse::from(err);
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers.get(header::ALLOW).unwrap(), "POST");
        assert!(response.body.contains("rather than POST"));
    }
}
