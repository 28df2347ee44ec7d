//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map relay failures to HTTP status codes
//! - Assemble client responses from adapted upstream parts
//!
//! # Design Decisions
//! - Upstream failures are not retried; they surface as 502/504
//! - Error bodies are short plain text, never upstream internals

use axum::{
    body::Body,
    extract::rejection::BytesRejection,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::observability::metrics;

/// Errors that abort a relayed request.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),

    #[error("invalid upstream url: {0}")]
    InvalidUpstreamUrl(String),

    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl RelayError {
    /// Classify a client error, separating timeouts from other failures.
    pub fn from_upstream(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::UpstreamTimeout
        } else if e.is_builder() {
            RelayError::InvalidUpstreamUrl(e.to_string())
        } else {
            RelayError::Upstream(e)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RelayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            // 413 once the body limit trips, 400 for other read failures.
            RelayError::Body(rejection) => rejection.status(),
            RelayError::InvalidUpstreamUrl(_) | RelayError::Response(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, status = status.as_u16(), "Mapping relay error");
        if matches!(self, RelayError::Upstream(_) | RelayError::UpstreamTimeout) {
            metrics::record_upstream_error();
        }
        let message = match status {
            StatusCode::BAD_GATEWAY => "Upstream request failed",
            StatusCode::GATEWAY_TIMEOUT => "Upstream request timed out",
            StatusCode::BAD_REQUEST => "Invalid request body",
            StatusCode::PAYLOAD_TOO_LARGE => "Request body too large",
            _ => "Relay error",
        };
        (status, message).into_response()
    }
}

/// Assemble a response from a status, adapted headers and a body.
pub fn build_response(
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    let mut response = Response::builder().status(status).body(body)?;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Assemble a rewritten HTML response.
pub fn html_response(
    status: StatusCode,
    mut headers: HeaderMap,
    html: String,
) -> Result<Response, RelayError> {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    build_response(status, headers, Body::from(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RelayError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            RelayError::InvalidUpstreamUrl("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_html_response_sets_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let response = html_response(StatusCode::OK, headers, "<p>hi</p>".to_string()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[test]
    fn test_error_into_response() {
        let response = RelayError::UpstreamTimeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
