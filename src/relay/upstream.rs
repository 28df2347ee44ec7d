//! Upstream HTTP client.
//!
//! One shared `reqwest::Client` with redirects disabled so `Location`
//! headers reach the rewriter instead of being followed cross-origin.
//! Exactly one call per inbound request; no retries.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use reqwest::redirect;

use crate::config::{RelaySettings, TimeoutConfig};
use crate::http::response::RelayError;

#[derive(Clone)]
pub struct UpstreamClient {
    inner: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig, settings: &RelaySettings) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs));
        if !settings.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            inner: builder.build()?,
        })
    }

    /// The underlying client, shared with the credential resolver.
    pub fn raw(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Send one request upstream.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, RelayError> {
        let mut request = self.inner.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().await.map_err(RelayError::from_upstream)
    }
}

/// Join an origin, a path and an optional query string.
pub fn upstream_url(origin: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}{}", origin.trim_end_matches('/'), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}
