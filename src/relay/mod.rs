//! Relay subsystem: forward to the upstream and adapt the response.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → session.rs (session key, account index, upstream path, proxy base)
//!     → headers.rs (whitelist, cookie translation)
//!     → upstream.rs (one call, redirects not followed)
//!     → headers.rs (strip CSP/encoding, rewrite Location and Set-Cookie)
//!     → HTML only: html.rs (URL rewrite, strip, sandbox) + inject.rs
//!     → Client response
//! ```
//!
//! # Design Decisions
//! - Stateless per request; the only shared state is the config snapshot
//! - HTML is buffered in full, everything else is streamed through
//! - Best-effort steps degrade to pass-through instead of failing

pub mod cookies;
pub mod credentials;
pub mod headers;
pub mod html;
pub mod inject;
pub mod session;
pub mod upstream;
pub mod urls;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method},
    response::Response,
};

use crate::config::RelayConfig;
use crate::http::response::{build_response, html_response, RelayError};
use crate::observability::metrics;

pub use credentials::{CredentialResolver, Credentials};
pub use session::SessionContext;
pub use upstream::UpstreamClient;

use headers::{adapt_response_headers, is_html, is_secure_request, upstream_request_headers};
use html::{rewrite_document, HtmlPlan};
use inject::{render_bundle, BootConfig, LoginConfig};
use upstream::upstream_url;
use urls::RewriteRules;

/// The parts of an inbound request the relay forwards.
#[derive(Debug)]
pub struct Inbound {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Option<Bytes>,
}

/// Relay a request under the main prefix, rewriting HTML documents.
pub async fn relay_app(
    config: &RelayConfig,
    upstream: &UpstreamClient,
    credentials: &CredentialResolver,
    ctx: &SessionContext,
    inbound: Inbound,
) -> Result<Response, RelayError> {
    let settings = &config.relay;
    let origin = settings.upstream_origin();
    let url = upstream_url(origin, &ctx.upstream_path, inbound.query.as_deref());
    let secure = is_secure_request(&inbound.headers, settings);
    let headers =
        upstream_request_headers(&inbound.headers, ctx, origin, &[], inbound.body.is_some());

    tracing::debug!(
        upstream_url = %url,
        session = ctx.session_label(),
        secure,
        "Forwarding to upstream"
    );

    let is_get = inbound.method == Method::GET;
    let response = upstream.send(inbound.method, &url, headers, inbound.body).await?;
    let status = response.status();
    let html = is_get && is_html(response.headers());
    let adapted = adapt_response_headers(response.headers(), settings, ctx, secure);

    if !html {
        return build_response(status, adapted, Body::from_stream(response.bytes_stream()));
    }

    let bytes = response.bytes().await.map_err(RelayError::from_upstream)?;
    let text = String::from_utf8_lossy(&bytes);
    let injection = render_injection(config, credentials, ctx).await;
    let rules = RewriteRules::for_session(settings, ctx);
    let plan = HtmlPlan {
        rules: &rules,
        strip_script_markers: &settings.strip_script_markers,
        auth_frame_markers: &settings.auth_frame_markers,
        injection,
    };
    let document = rewrite_document(&text, &plan);
    metrics::record_html_rewrite(bytes.len(), document.len());

    html_response(status, adapted, document)
}

/// Relay a request to `origin` verbatim (static alias and sibling hosts).
pub async fn relay_passthrough(
    config: &RelayConfig,
    upstream: &UpstreamClient,
    origin: &str,
    extra_headers: &[String],
    ctx: &SessionContext,
    inbound: Inbound,
) -> Result<Response, RelayError> {
    let settings = &config.relay;
    let url = upstream_url(origin, &ctx.upstream_path, inbound.query.as_deref());
    let secure = is_secure_request(&inbound.headers, settings);
    let headers = upstream_request_headers(
        &inbound.headers,
        ctx,
        settings.upstream_origin(),
        extra_headers,
        inbound.body.is_some(),
    );

    tracing::debug!(upstream_url = %url, "Passing through");

    let response = upstream.send(inbound.method, &url, headers, inbound.body).await?;
    let status = response.status();
    let adapted = adapt_response_headers(response.headers(), settings, ctx, secure);
    build_response(status, adapted, Body::from_stream(response.bytes_stream()))
}

/// Script bundle for a document. Failures only cost the injection.
async fn render_injection(
    config: &RelayConfig,
    credentials: &CredentialResolver,
    ctx: &SessionContext,
) -> Option<String> {
    let boot = BootConfig::new(&config.relay, ctx);

    let login = if config.relay.is_sign_in_path(&ctx.upstream_path) {
        let resolved = credentials.resolve(&config.login, ctx.account_index).await;
        if resolved.is_none() {
            tracing::debug!("No credentials configured, skipping auto-login");
        }
        resolved.map(|c| LoginConfig::new(c, &config.login))
    } else {
        None
    };

    match render_bundle(&boot, login.as_ref()) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to render script bundle");
            None
        }
    }
}
