//! Header manipulation in both directions.
//!
//! # Responsibilities
//! - Build the upstream request headers from a fixed whitelist
//! - Translate session cookies for the upstream
//! - Strip encoding, length, CSP and hop-by-hop headers from responses
//! - Rewrite `Location` and every `Set-Cookie`

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::RelaySettings;
use crate::relay::cookies::{outbound_cookie_header, rewrite_set_cookie};
use crate::relay::session::SessionContext;
use crate::relay::urls::map_location;

/// Client headers always forwarded upstream.
const BASE_WHITELIST: [HeaderName; 3] = [
    header::USER_AGENT,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
];

/// Response headers never passed back to the client.
const STRIPPED_RESPONSE_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-length",
    "content-security-policy",
    "content-security-policy-report-only",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "trailer",
    "te",
];

/// Build the header map for an upstream request.
///
/// `extra` names additional client headers to forward (e.g. `authorization`
/// for sibling API hosts). `content-type` is forwarded whenever `has_body`.
pub fn upstream_request_headers(
    inbound: &HeaderMap,
    ctx: &SessionContext,
    upstream_origin: &str,
    extra: &[String],
    has_body: bool,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in BASE_WHITELIST.iter() {
        if let Some(value) = inbound.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    for name in extra {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        if name == header::COOKIE || name == header::HOST {
            continue;
        }
        if let Some(value) = inbound.get(&name) {
            headers.insert(name, value.clone());
        }
    }

    if has_body {
        if let Some(value) = inbound.get(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, value.clone());
        }
    }

    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    if let Ok(origin) = HeaderValue::from_str(upstream_origin) {
        headers.insert(header::ORIGIN, origin);
    }
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", upstream_origin)) {
        headers.insert(header::REFERER, referer);
    }

    let cookies: Vec<&str> = inbound
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if !cookies.is_empty() {
        let translated = outbound_cookie_header(&cookies.join("; "), ctx)
            .and_then(|c| HeaderValue::from_str(&c).ok());
        if let Some(value) = translated {
            headers.insert(header::COOKIE, value);
        }
    }

    headers
}

/// Adapt upstream response headers for the client.
pub fn adapt_response_headers(
    upstream: &HeaderMap,
    settings: &RelaySettings,
    ctx: &SessionContext,
    secure: bool,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());

    for (name, value) in upstream.iter() {
        let lowered = name.as_str();
        if STRIPPED_RESPONSE_HEADERS.contains(&lowered) {
            continue;
        }

        if *name == header::LOCATION {
            let rewritten = value
                .to_str()
                .ok()
                .map(|loc| map_location(loc, settings, ctx))
                .and_then(|loc| HeaderValue::from_str(&loc).ok())
                .unwrap_or_else(|| value.clone());
            headers.append(name.clone(), rewritten);
            continue;
        }

        if *name == header::SET_COOKIE {
            let rewritten = value
                .to_str()
                .ok()
                .map(|raw| rewrite_set_cookie(raw, ctx, secure))
                .and_then(|raw| HeaderValue::from_str(&raw).ok())
                .unwrap_or_else(|| value.clone());
            headers.append(name.clone(), rewritten);
            continue;
        }

        headers.append(name.clone(), value.clone());
    }

    headers
}

/// Whether the client reached the relay over HTTPS.
pub fn is_secure_request(inbound: &HeaderMap, settings: &RelaySettings) -> bool {
    if let Some(forced) = settings.forces_https() {
        return forced;
    }
    settings.trust_forwarded_proto
        && inbound
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
}

/// Whether a response carries an HTML document.
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}
