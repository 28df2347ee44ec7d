//! Cookie translation between the browser and the upstream.
//!
//! The browser sees `s<key>_<name>` scoped to the session's proxy base; the
//! upstream sees `<name>`. Rewriting is best effort: anything that does not
//! parse is passed through unchanged.

use crate::relay::session::SessionContext;

/// Thirty days, applied to cookies the upstream sent without an expiry.
pub const DEFAULT_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// Rewrite the browser's `Cookie` header for the upstream.
///
/// With a session key only that session's cookies survive, unprefixed.
/// Without one every cookie is forwarded as-is. Returns `None` when no
/// cookie survives.
pub fn outbound_cookie_header(raw: &str, ctx: &SessionContext) -> Option<String> {
    let prefix = ctx.cookie_prefix();
    let pairs: Vec<String> = raw
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = name.trim();
            let upstream_name = match &prefix {
                Some(prefix) => name.strip_prefix(prefix.as_str())?,
                None => name,
            };
            if upstream_name.is_empty() {
                return None;
            }
            Some(format!("{}={}", upstream_name, value.trim()))
        })
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Recover the upstream cookie name from a browser-side name.
pub fn strip_session_prefix<'a>(name: &'a str, ctx: &SessionContext) -> Option<&'a str> {
    match ctx.cookie_prefix() {
        Some(prefix) => name.strip_prefix(prefix.as_str()),
        None => Some(name),
    }
}

/// Browser-side name for an upstream cookie.
pub fn session_cookie_name(name: &str, ctx: &SessionContext) -> String {
    match ctx.cookie_prefix() {
        Some(prefix) => format!("{}{}", prefix, name),
        None => name.to_string(),
    }
}

/// Rewrite a single upstream `Set-Cookie` value for the browser.
///
/// - `Domain` is dropped and `Path` is pinned to the proxy base
/// - `secure` contexts get `SameSite=None; Secure`; plain HTTP gets `SameSite=Lax`
///   without `Secure` or `Partitioned`
/// - a missing expiry becomes `Max-Age=2592000`
/// - the name gains the session prefix
pub fn rewrite_set_cookie(raw: &str, ctx: &SessionContext, secure: bool) -> String {
    let mut parts = raw.split(';');
    let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
        return raw.to_string();
    };
    let name = name.trim();
    if name.is_empty() {
        return raw.to_string();
    }

    let host_prefixed = name.starts_with("__Host-");
    let mut has_expiry = false;
    let mut attributes = Vec::new();

    for attr in parts.map(str::trim).filter(|a| !a.is_empty()) {
        let key = attr.split('=').next().unwrap_or_default().trim();
        match key.to_ascii_lowercase().as_str() {
            "domain" | "path" | "samesite" | "secure" => {}
            "partitioned" if !secure => {}
            "max-age" | "expires" => {
                has_expiry = true;
                attributes.push(attr.to_string());
            }
            _ => attributes.push(attr.to_string()),
        }
    }

    // `__Host-` cookies are only accepted at the root path.
    let path = if host_prefixed && ctx.session_key.is_none() {
        "/".to_string()
    } else {
        ctx.proxy_base.clone()
    };
    attributes.push(format!("Path={}", path));

    if secure {
        attributes.push("SameSite=None".to_string());
        attributes.push("Secure".to_string());
    } else {
        attributes.push("SameSite=Lax".to_string());
    }

    if !has_expiry {
        attributes.push(format!("Max-Age={}", DEFAULT_MAX_AGE_SECS));
    }

    let mut out = format!("{}={}", session_cookie_name(name, ctx), value.trim());
    for attr in attributes {
        out.push_str("; ");
        out.push_str(&attr);
    }
    out
}

/// Cookie name of a `Set-Cookie` value, if it has one.
pub fn set_cookie_name(raw: &str) -> Option<&str> {
    raw.split(';')
        .next()
        .and_then(|p| p.split_once('='))
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty())
}
