//! HTML document rewriting.
//!
//! Plain string processing over the buffered document. Tag lookups use an
//! ASCII-lowercased shadow copy of the text, which keeps byte offsets
//! identical to the original. Every step leaves input it does not
//! recognise untouched.

use crate::relay::urls::RewriteRules;

/// Attribute carried by the injected boot script; its presence disables re-injection.
pub const BOOT_MARKER: &str = "data-relay-boot";

/// Sandbox tokens an authentication iframe needs to run inside the relay.
pub const AUTH_FRAME_SANDBOX: [&str; 5] = [
    "allow-scripts",
    "allow-same-origin",
    "allow-forms",
    "allow-popups",
    "allow-storage-access-by-user-activation",
];

/// Everything needed to rewrite one document.
pub struct HtmlPlan<'a> {
    pub rules: &'a RewriteRules,
    pub strip_script_markers: &'a [String],
    pub auth_frame_markers: &'a [String],
    /// Markup inserted before `</head>`.
    pub injection: Option<String>,
}

/// Run every rewriting step over a document.
pub fn rewrite_document(html: &str, plan: &HtmlPlan<'_>) -> String {
    let mut out = plan.rules.apply(html);
    out = strip_scripts(&out, plan.strip_script_markers);
    out = strip_csp_meta(&out);
    out = relax_auth_iframes(&out, plan.auth_frame_markers);
    if let Some(injection) = &plan.injection {
        out = inject_head(&out, injection);
    }
    out
}

/// Remove `<script>` elements whose tag or body mentions one of `markers`.
pub fn strip_scripts(html: &str, markers: &[String]) -> String {
    if markers.is_empty() {
        return html.to_string();
    }
    let markers: Vec<String> = markers.iter().map(|m| m.to_ascii_lowercase()).collect();
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(start) = find_tag(&lower, "script", cursor) {
        let Some(end) = element_end(&lower, "script", start) else {
            break;
        };
        out.push_str(&html[cursor..start]);
        let element = &lower[start..end];
        if !markers.iter().any(|m| element.contains(m.as_str())) {
            out.push_str(&html[start..end]);
        }
        cursor = end;
    }

    out.push_str(&html[cursor..]);
    out
}

/// Remove `<meta http-equiv="Content-Security-Policy">` tags.
pub fn strip_csp_meta(html: &str) -> String {
    rewrite_tags(html, "meta", |_, lower| {
        (lower.contains("http-equiv") && lower.contains("content-security-policy"))
            .then(String::new)
    })
}

/// Ensure auth iframes matching `markers` carry a permissive `sandbox`.
pub fn relax_auth_iframes(html: &str, markers: &[String]) -> String {
    if markers.is_empty() {
        return html.to_string();
    }
    let markers: Vec<String> = markers.iter().map(|m| m.to_ascii_lowercase()).collect();
    rewrite_tags(html, "iframe", |tag, lower| {
        if !markers.iter().any(|m| lower.contains(m.as_str())) {
            return None;
        }
        relax_sandbox(tag)
    })
}

/// Insert `snippet` before `</head>`, after `<body ...>`, or at the start.
pub fn inject_head(html: &str, snippet: &str) -> String {
    if html.contains(BOOT_MARKER) {
        return html.to_string();
    }
    let lower = html.to_ascii_lowercase();
    let at = match lower.find("</head") {
        Some(i) => i,
        None => find_tag(&lower, "body", 0)
            .and_then(|i| lower[i..].find('>').map(|end| i + end + 1))
            .unwrap_or(0),
    };

    let mut out = String::with_capacity(html.len() + snippet.len());
    out.push_str(&html[..at]);
    out.push_str(snippet);
    out.push_str(&html[at..]);
    out
}

/// Offset of the next `<name` opening tag at or after `from`.
fn find_tag(lower: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut pos = from;
    while let Some(rel) = lower[pos..].find(&needle) {
        let start = pos + rel;
        let after = start + needle.len();
        match lower.as_bytes().get(after) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            None => return None,
            _ => pos = after,
        }
    }
    None
}

/// Offset one past the closing `</name>` of the element opened at `start`.
fn element_end(lower: &str, name: &str, start: usize) -> Option<usize> {
    let open_end = start + lower[start..].find('>')? + 1;
    if lower[..open_end].ends_with("/>") {
        return Some(open_end);
    }
    let close = format!("</{}", name);
    let close_start = open_end + lower[open_end..].find(&close)?;
    let close_end = close_start + lower[close_start..].find('>')? + 1;
    Some(close_end)
}

/// Replace opening tags of `name` for which `f` returns a replacement.
///
/// `f` receives the original tag text and its lowercased copy.
fn rewrite_tags<F>(html: &str, name: &str, mut f: F) -> String
where
    F: FnMut(&str, &str) -> Option<String>,
{
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(start) = find_tag(&lower, name, cursor) {
        let Some(rel_end) = lower[start..].find('>') else {
            break;
        };
        let end = start + rel_end + 1;
        out.push_str(&html[cursor..start]);
        match f(&html[start..end], &lower[start..end]) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(&html[start..end]),
        }
        cursor = end;
    }

    out.push_str(&html[cursor..]);
    out
}

/// Rewrite the `sandbox` attribute of a tag so it holds every required token.
///
/// Tags without a sandbox are already unrestricted and are left alone.
fn relax_sandbox(tag: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let bytes = lower.as_bytes();

    let mut search = 0;
    let attr_start = loop {
        let idx = search + lower[search..].find("sandbox")?;
        let preceded = idx > 0 && bytes[idx - 1].is_ascii_whitespace();
        let followed = matches!(
            bytes.get(idx + "sandbox".len()),
            Some(b) if b.is_ascii_whitespace() || *b == b'=' || *b == b'>' || *b == b'/'
        );
        if preceded && followed {
            break idx;
        }
        search = idx + "sandbox".len();
    };

    let mut pos = attr_start + "sandbox".len();
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }

    let (value, attr_end) = if bytes.get(pos) == Some(&b'=') {
        pos += 1;
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        match bytes.get(pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let close = pos + 1 + lower[pos + 1..].find(quote as char)?;
                (&tag[pos + 1..close], close + 1)
            }
            _ => {
                let end = lower[pos..]
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .map(|e| pos + e)
                    .unwrap_or(tag.len());
                (&tag[pos..end], end)
            }
        }
    } else {
        ("", attr_start + "sandbox".len())
    };

    let mut tokens: Vec<&str> = value.split_ascii_whitespace().collect();
    for required in AUTH_FRAME_SANDBOX {
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(required)) {
            tokens.push(required);
        }
    }

    Some(format!(
        "{}sandbox=\"{}\"{}",
        &tag[..attr_start],
        tokens.join(" "),
        &tag[attr_end..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelaySettings;
    use crate::relay::session::SessionContext;

    fn markers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_marked_scripts_only() {
        let html = concat!(
            "<head>",
            r#"<SCRIPT async src="https://www.googletagmanager.com/gtm.js?id=X"></SCRIPT>"#,
            r#"<script src="/app.js"></script>"#,
            "<script>window.OneTrust={};loadFrom('cdn.cookielaw.org')</script>",
            "<scripts>not a tag</scripts>",
            "</head>",
        );
        let out = strip_scripts(html, &markers(&["googletagmanager.com", "cdn.cookielaw.org"]));
        assert_eq!(
            out,
            r#"<head><script src="/app.js"></script><scripts>not a tag</scripts></head>"#
        );
    }

    #[test]
    fn test_unterminated_script_is_kept() {
        let html = r#"<script src="https://www.googletagmanager.com/x.js">"#;
        assert_eq!(strip_scripts(html, &markers(&["googletagmanager"])), html);
    }

    #[test]
    fn test_strip_csp_meta() {
        let html = concat!(
            r#"<meta charset="utf-8">"#,
            r#"<meta http-equiv="Content-Security-Policy" content="default-src 'self'">"#,
            r#"<meta name="csp-nonce" content="x">"#,
        );
        assert_eq!(
            strip_csp_meta(html),
            r#"<meta charset="utf-8"><meta name="csp-nonce" content="x">"#
        );
    }

    #[test]
    fn test_relax_auth_iframe_sandbox() {
        let html = r#"<iframe src="/elevenlabs-identity/__/auth/iframe" sandbox="allow-scripts" hidden></iframe><iframe src="/embed" sandbox></iframe>"#;
        let out = relax_auth_iframes(html, &markers(&["/__/auth/"]));
        assert!(out.starts_with(
            r#"<iframe src="/elevenlabs-identity/__/auth/iframe" sandbox="allow-scripts allow-same-origin allow-forms allow-popups allow-storage-access-by-user-activation" hidden>"#
        ));
        assert!(out.ends_with(r#"<iframe src="/embed" sandbox></iframe>"#));
        // Already relaxed tags stay stable.
        assert_eq!(relax_auth_iframes(&out, &markers(&["/__/auth/"])), out);
    }

    #[test]
    fn test_iframe_without_sandbox_untouched() {
        let html = r#"<iframe src="https://x.test/__/auth/handler"></iframe>"#;
        assert_eq!(relax_auth_iframes(html, &markers(&["/__/auth/"])), html);
    }

    #[test]
    fn test_inject_positions() {
        assert_eq!(
            inject_head("<html><head><title>t</title></HEAD><body></body>", "<x>"),
            "<html><head><title>t</title><x></HEAD><body></body>"
        );
        assert_eq!(
            inject_head(r#"<body class="a"><p>hi</p>"#, "<x>"),
            r#"<body class="a"><x><p>hi</p>"#
        );
        assert_eq!(inject_head("<p>hi</p>", "<x>"), "<x><p>hi</p>");
    }

    #[test]
    fn test_injection_happens_once() {
        let snippet = format!("<script {}>boot()</script>", BOOT_MARKER);
        let once = inject_head("<head></head>", &snippet);
        assert_eq!(inject_head(&once, &snippet), once);
    }

    #[test]
    fn test_rewrite_document_is_idempotent() {
        let settings = RelaySettings {
            upstream: "https://upstream.test".to_string(),
            ..RelaySettings::default()
        };
        let ctx = SessionContext::derive("/elevenlabs", "/s/12345/app/home");
        let rules = RewriteRules::for_session(&settings, &ctx);
        let plan = HtmlPlan {
            rules: &rules,
            strip_script_markers: &settings.strip_script_markers,
            auth_frame_markers: &settings.auth_frame_markers,
            injection: Some(format!("<script {}></script>", BOOT_MARKER)),
        };
        let html = r#"<html><head><meta http-equiv="content-security-policy" content="x"></head><body><a href="https://upstream.test/app/voices">v</a></body></html>"#;

        let once = rewrite_document(html, &plan);
        assert_eq!(rewrite_document(&once, &plan), once);
        assert!(once.contains(r#"href="/elevenlabs/s/12345/app/voices""#));
        assert!(!once.contains("content-security-policy"));
    }
}
