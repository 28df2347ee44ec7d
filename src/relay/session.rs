//! Per-request session context.
//!
//! Inbound paths look like `<prefix>[/s/<5 digits>]/<upstream path>[/<1-4>]`.
//! Everything the handler needs to know about that shape is derived once
//! into a [`SessionContext`] and threaded through the rewriting steps.

use std::fmt;

/// Number of digits in a session key.
pub const SESSION_KEY_LEN: usize = 5;

/// Short numeric token namespacing cookies for one browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Parse exactly five ASCII digits.
    pub fn parse(segment: &str) -> Option<Self> {
        let bytes = segment.as_bytes();
        if bytes.len() != SESSION_KEY_LEN || !bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let mut key = [0u8; SESSION_KEY_LEN];
        key.copy_from_slice(bytes);
        Some(Self(key))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII digits are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Cookie-name prefix for this session (`s<key>_`).
    pub fn cookie_prefix(&self) -> String {
        format!("s{}_", self.as_str())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing `1`-`4` segment selecting which shared account a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountIndex(u8);

impl AccountIndex {
    pub fn parse(segment: &str) -> Option<Self> {
        match segment.as_bytes() {
            [d @ b'1'..=b'4'] => Some(Self(d - b'0')),
            _ => None,
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Everything derived from the inbound path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_key: Option<SessionKey>,
    pub account_index: Option<AccountIndex>,
    /// Path requested of the upstream, always starting with `/`.
    pub upstream_path: String,
    /// Public base for this session: `<prefix>` or `<prefix>/s/<key>`.
    pub proxy_base: String,
}

impl SessionContext {
    /// Derive the context from the mount prefix and the path below it.
    ///
    /// `tail` is everything after the prefix, with or without a leading `/`.
    pub fn derive(prefix: &str, tail: &str) -> Self {
        let trailing_slash = tail.len() > 1 && tail.ends_with('/');
        let mut segments: Vec<&str> = tail.split('/').filter(|s| !s.is_empty()).collect();

        let mut session_key = None;
        if segments.len() >= 2 && segments[0] == "s" {
            if let Some(key) = SessionKey::parse(segments[1]) {
                session_key = Some(key);
                segments.drain(..2);
            }
        }

        let account_index = segments.last().and_then(|s| AccountIndex::parse(s));
        if account_index.is_some() {
            segments.pop();
        }

        let mut upstream_path = format!("/{}", segments.join("/"));
        if trailing_slash && account_index.is_none() && upstream_path.len() > 1 {
            upstream_path.push('/');
        }

        let prefix = prefix.trim_end_matches('/');
        let proxy_base = match &session_key {
            Some(key) => format!("{}/s/{}", prefix, key),
            None => prefix.to_string(),
        };

        Self {
            session_key,
            account_index,
            upstream_path,
            proxy_base,
        }
    }

    /// Context for pass-through mounts: the tail is forwarded verbatim.
    pub fn passthrough(mount: &str, tail: &str) -> Self {
        let upstream_path = if tail.starts_with('/') {
            tail.to_string()
        } else {
            format!("/{}", tail)
        };
        Self {
            session_key: None,
            account_index: None,
            upstream_path,
            proxy_base: mount.trim_end_matches('/').to_string(),
        }
    }

    /// Cookie-name prefix when a session key is active.
    pub fn cookie_prefix(&self) -> Option<String> {
        self.session_key.map(|k| k.cookie_prefix())
    }

    /// Public URL for an upstream app path.
    pub fn app_url(&self, upstream_path: &str) -> String {
        format!("{}{}", self.proxy_base, upstream_path)
    }

    /// Session key as a string for logs and the client script.
    pub fn session_label(&self) -> &str {
        self.session_key.as_ref().map(SessionKey::as_str).unwrap_or("-")
    }
}
