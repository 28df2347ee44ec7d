//! Mount matching.
//!
//! # Design Decisions
//! - A mount matches itself and anything below `<mount>/`, never a sibling
//!   sharing the same leading characters (`/relay` does not match `/relay-api`)
//! - Path matching is case-sensitive

use crate::config::{HostMount, RelaySettings};

/// What an inbound path is relayed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target<'a> {
    /// The main relay: session-aware, HTML rewriting.
    App { tail: &'a str },
    /// Upstream static assets, passed through.
    Static { tail: &'a str },
    /// A sibling host, passed through.
    Host { host: &'a HostMount, tail: &'a str },
}

impl<'a> Target<'a> {
    /// Resolve a request path against the configured mounts.
    pub fn resolve(settings: &'a RelaySettings, path: &'a str) -> Option<Self> {
        let mut best: Option<(usize, Target<'a>)> = None;
        let mut consider = |mount: &str, target: Target<'a>| {
            if best.as_ref().map_or(true, |(len, _)| mount.len() > *len) {
                best = Some((mount.len(), target));
            }
        };

        if let Some(tail) = strip_mount(path, &settings.prefix) {
            consider(&settings.prefix, Target::App { tail });
        }
        if let Some(tail) = strip_mount(path, &settings.static_alias) {
            consider(&settings.static_alias, Target::Static { tail });
        }
        for host in &settings.hosts {
            if let Some(tail) = strip_mount(path, &host.mount) {
                consider(&host.mount, Target::Host { host, tail });
            }
        }

        best.map(|(_, target)| target)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::App { .. } => "app",
            Target::Static { .. } => "static",
            Target::Host { .. } => "host",
        }
    }
}

/// Remainder of `path` below `mount`, or `None` if it is not under it.
pub fn strip_mount<'p>(path: &'p str, mount: &str) -> Option<&'p str> {
    let mount = mount.trim_end_matches('/');
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_mount() {
        assert_eq!(strip_mount("/elevenlabs/app", "/elevenlabs"), Some("/app"));
        assert_eq!(strip_mount("/elevenlabs", "/elevenlabs"), Some(""));
        assert_eq!(strip_mount("/elevenlabs-api/v1", "/elevenlabs"), None);
        assert_eq!(strip_mount("/other", "/elevenlabs"), None);
    }

    #[test]
    fn test_resolve_targets() {
        let settings = RelaySettings::default();

        assert_eq!(
            Target::resolve(&settings, "/elevenlabs/s/12345/app/home"),
            Some(Target::App { tail: "/s/12345/app/home" })
        );
        assert_eq!(
            Target::resolve(&settings, "/elevenlabs-static/_next/a.js"),
            Some(Target::Static { tail: "/_next/a.js" })
        );
        match Target::resolve(&settings, "/elevenlabs-api/v1/user") {
            Some(Target::Host { host, tail }) => {
                assert_eq!(host.origin, "https://api.elevenlabs.io");
                assert_eq!(tail, "/v1/user");
            }
            other => panic!("unexpected target {:?}", other),
        }
        assert_eq!(Target::resolve(&settings, "/favicon.ico"), None);
    }

    #[test]
    fn test_longest_mount_wins() {
        let mut settings = RelaySettings::default();
        settings.hosts.push(HostMount {
            origin: "https://nested.test".to_string(),
            mount: "/elevenlabs/nested".to_string(),
            forward_headers: Vec::new(),
        });

        let target = Target::resolve(&settings, "/elevenlabs/nested/x").unwrap();
        assert_eq!(target.kind(), "host");
    }
}
