//! Upstream URL → proxy path mapping.
//!
//! All mapping is literal substring substitution built from configuration
//! and the session context, so the same input always yields the same output.
//! Replacements never contain a pattern (enforced by config validation),
//! which makes [`RewriteRules::apply`] idempotent.

use crate::config::RelaySettings;
use crate::relay::session::SessionContext;

/// Characters that may directly precede an origin-relative URL in markup or CSS.
const URL_LEADERS: [char; 3] = ['"', '\'', '('];

/// Characters that may directly follow a bare host origin. Anything else
/// (`.`, `-`, a letter) means a different host that merely shares the prefix.
const ORIGIN_ENDS: [char; 7] = ['/', '"', '\'', '`', '?', '#', ')'];

/// Ordered literal substitutions for one session.
#[derive(Debug, Clone)]
pub struct RewriteRules {
    rules: Vec<(String, String)>,
}

impl RewriteRules {
    pub fn for_session(settings: &RelaySettings, ctx: &SessionContext) -> Self {
        let upstream = settings.upstream_origin();
        let alias = settings.static_alias.trim_end_matches('/');
        let mut rules = Vec::new();

        for root in &settings.static_roots {
            rules.push((format!("{}{}", upstream, root), format!("{}{}", alias, root)));
            for leader in URL_LEADERS {
                rules.push((
                    format!("{}{}", leader, root),
                    format!("{}{}{}", leader, alias, root),
                ));
            }
        }

        for route in &settings.app_routes {
            rules.push((format!("{}{}", upstream, route), ctx.app_url(route)));
            for leader in URL_LEADERS {
                rules.push((
                    format!("{}{}", leader, route),
                    format!("{}{}", leader, ctx.app_url(route)),
                ));
            }
        }

        for host in &settings.hosts {
            let origin = host.origin.trim_end_matches('/');
            let mount = host.mount.trim_end_matches('/');
            for end in ORIGIN_ENDS {
                rules.push((format!("{}{}", origin, end), format!("{}{}", mount, end)));
            }
        }

        Self { rules }
    }

    /// Apply every substitution in order.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (pattern, replacement) in &self.rules {
            if out.contains(pattern.as_str()) {
                out = out.replace(pattern.as_str(), replacement);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Map an upstream `Location` header to its public equivalent.
///
/// Upstream-absolute and root-relative targets are remapped; anything else
/// (foreign hosts, relative paths) is returned unchanged.
pub fn map_location(location: &str, settings: &RelaySettings, ctx: &SessionContext) -> String {
    let upstream = settings.upstream_origin();

    let path = match location.strip_prefix(upstream) {
        Some("") => "/",
        Some(rest) if rest.starts_with(['/', '?', '#']) => rest,
        Some(_) => return location.to_string(),
        None if location.starts_with('/') && !location.starts_with("//") => location,
        None => return location.to_string(),
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if is_static_path(&path, &settings.static_roots) {
        format!("{}{}", settings.static_alias.trim_end_matches('/'), path)
    } else if crate::routing::strip_mount(&path, &ctx.proxy_base).is_some() {
        path
    } else {
        ctx.app_url(&path)
    }
}

/// Static asset paths served through the static alias: anything under a
/// configured static root, plus any path with a `/static/` segment.
pub fn is_static_path(path: &str, static_roots: &[String]) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    static_roots.iter().any(|root| path.starts_with(root.as_str())) || path.contains("/static/")
}
