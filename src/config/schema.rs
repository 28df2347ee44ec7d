//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Upstream origin, mount paths and rewrite tables.
    pub relay: RelaySettings,

    /// Auto-login credentials and browser-side timings.
    pub login: LoginSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes (POST forwarding).
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Where the relay is mounted and what it mirrors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Public path prefix the relay handler is mounted under.
    pub prefix: String,

    /// Public path that serves upstream static assets.
    pub static_alias: String,

    /// Upstream origin, scheme and host only (e.g. "https://elevenlabs.io").
    pub upstream: String,

    /// Upstream path roots that belong to the application (trailing slash).
    pub app_routes: Vec<String>,

    /// Upstream path roots that hold static assets (trailing slash).
    pub static_roots: Vec<String>,

    /// Third-party hosts the browser talks to, each relayed under its own mount.
    pub hosts: Vec<HostMount>,

    /// Substrings identifying monitoring/consent `<script>` elements to strip.
    pub strip_script_markers: Vec<String>,

    /// Substrings identifying authentication iframes whose sandbox is relaxed.
    pub auth_frame_markers: Vec<String>,

    /// Upstream paths that receive the auto-login script.
    pub sign_in_paths: Vec<String>,

    /// Forced public scheme ("http" or "https"). Unset means detect per request.
    pub public_scheme: Option<String>,

    /// Trust `X-Forwarded-Proto` from the fronting load balancer.
    pub trust_forwarded_proto: bool,

    /// Route upstream traffic through the system HTTP proxy.
    pub use_system_proxy: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            prefix: "/elevenlabs".to_string(),
            static_alias: "/elevenlabs-static".to_string(),
            upstream: "https://elevenlabs.io".to_string(),
            app_routes: vec!["/app/".to_string()],
            static_roots: vec!["/_next/".to_string(), "/static/".to_string()],
            hosts: default_hosts(),
            strip_script_markers: vec![
                "googletagmanager.com".to_string(),
                "google-analytics.com".to_string(),
                "cdn.cookielaw.org".to_string(),
                "cookie-script.com".to_string(),
                "sentry-cdn.com".to_string(),
            ],
            auth_frame_markers: vec!["/__/auth/".to_string()],
            sign_in_paths: vec!["/app/sign-in".to_string(), "/sign-in".to_string()],
            public_scheme: None,
            trust_forwarded_proto: true,
            use_system_proxy: false,
        }
    }
}

/// A sibling host relayed verbatim under a mount path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HostMount {
    /// Host origin as it appears in upstream pages (e.g. "https://api.example.com").
    pub origin: String,

    /// Public path that relays to this origin.
    pub mount: String,

    /// Client headers forwarded in addition to the base whitelist.
    #[serde(default = "default_mount_headers")]
    pub forward_headers: Vec<String>,
}

/// Payload API, Firebase identity and hCaptcha hosts the upstream app calls.
fn default_hosts() -> Vec<HostMount> {
    let firebase_headers: Vec<String> = default_mount_headers()
        .into_iter()
        .chain(["x-client-version".to_string(), "x-firebase-gmpid".to_string()])
        .collect();
    let host = |origin: &str, mount: &str, forward_headers: &[String]| HostMount {
        origin: origin.to_string(),
        mount: mount.to_string(),
        forward_headers: forward_headers.to_vec(),
    };

    vec![
        host("https://api.elevenlabs.io", "/elevenlabs-api", &default_mount_headers()),
        host(
            "https://identitytoolkit.googleapis.com",
            "/elevenlabs-identity",
            &firebase_headers,
        ),
        host(
            "https://securetoken.googleapis.com",
            "/elevenlabs-securetoken",
            &firebase_headers,
        ),
        host("https://js.hcaptcha.com", "/elevenlabs-captcha-js", &default_mount_headers()),
        host("https://api.hcaptcha.com", "/elevenlabs-captcha", &default_mount_headers()),
    ]
}

fn default_mount_headers() -> Vec<String> {
    vec![
        "authorization".to_string(),
        "content-type".to_string(),
        "x-requested-with".to_string(),
    ]
}

/// Auto-login settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginSettings {
    /// Fixed login email. Empty disables auto-login unless a source resolves.
    pub email: String,

    /// Fixed login password.
    pub password: String,

    /// Optional CSV source of `email,password` rows, selected by account index.
    pub source_url: Option<String>,

    /// Timeout for the credential source lookup in milliseconds.
    pub source_timeout_ms: u64,

    /// Polling attempts before the browser script gives up.
    pub max_attempts: u32,

    /// Delay between polling attempts in milliseconds.
    pub interval_ms: u64,

    /// Time without any login field before a one-time storage flush and reload.
    pub reload_after_ms: u64,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            source_url: None,
            source_timeout_ms: 3000,
            max_attempts: 40,
            interval_ms: 500,
            reload_after_ms: 12_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl RelaySettings {
    /// Upstream origin without a trailing slash.
    pub fn upstream_origin(&self) -> &str {
        self.upstream.trim_end_matches('/')
    }

    /// Whether the given upstream path is a sign-in page.
    pub fn is_sign_in_path(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        self.sign_in_paths
            .iter()
            .any(|p| p.trim_end_matches('/') == path)
    }

    /// Whether an explicit `https` public scheme is configured.
    pub fn forces_https(&self) -> Option<bool> {
        self.public_scheme
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("https"))
    }
}
