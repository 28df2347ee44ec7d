//! Client script bundle injected into relayed HTML.
//!
//! The browser-side logic lives in two static scripts compiled into the
//! binary. Each is preceded by a small data script assigning a typed,
//! JSON-serialised configuration object to a well-known global.

use serde::Serialize;

use crate::config::{LoginSettings, RelaySettings};
use crate::relay::credentials::Credentials;
use crate::relay::html::{AUTH_FRAME_SANDBOX, BOOT_MARKER};
use crate::relay::session::SessionContext;

const BOOT_SCRIPT: &str = include_str!("assets/boot.js");
const LOGIN_SCRIPT: &str = include_str!("assets/autologin.js");

/// Configuration consumed by the boot script as `window.__RELAY_BOOT__`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootConfig {
    pub base: String,
    pub static_alias: String,
    pub upstream_origin: String,
    pub session_key: Option<String>,
    pub app_routes: Vec<String>,
    pub static_roots: Vec<String>,
    pub hosts: Vec<HostRoute>,
    pub auth_frame_markers: Vec<String>,
    pub sandbox_tokens: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostRoute {
    pub origin: String,
    pub mount: String,
}

impl BootConfig {
    pub fn new(settings: &RelaySettings, ctx: &SessionContext) -> Self {
        Self {
            base: ctx.proxy_base.clone(),
            static_alias: settings.static_alias.trim_end_matches('/').to_string(),
            upstream_origin: settings.upstream_origin().to_string(),
            session_key: ctx.session_key.map(|k| k.to_string()),
            app_routes: settings.app_routes.clone(),
            static_roots: settings.static_roots.clone(),
            hosts: settings
                .hosts
                .iter()
                .map(|h| HostRoute {
                    origin: h.origin.trim_end_matches('/').to_string(),
                    mount: h.mount.trim_end_matches('/').to_string(),
                })
                .collect(),
            auth_frame_markers: settings.auth_frame_markers.clone(),
            sandbox_tokens: AUTH_FRAME_SANDBOX.to_vec(),
        }
    }
}

/// Configuration consumed by the auto-login script as `window.__RELAY_LOGIN__`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginConfig {
    pub email: String,
    pub password: String,
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub reload_after_ms: u64,
}

impl LoginConfig {
    pub fn new(credentials: Credentials, settings: &LoginSettings) -> Self {
        Self {
            email: credentials.email,
            password: credentials.password,
            max_attempts: settings.max_attempts,
            interval_ms: settings.interval_ms,
            reload_after_ms: settings.reload_after_ms,
        }
    }
}

impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("max_attempts", &self.max_attempts)
            .field("interval_ms", &self.interval_ms)
            .field("reload_after_ms", &self.reload_after_ms)
            .finish()
    }
}

/// Serialize a value as JSON that is safe inside an inline `<script>`.
///
/// `/` is escaped as well so that no URL in the payload can match an HTML
/// rewrite pattern if the document is rewritten again.
pub fn script_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let raw = serde_json::to_string(value)?;
    let mut out = String::with_capacity(raw.len() + 16);
    for c in raw.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '/' => out.push_str("\\/"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Render the markup inserted before `</head>`.
pub fn render_bundle(
    boot: &BootConfig,
    login: Option<&LoginConfig>,
) -> Result<String, serde_json::Error> {
    let mut out = format!(
        "<script {}>window.__RELAY_BOOT__={};</script><script>{}</script>",
        BOOT_MARKER,
        script_json(boot)?,
        BOOT_SCRIPT
    );
    if let Some(login) = login {
        out.push_str(&format!(
            "<script>window.__RELAY_LOGIN__={};</script><script>{}</script>",
            script_json(login)?,
            LOGIN_SCRIPT
        ));
    }
    Ok(out)
}
