//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, RELAY_* environment overlay)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → published through ArcSwap, read once per request
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<RelayConfig>
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Listener settings are only read at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, parse_config, ConfigError};
pub use schema::{
    HostMount, ListenerConfig, LoginSettings, ObservabilityConfig, RelayConfig, RelaySettings,
    TimeoutConfig,
};
