//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request path
//!     → matcher.rs (mount prefix matching)
//!     → Target::resolve (app prefix, static alias, sibling host mounts)
//!     → Return: matched Target or None
//! ```
//!
//! # Design Decisions
//! - Resolved per request against the current config snapshot, so mounts
//!   follow hot reloads
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same target
//! - Longest mount wins when mounts nest

pub mod matcher;

pub use matcher::{strip_mount, Target};
