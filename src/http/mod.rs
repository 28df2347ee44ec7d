//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, mount dispatch)
//!     → request.rs (request ID assigned and propagated)
//!     → [relay subsystem forwards and adapts]
//!     → response.rs (assemble response, map failures to status codes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::RelayError;
pub use server::HttpServer;
