//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum app, request id, trace layer)
//!     → host.rs (HostRequest + BufferedResponse)
//!     → routing::Router::dispatch (blocking pool)
//!     → outcome → 404 | ServeDir | buffered response
//! ```

pub mod host;
pub mod request;
pub mod server;

pub use host::{BufferedResponse, CachePolicy, HostRequest, Response};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::RouterServer;
