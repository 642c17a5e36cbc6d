//! Hierarchical rule-based request router.
//!
//! Requests are matched against a table of path rules, most specific first.
//! A rule either runs a handler, defers to the host (ignore, static), issues
//! a redirect, or mounts a module whose own table continues the match.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod site;

// `register_module!` expands to `$crate::inventory::submit!`.
#[doc(hidden)]
pub use inventory;

pub use config::ServiceConfig;
pub use http::RouterServer;
pub use lifecycle::Shutdown;
pub use routing::{Router, RouterSettings, RuleTable};
