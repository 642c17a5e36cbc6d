//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Root build (first request, or first request after invalidate):
//!     ModuleDiscovery → RouteModule::configure(root table)
//!     → configured routes (catalog.rs)
//!     → stable sort by specificity
//!
//! Incoming Request (method, path, base path):
//!     → router.rs (strip base path, build RouteContext)
//!     → table.rs (first accepting rule, most specific first)
//!     → module rule? descend into the module's own table and repeat
//!     → terminal rule: Ignored | Static | handler invocation
//! ```
//!
//! # Design Decisions
//! - Longest pattern wins; ties keep registration order
//! - Prefix matching by default, `$` suffix for exact, `$$` for a literal `$`
//! - Tables are read concurrently, written exclusively, with bounded and
//!   per-thread reentrant locks
//! - Explicit `Unhandled` rather than a silent default

pub mod catalog;
pub mod context;
pub mod error;
pub mod handler;
pub mod lock;
pub mod matcher;
pub mod module;
pub mod router;
pub mod rule;
pub mod table;

pub use catalog::TargetCatalog;
pub use context::RouteContext;
pub use error::{HandlerError, HandlerResult, RouteConfigError, RouteError};
pub use handler::{Disposition, FnHandler, Handler, HandlerFactory, SessionState};
pub use module::{
    InventoryDiscovery, ModuleDiscovery, ModuleRegistration, ModuleRegistry, RouteModule,
    StaticDiscovery,
};
pub use router::{DispatchOutcome, ExecutionWrapper, Router, RouterSettings};
pub use rule::{Rule, Target, TargetKind};
pub use table::RuleTable;
