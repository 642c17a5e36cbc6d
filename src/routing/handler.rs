//! Handler and factory capabilities, plus the built-in rule recipes.
//!
//! # Responsibilities
//! - `Handler`: runs a claimed request
//! - `HandlerFactory`: produces handlers and may veto a path match
//! - Sentinel handlers for ignored and static paths
//! - Redirect handlers (literal and computed targets)

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::http::host::{CachePolicy, Response};
use crate::routing::context::{join_paths, RouteContext};
use crate::routing::error::HandlerResult;

/// What the router should do with a resolved handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Invoke the handler.
    Handle,
    /// Leave the request to the host's default pipeline.
    Ignore,
    /// Let the host serve a static resource with long-lived caching.
    Static,
}

/// Shared per-request state a handler needs from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    None,
    ReadOnly,
    ReadWrite,
}

/// Something that can serve a routed request.
pub trait Handler: Send + Sync {
    fn handle(&self, context: &RouteContext, response: &mut dyn Response) -> HandlerResult;

    fn disposition(&self) -> Disposition {
        Disposition::Handle
    }

    fn session_state(&self) -> SessionState {
        SessionState::None
    }
}

/// Produces handlers for a rule; created once per rule and shared.
pub trait HandlerFactory: Send + Sync {
    /// Veto a path the rule's pattern already matched.
    fn supports(&self, _path: &str, _context: &RouteContext) -> bool {
        true
    }

    fn handler(&self, context: &RouteContext) -> Arc<dyn Handler>;
}

/// Predicate attached to a rule in addition to its pattern.
pub type Filter = Arc<dyn Fn(&RouteContext) -> bool + Send + Sync>;

/// Computes a redirect target from the context and the unmatched suffix.
pub type RedirectFn = Arc<dyn Fn(&RouteContext, &str) -> String + Send + Sync>;

type HandleFn = dyn Fn(&RouteContext, &mut dyn Response) -> HandlerResult + Send + Sync;

/// A handler backed by a closure.
#[derive(Clone)]
pub struct FnHandler {
    handle: Arc<HandleFn>,
    session: SessionState,
}

impl FnHandler {
    pub fn new<F>(handle: F) -> Self
    where
        F: Fn(&RouteContext, &mut dyn Response) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            handle: Arc::new(handle),
            session: SessionState::None,
        }
    }

    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Handler for FnHandler {
    fn handle(&self, context: &RouteContext, response: &mut dyn Response) -> HandlerResult {
        (self.handle)(context, response)
    }

    fn session_state(&self) -> SessionState {
        self.session
    }
}

/// Handler that only signals a disposition; never invoked by the router.
#[derive(Debug, Clone, Copy)]
pub struct SentinelHandler {
    disposition: Disposition,
}

impl Handler for SentinelHandler {
    fn handle(&self, _context: &RouteContext, _response: &mut dyn Response) -> HandlerResult {
        Ok(())
    }

    fn disposition(&self) -> Disposition {
        self.disposition
    }
}

/// Factory behind `ignore` and `static_resource` rules.
#[derive(Debug, Clone)]
pub struct SentinelFactory {
    handler: Arc<SentinelHandler>,
}

impl SentinelFactory {
    pub fn ignore() -> Self {
        Self::of(Disposition::Ignore)
    }

    pub fn static_resource() -> Self {
        Self::of(Disposition::Static)
    }

    fn of(disposition: Disposition) -> Self {
        Self {
            handler: Arc::new(SentinelHandler { disposition }),
        }
    }
}

impl HandlerFactory for SentinelFactory {
    fn handler(&self, _context: &RouteContext) -> Arc<dyn Handler> {
        self.handler.clone()
    }
}

/// Where a redirect points.
#[derive(Clone)]
pub enum RedirectTarget {
    /// Fixed target; see `resolve_redirect_target`.
    Literal { target: String, permanent: bool },
    /// Computed per request; never cached, never permanent.
    Computed(RedirectFn),
}

impl fmt::Debug for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectTarget::Literal { target, permanent } => f
                .debug_struct("Literal")
                .field("target", target)
                .field("permanent", permanent)
                .finish(),
            RedirectTarget::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Handler issuing a redirect.
#[derive(Debug, Clone)]
pub struct RedirectHandler {
    target: RedirectTarget,
}

impl RedirectHandler {
    pub fn new(target: RedirectTarget) -> Self {
        Self { target }
    }
}

impl Handler for RedirectHandler {
    fn handle(&self, context: &RouteContext, response: &mut dyn Response) -> HandlerResult {
        match &self.target {
            RedirectTarget::Literal { target, permanent } => {
                let location = resolve_redirect_target(target, context);
                let policy = if *permanent {
                    CachePolicy::LongLived
                } else {
                    CachePolicy::NoCache
                };
                response.set_cache_headers(policy);
                response.redirect(&location, *permanent);
            }
            RedirectTarget::Computed(compute) => {
                let target = compute(context, context.suffix());
                let location = resolve_redirect_target(&target, context);
                response.set_cache_headers(CachePolicy::NoCache);
                response.redirect(&location, false);
            }
        }
        Ok(())
    }
}

/// Factory behind `redirect` rules; one shared handler.
#[derive(Debug, Clone)]
pub struct RedirectFactory {
    handler: Arc<RedirectHandler>,
}

impl RedirectFactory {
    pub fn new(target: RedirectTarget) -> Self {
        Self {
            handler: Arc::new(RedirectHandler::new(target)),
        }
    }
}

impl HandlerFactory for RedirectFactory {
    fn handler(&self, _context: &RouteContext) -> Arc<dyn Handler> {
        self.handler.clone()
    }
}

/// Turn an authored redirect target into a location.
///
/// - Absolute URLs (with a scheme) are used as-is.
/// - `~` or `~/...` is relative to the application base path.
/// - Anything else is relative to the module the rule lives in.
pub fn resolve_redirect_target(target: &str, context: &RouteContext) -> String {
    if Url::parse(target).is_ok() {
        return target.to_string();
    }
    if let Some(rooted) = target.strip_prefix('~') {
        return join_paths(context.base_path(), rooted);
    }
    let module_root = join_paths(context.base_path(), context.module_path());
    join_paths(&module_root, target)
}
