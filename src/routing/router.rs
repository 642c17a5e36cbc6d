//! Per-request dispatch over the root rule table.
//!
//! # Responsibilities
//! - Own the root table: build it once from discovered modules and
//!   configured routes, rebuild after `invalidate`
//! - Walk module tables until a terminal rule claims the request
//! - Turn sentinels into host outcomes (`Ignored`, `Static`)
//! - Invoke handlers under the host's execution wrapper
//! - Contain failures behind a correlation id unless `debug` is on
//!
//! # Design Decisions
//! - Root pointer is an `ArcSwapOption`; the build mutex is bounded by the
//!   same timeout as table locks
//! - In-flight requests keep the table they started with
//! - Handler panics are caught and treated like returned errors
//! - Explicit `Unhandled` rather than a silent default handler

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::{ArcSwap, ArcSwapOption};
use axum::http::StatusCode;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::config::schema::{RouteConfig, ServiceConfig};
use crate::http::host::{CachePolicy, HostRequest, Response};
use crate::observability::metrics;
use crate::routing::catalog::TargetCatalog;
use crate::routing::context::{ContextScope, RouteContext};
use crate::routing::error::{HandlerResult, LockMode, RouteConfigError, RouteError};
use crate::routing::handler::{Disposition, Handler, SessionState};
use crate::routing::lock::DEFAULT_LOCK_TIMEOUT;
use crate::routing::module::{InventoryDiscovery, ModuleDiscovery, ModuleRegistry};
use crate::routing::rule::{Resolved, RuleSummary};
use crate::routing::table::RuleTable;

/// Modules mounted deeper than this are treated as a configuration cycle.
pub const MAX_MODULE_DEPTH: usize = 32;

/// Router settings that can change at runtime.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Return dispatch errors to the host instead of containing them.
    pub debug: bool,
    pub lock_timeout: Duration,
    /// Configuration-declared rules applied to the root table.
    pub routes: Vec<RouteConfig>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            debug: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            routes: Vec::new(),
        }
    }
}

impl RouterSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            debug: config.router.debug,
            lock_timeout: Duration::from_millis(config.router.lock_timeout_ms),
            routes: config.routes.clone(),
        }
    }
}

/// What the router did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    /// No rule matched; the host continues normally.
    Unhandled,
    /// An ignore rule matched; the host's default pipeline handles it.
    Ignored,
    /// A static rule matched; cache headers are set, the host serves the file.
    Static,
    /// A handler ran (or a failure was contained into the response).
    Handled,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Unhandled => "unhandled",
            DispatchOutcome::Ignored => "ignored",
            DispatchOutcome::Static => "static",
            DispatchOutcome::Handled => "handled",
        }
    }
}

/// Host hook around handler invocation, told what session access it needs.
pub trait ExecutionWrapper {
    fn execute(&self, session: SessionState, invoke: &mut dyn FnMut() -> HandlerResult) -> HandlerResult;
}

/// Runs the handler as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl ExecutionWrapper for PassThrough {
    fn execute(&self, _session: SessionState, invoke: &mut dyn FnMut() -> HandlerResult) -> HandlerResult {
        invoke()
    }
}

/// Result of routing a request, before anything runs.
pub enum RouteDecision {
    Unhandled,
    Ignored,
    Static,
    Handler(ResolvedHandler),
}

impl std::fmt::Debug for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteDecision::Unhandled => f.write_str("Unhandled"),
            RouteDecision::Ignored => f.write_str("Ignored"),
            RouteDecision::Static => f.write_str("Static"),
            RouteDecision::Handler(resolved) => f
                .debug_tuple("Handler")
                .field(&resolved.context.pattern())
                .finish(),
        }
    }
}

/// A handler together with the context of the rule that claimed the request.
pub struct ResolvedHandler {
    context: Arc<RouteContext>,
    handler: Arc<dyn Handler>,
}

impl ResolvedHandler {
    pub fn context(&self) -> &RouteContext {
        &self.context
    }

    pub fn session_state(&self) -> SessionState {
        self.handler.session_state()
    }

    /// Run the handler with its context published on this thread.
    pub fn invoke(&self, response: &mut dyn Response, wrapper: &dyn ExecutionWrapper) -> Result<(), RouteError> {
        let _scope = ContextScope::enter(self.context.clone());
        let handler = &self.handler;
        let context = &self.context;

        let mut invoke = || -> HandlerResult {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(context, &mut *response))) {
                Ok(result) => result,
                Err(panic) => Err(panic_message(panic).into()),
            }
        };

        wrapper
            .execute(handler.session_state(), &mut invoke)
            .map_err(|source| RouteError::Handler {
                method: context.method().to_string(),
                path: context.request_path().to_string(),
                source,
            })
    }
}

/// One rule of the route tree, with the rules of the module it mounts.
#[derive(Debug, Clone, Serialize)]
pub struct RouteNode {
    #[serde(flatten)]
    pub rule: RuleSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteNode>,
}

/// Request router over a lazily built root table.
pub struct Router {
    root: ArcSwapOption<RuleTable>,
    build_lock: Mutex<()>,
    registry: Arc<ModuleRegistry>,
    discovery: Arc<dyn ModuleDiscovery>,
    catalog: TargetCatalog,
    settings: ArcSwap<RouterSettings>,
    builds: AtomicUsize,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("built", &self.root.load().is_some())
            .field("builds", &self.builds())
            .field("settings", &self.settings.load())
            .finish()
    }
}

impl Router {
    /// Router over modules registered with `register_module!`.
    pub fn new(settings: RouterSettings) -> Self {
        Self::with_discovery(InventoryDiscovery, settings)
    }

    pub fn with_discovery(discovery: impl ModuleDiscovery + 'static, settings: RouterSettings) -> Self {
        Self {
            root: ArcSwapOption::empty(),
            build_lock: Mutex::new(()),
            registry: Arc::new(ModuleRegistry::with_lock_timeout(settings.lock_timeout)),
            discovery: Arc::new(discovery),
            catalog: TargetCatalog::new(),
            settings: ArcSwap::from_pointee(settings),
            builds: AtomicUsize::new(0),
        }
    }

    /// Use `registry` for module instances instead of a private one.
    pub fn with_registry(mut self, registry: Arc<ModuleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Targets that configuration-declared routes may name.
    pub fn with_catalog(mut self, catalog: TargetCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> Arc<RouterSettings> {
        self.settings.load_full()
    }

    /// Number of root tables built so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn is_built(&self) -> bool {
        self.root.load().is_some()
    }

    // ----- root lifecycle --------------------------------------------------

    /// The root table, built on first use.
    pub fn root(&self) -> Result<Arc<RuleTable>, RouteError> {
        if let Some(root) = self.root.load_full() {
            return Ok(root);
        }

        let timeout = self.settings.load().lock_timeout;
        let _guard = self.build_lock.try_lock_for(timeout).ok_or_else(|| {
            tracing::error!(timeout_ms = timeout.as_millis() as u64, "Timed out waiting for root table build");
            RouteError::LockTimeout {
                table: "root".to_string(),
                mode: LockMode::Writer,
                timeout,
            }
        })?;

        if let Some(root) = self.root.load_full() {
            return Ok(root);
        }

        let root = Arc::new(self.build_root()?);
        self.root.store(Some(root.clone()));
        Ok(root)
    }

    fn build_root(&self) -> Result<RuleTable, RouteError> {
        let started = Instant::now();
        let settings = self.settings.load_full();
        let table = RuleTable::with_registry("root", self.registry.clone(), settings.lock_timeout);
        let modules = self.discovery.find_route_modules();

        table.with_writer_lock(|| -> Result<(), RouteError> {
            for module in &modules {
                module.load(&table)?;
            }
            self.catalog.apply(&table, &settings.routes)
        })??;
        table.sort()?;

        let rules = table.len()?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        metrics::record_root_build(rules);
        tracing::info!(
            modules = modules.len(),
            configured = settings.routes.len(),
            rules,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Root rule table built"
        );
        Ok(table)
    }

    /// Drop the root table; the next request rebuilds it.
    pub fn invalidate(&self) {
        if self.root.swap(None).is_some() {
            tracing::info!("Root rule table invalidated");
        }
    }

    /// Swap in new settings and rebuild on the next request.
    pub fn apply_config(&self, settings: RouterSettings) {
        tracing::info!(
            debug = settings.debug,
            routes = settings.routes.len(),
            "Router settings updated"
        );
        self.settings.store(Arc::new(settings));
        self.invalidate();
    }

    // ----- routing ---------------------------------------------------------

    /// Decide what should happen to `request` without running anything.
    pub fn resolve(&self, request: &HostRequest) -> Result<RouteDecision, RouteError> {
        self.route(&RouteContext::from_request(request))
    }

    fn route(&self, context: &RouteContext) -> Result<RouteDecision, RouteError> {
        let mut table = self.root()?;
        let mut context = context.clone();
        let mut path = context.route_path().to_string();

        for _ in 0..MAX_MODULE_DEPTH {
            let Some(matched) = table.match_path(&path, &context)? else {
                tracing::debug!(table = %table.name(), path = %path, "No rule matched");
                return Ok(RouteDecision::Unhandled);
            };
            let rule = matched.rule();
            let claimed = context.claim(rule.pattern().as_str(), matched.remainder());

            match rule.resolve(&claimed) {
                Resolved::Module(binding) => {
                    tracing::trace!(table = %table.name(), module = binding.name(), "Descending into module");
                    table = table.module_table(&binding)?;
                    context = context.descend(rule.pattern().as_str());
                    path = matched.nested_path();
                }
                Resolved::Handler(handler) => {
                    return Ok(match handler.disposition() {
                        Disposition::Ignore => RouteDecision::Ignored,
                        Disposition::Static => RouteDecision::Static,
                        Disposition::Handle => RouteDecision::Handler(ResolvedHandler {
                            context: Arc::new(claimed),
                            handler,
                        }),
                    });
                }
            }
        }

        Err(RouteConfigError::new(
            context.module_path(),
            format!("modules nested deeper than {} levels", MAX_MODULE_DEPTH),
        )
        .into())
    }

    // ----- dispatch --------------------------------------------------------

    /// Route and run `request` with a pass-through execution wrapper.
    pub fn dispatch(&self, request: &HostRequest, response: &mut dyn Response) -> Result<DispatchOutcome, RouteError> {
        self.dispatch_with(request, response, &PassThrough)
    }

    /// Route and run `request`, letting `wrapper` attach session state.
    ///
    /// With `debug` off every failure is contained: the response becomes a
    /// 500 carrying a correlation id that also appears in the error log, and
    /// the outcome is `Handled`. With `debug` on the error is returned.
    pub fn dispatch_with(
        &self,
        request: &HostRequest,
        response: &mut dyn Response,
        wrapper: &dyn ExecutionWrapper,
    ) -> Result<DispatchOutcome, RouteError> {
        let started = Instant::now();
        let context = RouteContext::from_request(request);

        let result = self
            .route(&context)
            .and_then(|decision| execute(decision, response, wrapper));

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                metrics::record_error(err.label());
                if self.settings.load().debug {
                    tracing::debug!(method = %context.method(), path = %context.request_path(), error = %err, "Returning dispatch error to host");
                    metrics::record_dispatch("error", started);
                    return Err(err);
                }
                contain(&context, &err, response);
                DispatchOutcome::Handled
            }
        };

        metrics::record_dispatch(outcome.as_str(), started);
        Ok(outcome)
    }

    /// Clear per-request state left on this thread.
    pub fn end_request(&self) {
        RouteContext::reset_current();
    }

    /// The root table and every module table reachable from it.
    pub fn describe(&self) -> Result<Vec<RouteNode>, RouteError> {
        let root = self.root()?;
        describe_table(&root, 0)
    }
}

fn execute(
    decision: RouteDecision,
    response: &mut dyn Response,
    wrapper: &dyn ExecutionWrapper,
) -> Result<DispatchOutcome, RouteError> {
    match decision {
        RouteDecision::Unhandled => Ok(DispatchOutcome::Unhandled),
        RouteDecision::Ignored => Ok(DispatchOutcome::Ignored),
        RouteDecision::Static => {
            response.set_cache_headers(CachePolicy::LongLived);
            Ok(DispatchOutcome::Static)
        }
        RouteDecision::Handler(resolved) => {
            resolved.invoke(response, wrapper)?;
            Ok(DispatchOutcome::Handled)
        }
    }
}

/// Replace the response with a 500 that only exposes a correlation id.
fn contain(context: &RouteContext, err: &RouteError, response: &mut dyn Response) {
    let correlation_id = Uuid::new_v4();
    tracing::error!(
        correlation_id = %correlation_id,
        method = %context.method(),
        path = %context.request_path(),
        label = err.label(),
        error = %err,
        detail = ?err,
        "Request failed"
    );

    response.clear();
    response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.write(format!("{} ({})", err.label(), correlation_id).as_bytes());
}

fn describe_table(table: &RuleTable, depth: usize) -> Result<Vec<RouteNode>, RouteError> {
    let mut nodes = Vec::new();
    for rule in table.rules()? {
        let children = match rule.module_binding() {
            Some(binding) if depth + 1 < MAX_MODULE_DEPTH => {
                let nested = table.module_table(&binding)?;
                describe_table(&nested, depth + 1)?
            }
            _ => Vec::new(),
        };
        nodes.push(RouteNode {
            rule: rule.summary(),
            children,
        });
    }
    Ok(nodes)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
