//! Ordered, thread-safe rule storage with specificity matching.
//!
//! # Responsibilities
//! - Named builders (`route`, `route_to_factory`, `route_to_module`, `ignore`,
//!   `static_resource`, `redirect`, `load`); no positional insert
//! - Stable specificity sort: longest pattern first, insertion order on ties
//! - First-accepted-rule matching
//!
//! # Design Decisions
//! - Rules live in an immutable snapshot behind `ArcSwap`; writers build a new
//!   snapshot under the writer lock and publish it atomically, so readers
//!   never observe a half-sorted list
//! - Every query and mutation goes through `with_reader_lock` /
//!   `with_writer_lock`, which are bounded and reentrant per thread
//! - Matching sorts a dirty table first; a snapshot that is still unsorted
//!   when read (a writer slipped in, or the caller holds the reader) is
//!   matched in specificity order on a local copy

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::routing::context::RouteContext;
use crate::routing::error::{LockMode, RouteConfigError, RouteError};
use crate::routing::handler::{
    Filter, FnHandler, Handler, HandlerFactory, RedirectFactory, RedirectTarget, SentinelFactory,
};
use crate::routing::lock::{TableLock, DEFAULT_LOCK_TIMEOUT};
use crate::routing::matcher::{normalize_remainder, PathPattern};
use crate::routing::module::{ModuleBinding, ModuleRegistry, ModuleSlot, RouteModule};
use crate::routing::rule::{Rule, RuleSummary, Target, TargetKind};

#[derive(Default)]
struct TableState {
    rules: Vec<Arc<Rule>>,
    sorted: bool,
}

impl TableState {
    /// Rules in specificity order. A snapshot published after the last sort
    /// (or read by a thread holding the reader) is ordered on a local copy.
    fn match_order(&self) -> Cow<'_, [Arc<Rule>]> {
        if self.sorted {
            Cow::Borrowed(&self.rules)
        } else {
            Cow::Owned(specificity_order(&self.rules))
        }
    }
}

/// Longest pattern first, insertion order on ties.
fn specificity_order(rules: &[Arc<Rule>]) -> Vec<Arc<Rule>> {
    // sort_unstable_by plus the original index is a stable sort.
    let mut decorated: Vec<(usize, Arc<Rule>)> = rules.iter().cloned().enumerate().collect();
    decorated.sort_unstable_by(|(ia, a), (ib, b)| {
        b.pattern()
            .specificity()
            .cmp(&a.pattern().specificity())
            .then(ia.cmp(ib))
    });
    decorated.into_iter().map(|(_, rule)| rule).collect()
}

/// Result of a successful match.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    rule: Arc<Rule>,
    remainder: String,
}

impl RuleMatch {
    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// Path left after the matched pattern, as-is (may be empty).
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// Remainder normalized for matching in a nested table.
    pub fn nested_path(&self) -> String {
        normalize_remainder(&self.remainder)
    }
}

/// An ordered, lockable collection of rules.
pub struct RuleTable {
    name: String,
    lock: TableLock,
    state: ArcSwap<TableState>,
    registry: Arc<ModuleRegistry>,
    sort_passes: AtomicUsize,
}

impl std::fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.load();
        f.debug_struct("RuleTable")
            .field("name", &self.name)
            .field("rules", &state.rules)
            .field("sorted", &state.sorted)
            .finish()
    }
}

impl RuleTable {
    /// A table backed by the process-wide module registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, ModuleRegistry::global(), DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_registry(
        name: impl Into<String>,
        registry: Arc<ModuleRegistry>,
        lock_timeout: Duration,
    ) -> Self {
        let name = name.into();
        Self {
            lock: TableLock::new(name.clone(), lock_timeout),
            name,
            state: ArcSwap::from_pointee(TableState::default()),
            registry,
            sort_passes: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock.timeout()
    }

    /// Run `f` holding this table's reader lock.
    pub fn with_reader_lock<R>(&self, f: impl FnOnce() -> R) -> Result<R, RouteError> {
        self.lock.with_reader(f)
    }

    /// Run `f` holding this table's writer lock.
    ///
    /// Builders called from inside `f` reuse the held lock, so a batch of
    /// registrations becomes visible to readers all at once.
    pub fn with_writer_lock<R>(&self, f: impl FnOnce() -> R) -> Result<R, RouteError> {
        self.lock.with_writer(f)
    }

    // ----- builders -------------------------------------------------------

    /// Add a rule after checking `target` offers the capability `kind` needs.
    pub fn register(&self, pattern: &str, kind: TargetKind, target: Target) -> Result<&Self, RouteError> {
        self.insert(pattern, kind, target, None)
    }

    /// Route to a handler type; a fresh `H` serves every match.
    pub fn route<H: Handler + Default + 'static>(&self, pattern: &str) -> Result<&Self, RouteError> {
        self.insert(pattern, TargetKind::Direct, Target::handler::<H>(), None)
    }

    /// Route to a closure handler; each match gets its own copy.
    pub fn route_fn(&self, pattern: &str, handler: FnHandler) -> Result<&Self, RouteError> {
        let ctor = Arc::new(move || Arc::new(handler.clone()) as Arc<dyn Handler>);
        self.insert(pattern, TargetKind::Direct, Target::Handler(ctor), None)
    }

    /// Route to a factory type, created once on first use.
    pub fn route_to_factory<F: HandlerFactory + Default + 'static>(
        &self,
        pattern: &str,
    ) -> Result<&Self, RouteError> {
        self.insert(pattern, TargetKind::Factory, Target::factory::<F>(), None)
    }

    /// Route to a factory built by `ctor`, called once on first use.
    pub fn route_to_factory_with<F, C>(&self, pattern: &str, ctor: C) -> Result<&Self, RouteError>
    where
        F: HandlerFactory + 'static,
        C: Fn() -> F + Send + Sync + 'static,
    {
        let ctor = Arc::new(move || Arc::new(ctor()) as Arc<dyn HandlerFactory>);
        self.insert(pattern, TargetKind::Factory, Target::Factory(ctor), None)
    }

    /// Mount module `M`; matching continues in its own table.
    pub fn route_to_module<M: RouteModule + Default>(&self, pattern: &str) -> Result<&Self, RouteError> {
        self.insert(pattern, TargetKind::Module, Target::Module(ModuleBinding::of::<M>()), None)
    }

    /// Leave these paths to the host's default pipeline.
    pub fn ignore(&self, patterns: &[&str]) -> Result<&Self, RouteError> {
        self.with_writer_lock(|| -> Result<(), RouteError> {
            for pattern in patterns {
                self.insert(pattern, TargetKind::Ignore, sentinel(SentinelFactory::ignore), None)?;
            }
            Ok(())
        })??;
        Ok(self)
    }

    /// Ignore `pattern` when `filter` also accepts the request.
    pub fn ignore_when<P>(&self, pattern: &str, filter: P) -> Result<&Self, RouteError>
    where
        P: Fn(&RouteContext) -> bool + Send + Sync + 'static,
    {
        self.insert(
            pattern,
            TargetKind::Ignore,
            sentinel(SentinelFactory::ignore),
            Some(Arc::new(filter)),
        )
    }

    /// Serve these paths as static resources with long-lived caching.
    pub fn static_resource(&self, patterns: &[&str]) -> Result<&Self, RouteError> {
        self.with_writer_lock(|| -> Result<(), RouteError> {
            for pattern in patterns {
                self.insert(
                    pattern,
                    TargetKind::Static,
                    sentinel(SentinelFactory::static_resource),
                    None,
                )?;
            }
            Ok(())
        })??;
        Ok(self)
    }

    /// Serve `pattern` as static when `filter` also accepts the request.
    pub fn static_resource_when<P>(&self, pattern: &str, filter: P) -> Result<&Self, RouteError>
    where
        P: Fn(&RouteContext) -> bool + Send + Sync + 'static,
    {
        self.insert(
            pattern,
            TargetKind::Static,
            sentinel(SentinelFactory::static_resource),
            Some(Arc::new(filter)),
        )
    }

    /// Redirect to a literal target (`~` = application root).
    pub fn redirect(&self, pattern: &str, target: &str, permanent: bool) -> Result<&Self, RouteError> {
        let target = RedirectTarget::Literal {
            target: target.to_string(),
            permanent,
        };
        self.insert(pattern, TargetKind::Redirect, redirect_target(target), None)
    }

    /// Redirect to a target computed from the context and unmatched suffix.
    pub fn redirect_with<T>(&self, pattern: &str, target: T) -> Result<&Self, RouteError>
    where
        T: Fn(&RouteContext, &str) -> String + Send + Sync + 'static,
    {
        let target = RedirectTarget::Computed(Arc::new(target));
        self.insert(pattern, TargetKind::Redirect, redirect_target(target), None)
    }

    /// Configure module `M` (created once per registry) into this table.
    pub fn load<M: RouteModule + Default>(&self) -> Result<&Self, RouteError> {
        let slot = self.registry.slot::<M>();
        self.load_slot(&slot)
    }

    pub(crate) fn load_slot(&self, slot: &ModuleSlot) -> Result<&Self, RouteError> {
        tracing::debug!(table = %self.name, module = slot.name(), "Loading routing module");
        self.with_writer_lock(|| slot.module().configure(self))?
            .map_err(|err| {
                let err = err.in_module(slot.name());
                tracing::error!(table = %self.name, module = slot.name(), error = %err, "Module configuration failed");
                err
            })?;
        Ok(self)
    }

    fn insert(
        &self,
        pattern: &str,
        kind: TargetKind,
        target: Target,
        filter: Option<Filter>,
    ) -> Result<&Self, RouteError> {
        let rule = Rule::new(PathPattern::parse(pattern), kind, target, filter)
            .map_err(|reason| RouteConfigError::new(pattern, reason))?;
        let rule = Arc::new(rule);

        self.with_writer_lock(|| {
            let current = self.state.load();
            let mut rules = current.rules.clone();
            rules.push(rule);
            self.state.store(Arc::new(TableState {
                rules,
                sorted: false,
            }));
        })?;

        tracing::trace!(table = %self.name, pattern = %pattern, kind = ?kind, "Rule added");
        Ok(self)
    }

    // ----- ordering & matching ---------------------------------------------

    /// Sort by specificity; a no-op when nothing changed since the last sort.
    pub fn sort(&self) -> Result<&Self, RouteError> {
        self.with_writer_lock(|| {
            let current = self.state.load_full();
            if current.sorted {
                return;
            }

            let rules = specificity_order(&current.rules);
            self.sort_passes.fetch_add(1, Ordering::Relaxed);
            self.state.store(Arc::new(TableState {
                rules,
                sorted: true,
            }));
        })?;
        Ok(self)
    }

    /// First rule (in specificity order) accepting `path`.
    pub fn match_path(&self, path: &str, context: &RouteContext) -> Result<Option<RuleMatch>, RouteError> {
        self.ensure_sorted()?;
        self.with_reader_lock(|| {
            let state = self.state.load();
            let found = state
                .match_order()
                .iter()
                .find(|rule| rule.accepts(path, context))
                .map(|rule| RuleMatch {
                    rule: rule.clone(),
                    remainder: rule
                        .pattern()
                        .remainder(path)
                        .unwrap_or_default()
                        .to_string(),
                });
            found
        })
    }

    /// The own table of the module a module rule points at.
    pub fn module_table(&self, binding: &ModuleBinding) -> Result<Arc<RuleTable>, RouteError> {
        let slot = binding.resolve(&self.registry);
        self.registry.module_table(&slot)
    }

    fn ensure_sorted(&self) -> Result<(), RouteError> {
        if self.lock.held_by_current_thread() == Some(LockMode::Reader) {
            return Ok(());
        }
        if !self.is_sorted()? {
            self.sort()?;
        }
        Ok(())
    }

    // ----- introspection ---------------------------------------------------

    pub fn len(&self) -> Result<usize, RouteError> {
        self.with_reader_lock(|| self.state.load().rules.len())
    }

    pub fn is_empty(&self) -> Result<bool, RouteError> {
        Ok(self.len()? == 0)
    }

    pub fn is_sorted(&self) -> Result<bool, RouteError> {
        self.with_reader_lock(|| self.state.load().sorted)
    }

    /// How many times the sort algorithm actually ran.
    pub fn sort_passes(&self) -> usize {
        self.sort_passes.load(Ordering::Relaxed)
    }

    /// Summaries of the rules in match order.
    pub fn snapshot(&self) -> Result<Vec<RuleSummary>, RouteError> {
        self.ensure_sorted()?;
        self.with_reader_lock(|| {
            let state = self.state.load();
            state.match_order().iter().map(|r| r.summary()).collect()
        })
    }

    /// The rules in match order.
    pub fn rules(&self) -> Result<Vec<Arc<Rule>>, RouteError> {
        self.ensure_sorted()?;
        self.with_reader_lock(|| self.state.load().match_order().into_owned())
    }
}

fn sentinel(make: fn() -> SentinelFactory) -> Target {
    Target::Factory(Arc::new(move || Arc::new(make()) as Arc<dyn HandlerFactory>))
}

fn redirect_target(target: RedirectTarget) -> Target {
    Target::Factory(Arc::new(move || {
        Arc::new(RedirectFactory::new(target.clone())) as Arc<dyn HandlerFactory>
    }))
}
