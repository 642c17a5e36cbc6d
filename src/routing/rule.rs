//! A single path-to-target mapping.
//!
//! # Data Model
//! - `pattern`: normalized path pattern plus match mode
//! - `kind`: what the rule targets (`TargetKind`)
//! - `resolver`: how a match turns into something runnable
//! - `filter`: optional predicate on the request context
//!
//! # Design Decisions
//! - One struct with a tagged resolver instead of a type per rule flavour
//! - Built-in recipes (ignore, static, redirect) are factory-resolved
//! - The factory instance is the only mutable state, created once on first use

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::routing::context::RouteContext;
use crate::routing::handler::{Filter, Handler, HandlerFactory};
use crate::routing::matcher::{MatchMode, PathPattern};
use crate::routing::module::ModuleBinding;

/// What a rule points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Direct,
    Factory,
    Module,
    Redirect,
    Static,
    Ignore,
}

impl TargetKind {
    /// The capability a target must offer to back a rule of this kind.
    pub fn required_capability(&self) -> Capability {
        match self {
            TargetKind::Direct => Capability::Handler,
            TargetKind::Module => Capability::Module,
            TargetKind::Factory | TargetKind::Redirect | TargetKind::Static | TargetKind::Ignore => {
                Capability::Factory
            }
        }
    }
}

/// Capabilities a route target can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Handler,
    Factory,
    Module,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Handler => write!(f, "handler"),
            Capability::Factory => write!(f, "handler factory"),
            Capability::Module => write!(f, "route module"),
        }
    }
}

/// Constructs a fresh handler.
pub type HandlerCtor = Arc<dyn Fn() -> Arc<dyn Handler> + Send + Sync>;

/// Constructs the (single) factory of a factory rule.
pub type FactoryCtor = Arc<dyn Fn() -> Arc<dyn HandlerFactory> + Send + Sync>;

/// A route target before it is attached to a rule.
#[derive(Clone)]
pub enum Target {
    Handler(HandlerCtor),
    Factory(FactoryCtor),
    Module(ModuleBinding),
}

impl Target {
    pub fn handler<H: Handler + Default + 'static>() -> Self {
        Target::Handler(Arc::new(|| Arc::new(H::default()) as Arc<dyn Handler>))
    }

    pub fn factory<F: HandlerFactory + Default + 'static>() -> Self {
        Target::Factory(Arc::new(|| Arc::new(F::default()) as Arc<dyn HandlerFactory>))
    }

    pub fn capability(&self) -> Capability {
        match self {
            Target::Handler(_) => Capability::Handler,
            Target::Factory(_) => Capability::Factory,
            Target::Module(_) => Capability::Module,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Module(binding) => f.debug_tuple("Module").field(binding).finish(),
            other => write!(f, "{}", other.capability()),
        }
    }
}

/// Resolution strategy of a rule.
pub(crate) enum Resolver {
    /// Fresh handler per match.
    Direct(HandlerCtor),
    /// One lazily created factory per rule.
    Factory {
        ctor: FactoryCtor,
        instance: OnceCell<Arc<dyn HandlerFactory>>,
    },
    /// Descend into a module's own table.
    Module(ModuleBinding),
}

/// What a matched rule resolves to.
pub enum Resolved {
    Handler(Arc<dyn Handler>),
    Module(ModuleBinding),
}

/// One entry of a `RuleTable`.
pub struct Rule {
    pattern: PathPattern,
    kind: TargetKind,
    resolver: Resolver,
    filter: Option<Filter>,
}

impl Rule {
    /// Build a rule, checking that `target` offers what `kind` needs.
    pub(crate) fn new(
        pattern: PathPattern,
        kind: TargetKind,
        target: Target,
        filter: Option<Filter>,
    ) -> Result<Self, String> {
        let required = kind.required_capability();
        let offered = target.capability();
        if required != offered {
            return Err(format!(
                "a {:?} rule needs a {} target, got a {}",
                kind, required, offered
            ));
        }

        let resolver = match target {
            Target::Handler(ctor) => Resolver::Direct(ctor),
            Target::Factory(ctor) => Resolver::Factory {
                ctor,
                instance: OnceCell::new(),
            },
            Target::Module(binding) => Resolver::Module(binding),
        };

        Ok(Self {
            pattern,
            kind,
            resolver,
            filter,
        })
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Pattern, filter, then factory veto.
    pub fn accepts(&self, path: &str, context: &RouteContext) -> bool {
        if !self.pattern.matches(path) {
            return false;
        }
        if let Some(filter) = &self.filter {
            if !filter(context) {
                return false;
            }
        }
        match &self.resolver {
            Resolver::Factory { .. } => self.factory().is_some_and(|f| f.supports(path, context)),
            _ => true,
        }
    }

    /// Turn this rule into a handler or a module to descend into.
    pub fn resolve(&self, context: &RouteContext) -> Resolved {
        match &self.resolver {
            Resolver::Direct(ctor) => Resolved::Handler(ctor()),
            Resolver::Factory { ctor, instance } => {
                let factory = instance.get_or_init(|| ctor());
                Resolved::Handler(factory.handler(context))
            }
            Resolver::Module(binding) => Resolved::Module(*binding),
        }
    }

    /// The rule's factory, created on first call.
    fn factory(&self) -> Option<&Arc<dyn HandlerFactory>> {
        match &self.resolver {
            Resolver::Factory { ctor, instance } => Some(instance.get_or_init(|| ctor())),
            _ => None,
        }
    }

    /// The module a module rule mounts.
    pub fn module_binding(&self) -> Option<ModuleBinding> {
        match &self.resolver {
            Resolver::Module(binding) => Some(*binding),
            _ => None,
        }
    }

    /// Whether the factory of a factory rule has been created.
    pub fn factory_created(&self) -> bool {
        match &self.resolver {
            Resolver::Factory { instance, .. } => instance.get().is_some(),
            _ => false,
        }
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            pattern: self.pattern.as_str().to_string(),
            mode: self.pattern.mode(),
            kind: self.kind,
            filtered: self.filter.is_some(),
            module: match &self.resolver {
                Resolver::Module(binding) => Some(binding.name().to_string()),
                _ => None,
            },
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern.to_string())
            .field("kind", &self.kind)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Serializable view of a rule, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub pattern: String,
    pub mode: MatchMode,
    pub kind: TargetKind,
    pub filtered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::host::{HostRequest, Response};
    use crate::routing::error::HandlerResult;
    use crate::routing::handler::SentinelFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Default for Counted {
        fn default() -> Self {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Counted
        }
    }

    impl Handler for Counted {
        fn handle(&self, _: &RouteContext, _: &mut dyn Response) -> HandlerResult {
            Ok(())
        }
    }

    #[derive(Default)]
    struct OnlyEven;

    impl HandlerFactory for OnlyEven {
        fn supports(&self, path: &str, _: &RouteContext) -> bool {
            path.len() % 2 == 0
        }

        fn handler(&self, _: &RouteContext) -> Arc<dyn Handler> {
            Arc::new(Counted)
        }
    }

    fn ctx(path: &str) -> RouteContext {
        RouteContext::from_request(&HostRequest::get(path))
    }

    #[test]
    fn test_capability_mismatch_is_rejected() {
        let err = Rule::new(
            PathPattern::parse("/x"),
            TargetKind::Direct,
            Target::factory::<OnlyEven>(),
            None,
        )
        .unwrap_err();
        assert!(err.contains("handler"));
    }

    #[test]
    fn test_direct_builds_fresh_handler_each_time() {
        let rule = Rule::new(PathPattern::parse("/c"), TargetKind::Direct, Target::handler::<Counted>(), None)
            .unwrap();
        let before = BUILT.load(Ordering::SeqCst);
        let _ = rule.resolve(&ctx("/c"));
        let _ = rule.resolve(&ctx("/c"));
        assert_eq!(BUILT.load(Ordering::SeqCst) - before, 2);
    }

    #[test]
    fn test_factory_veto_and_lazy_creation() {
        let rule = Rule::new(PathPattern::parse("/f"), TargetKind::Factory, Target::factory::<OnlyEven>(), None)
            .unwrap();
        assert!(!rule.factory_created());
        // OnlyEven accepts even-length paths.
        assert!(rule.accepts("/f/x", &ctx("/f/x")));
        assert!(!rule.accepts("/f/", &ctx("/f/")));
        assert!(rule.factory_created());
        // Pattern mismatch never reaches the factory.
        assert!(!rule.accepts("/g/", &ctx("/g/")));
    }

    #[test]
    fn test_filter_is_applied() {
        let filter: Filter = Arc::new(|c: &RouteContext| c.method() == "GET");
        let target = Target::Factory(Arc::new(|| Arc::new(SentinelFactory::ignore()) as Arc<dyn HandlerFactory>));
        let rule = Rule::new(PathPattern::parse("/i"), TargetKind::Ignore, target, Some(filter)).unwrap();
        assert!(rule.accepts("/i", &ctx("/i")));

        let post = RouteContext::from_request(&HostRequest::new("POST", "/i", "/"));
        assert!(!rule.accepts("/i", &post));
        assert!(rule.summary().filtered);
    }
}
