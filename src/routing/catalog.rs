//! Named route targets for configuration-declared rules.
//!
//! Configuration files can only name targets. The catalog maps those names
//! to typed targets, and `apply` turns `[[routes]]` entries into rules,
//! surfacing unknown names and capability mismatches as `RouteConfigError`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::{RouteConfig, RouteKind};
use crate::routing::error::{RouteConfigError, RouteError};
use crate::routing::handler::{FnHandler, Handler, HandlerFactory};
use crate::routing::module::{ModuleBinding, RouteModule};
use crate::routing::rule::{Target, TargetKind};
use crate::routing::table::RuleTable;

#[derive(Clone, Default)]
pub struct TargetCatalog {
    targets: HashMap<String, Target>,
}

impl std::fmt::Debug for TargetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.targets.keys().collect();
        names.sort();
        f.debug_struct("TargetCatalog").field("targets", &names).finish()
    }
}

impl TargetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, name: impl Into<String>, target: Target) -> Self {
        self.targets.insert(name.into(), target);
        self
    }

    pub fn handler<H: Handler + Default + 'static>(self, name: impl Into<String>) -> Self {
        self.insert(name, Target::handler::<H>())
    }

    pub fn handler_fn(self, name: impl Into<String>, handler: FnHandler) -> Self {
        let ctor = Arc::new(move || Arc::new(handler.clone()) as Arc<dyn Handler>);
        self.insert(name, Target::Handler(ctor))
    }

    pub fn factory<F: HandlerFactory + Default + 'static>(self, name: impl Into<String>) -> Self {
        self.insert(name, Target::factory::<F>())
    }

    pub fn module<M: RouteModule + Default>(self, name: impl Into<String>) -> Self {
        self.insert(name, Target::Module(ModuleBinding::of::<M>()))
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Add every configured route to `table`.
    pub fn apply(&self, table: &RuleTable, routes: &[RouteConfig]) -> Result<(), RouteError> {
        for route in routes {
            self.apply_one(table, route)?;
        }
        Ok(())
    }

    fn apply_one(&self, table: &RuleTable, route: &RouteConfig) -> Result<(), RouteError> {
        let pattern = route.pattern.as_str();
        match route.kind {
            RouteKind::Route => {
                table.register(pattern, TargetKind::Direct, self.named(route)?)?;
            }
            RouteKind::Factory => {
                table.register(pattern, TargetKind::Factory, self.named(route)?)?;
            }
            RouteKind::Module => {
                table.register(pattern, TargetKind::Module, self.named(route)?)?;
            }
            RouteKind::Redirect => {
                let target = route.target.as_deref().ok_or_else(|| {
                    RouteConfigError::new(pattern, "redirect route has no target")
                })?;
                table.redirect(pattern, target, route.permanent)?;
            }
            RouteKind::Static => {
                table.static_resource(&[pattern])?;
            }
            RouteKind::Ignore => {
                table.ignore(&[pattern])?;
            }
        }
        Ok(())
    }

    fn named(&self, route: &RouteConfig) -> Result<Target, RouteConfigError> {
        let name = route.target.as_deref().ok_or_else(|| {
            RouteConfigError::new(&route.pattern, format!("{:?} route has no target", route.kind))
        })?;
        self.get(name).cloned().ok_or_else(|| {
            RouteConfigError::new(&route.pattern, format!("unknown target `{}`", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::host::HostRequest;
    use crate::routing::context::RouteContext;
    use crate::routing::module::ModuleRegistry;
    use std::time::Duration;

    fn route(pattern: &str, kind: RouteKind, target: Option<&str>) -> RouteConfig {
        RouteConfig {
            pattern: pattern.into(),
            kind,
            target: target.map(Into::into),
            permanent: false,
        }
    }

    fn table() -> RuleTable {
        RuleTable::with_registry("cfg", Arc::new(ModuleRegistry::new()), Duration::from_millis(500))
    }

    fn catalog() -> TargetCatalog {
        TargetCatalog::new().handler_fn("health", FnHandler::new(|_, _| Ok(())))
    }

    #[test]
    fn test_apply_routes() {
        let t = table();
        catalog()
            .apply(
                &t,
                &[
                    route("/health$", RouteKind::Route, Some("health")),
                    route("/assets", RouteKind::Static, None),
                    route("/old", RouteKind::Redirect, Some("/new")),
                ],
            )
            .unwrap();
        assert_eq!(t.len().unwrap(), 3);

        let ctx = RouteContext::from_request(&HostRequest::get("/health"));
        let m = t.match_path("/health", &ctx).unwrap().unwrap();
        assert_eq!(m.rule().kind(), TargetKind::Direct);
    }

    #[test]
    fn test_unknown_target() {
        let err = catalog()
            .apply(&table(), &[route("/x", RouteKind::Route, Some("missing"))])
            .unwrap_err();
        assert!(err.to_string().contains("unknown target `missing`"));
    }

    #[test]
    fn test_capability_mismatch() {
        let err = catalog()
            .apply(&table(), &[route("/x", RouteKind::Module, Some("health"))])
            .unwrap_err();
        match err {
            RouteError::Config(e) => {
                assert_eq!(e.pattern, "/x");
                assert!(e.reason.contains("route module"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
