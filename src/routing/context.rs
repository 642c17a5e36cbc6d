//! Per-request routing context.
//!
//! A `RouteContext` is created once per request by the router and never
//! mutated. Descending into a module or claiming a rule derives a new value.
//! It travels explicitly through matching and handler invocation; while a
//! handler runs it is also visible through `RouteContext::current()`.

use std::cell::RefCell;
use std::sync::Arc;

use crate::http::host::HostRequest;

thread_local! {
    static CURRENT: RefCell<Option<Arc<RouteContext>>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteContext {
    method: String,
    request_path: String,
    base_path: String,
    route_path: String,
    module_path: String,
    pattern: Option<String>,
    suffix: String,
    routed: bool,
}

impl RouteContext {
    /// Build the context for a host request, stripping the base path.
    pub fn from_request(request: &HostRequest) -> Self {
        let route_path = strip_base_path(&request.path, &request.application_base_path);
        Self {
            method: request.method.to_string(),
            request_path: request.path.clone(),
            base_path: request.application_base_path.clone(),
            route_path,
            module_path: String::new(),
            pattern: None,
            suffix: String::new(),
            routed: false,
        }
    }

    /// Context for matching inside a module mounted at `mount`.
    pub fn descend(&self, mount: &str) -> Self {
        let mut next = self.clone();
        next.module_path = join_paths(&self.module_path, mount);
        next
    }

    /// Context for a request claimed by a terminal rule.
    pub fn claim(&self, pattern: &str, suffix: &str) -> Self {
        let mut next = self.clone();
        next.pattern = Some(pattern.to_string());
        next.suffix = suffix.to_string();
        next.routed = true;
        next
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path as the host received it.
    pub fn request_path(&self) -> &str {
        &self.request_path
    }

    /// Application base path stripped from the request path.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Request path relative to the application base.
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    /// Concatenated mount prefixes of the modules descended through.
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Pattern of the rule that claimed the request.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Part of the path left unmatched by the claiming rule.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn is_routed(&self) -> bool {
        self.routed
    }

    /// Context of the handler running on this thread, if any.
    pub fn current() -> Option<Arc<RouteContext>> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Clear the thread's context slot.
    pub fn reset_current() {
        CURRENT.with(|slot| slot.borrow_mut().take());
    }
}

/// Publishes a context in the thread slot; restores the previous one on drop.
pub(crate) struct ContextScope {
    previous: Option<Arc<RouteContext>>,
}

impl ContextScope {
    pub(crate) fn enter(context: Arc<RouteContext>) -> Self {
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
        Self { previous }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Remove the application base path from `path`.
///
/// The result always starts with `/`. Paths outside the base are returned
/// unchanged.
pub fn strip_base_path(path: &str, base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return ensure_leading_slash(path);
    }
    match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => ensure_leading_slash(rest),
        _ => ensure_leading_slash(path),
    }
}

/// Join two path fragments with exactly one `/` between them.
pub fn join_paths(left: &str, right: &str) -> String {
    let left = left.trim_end_matches('/');
    let right = right.trim_start_matches('/');
    if right.is_empty() {
        if left.is_empty() {
            "/".to_string()
        } else {
            left.to_string()
        }
    } else {
        format!("{}/{}", left, right)
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
