//! Error types for the routing subsystem.
//!
//! # Taxonomy
//! - `RouteConfigError`: a rule could not be registered (fatal at startup)
//! - `RouteError::LockTimeout` / `LockUpgrade`: lock discipline failures
//! - `RouteError::ModuleLoad`: a module's `configure` failed for another reason
//! - `RouteError::Handler`: a handler failed (or panicked) while running

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler invocations.
pub type HandlerResult = Result<(), HandlerError>;

/// Lock flavour, used in lock diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Reader,
    Writer,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Reader => write!(f, "reader"),
            LockMode::Writer => write!(f, "writer"),
        }
    }
}

/// A rule could not be registered.
///
/// Always names the offending pattern. Once the error passes through
/// `RuleTable::load`, it also names the module whose configuration failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfigError {
    pub pattern: String,
    pub reason: String,
    pub module: Option<String>,
}

impl RouteConfigError {
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
            module: None,
        }
    }

    /// Attach the owning module, keeping the innermost one if already set.
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        if self.module.is_none() {
            self.module = Some(module.into());
        }
        self
    }
}

impl fmt::Display for RouteConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid route `{}`: {}", self.pattern, self.reason)?;
        if let Some(module) = &self.module {
            write!(f, " (while loading module {})", module)?;
        }
        Ok(())
    }
}

impl std::error::Error for RouteConfigError {}

/// Errors raised while configuring, matching or dispatching.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error(transparent)]
    Config(#[from] RouteConfigError),

    #[error("timed out after {timeout:?} waiting for the {mode} lock on rule table `{table}`")]
    LockTimeout {
        table: String,
        mode: LockMode,
        timeout: Duration,
    },

    #[error("rule table `{table}`: writer lock requested while this thread holds the reader lock")]
    LockUpgrade { table: String },

    #[error("module {module} failed to load: {source}")]
    ModuleLoad {
        module: String,
        #[source]
        source: Box<RouteError>,
    },

    #[error("handler failed for {method} {path}: {source}")]
    Handler {
        method: String,
        path: String,
        #[source]
        source: HandlerError,
    },
}

impl RouteError {
    /// Wrap an error raised inside a module's `configure`.
    pub fn in_module(self, module: &str) -> Self {
        match self {
            RouteError::Config(e) => RouteError::Config(e.in_module(module)),
            RouteError::ModuleLoad { .. } => self,
            other => RouteError::ModuleLoad {
                module: module.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Human label for the phase the error came from.
    pub fn label(&self) -> &'static str {
        match self {
            RouteError::Handler { .. } => "handler runtime error",
            _ => "routing error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_mentions_module() {
        let err = RouteConfigError::new("/admin", "not a handler").in_module("AdminModule");
        let text = err.to_string();
        assert!(text.contains("/admin"));
        assert!(text.contains("AdminModule"));

        // Innermost module wins.
        let err = err.in_module("RootModule");
        assert_eq!(err.module.as_deref(), Some("AdminModule"));
    }

    #[test]
    fn test_in_module_wraps_non_config_errors() {
        let err = RouteError::LockUpgrade { table: "root".into() }.in_module("Site");
        match err {
            RouteError::ModuleLoad { module, .. } => assert_eq!(module, "Site"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_labels() {
        let handler = RouteError::Handler {
            method: "GET".into(),
            path: "/x".into(),
            source: "boom".into(),
        };
        assert_eq!(handler.label(), "handler runtime error");
        assert_eq!(RouteError::LockUpgrade { table: "t".into() }.label(), "routing error");
    }
}
