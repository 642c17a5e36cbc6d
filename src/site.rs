//! Demo site served by the `rule-router` binary.
//!
//! `SiteModule` is discovered through `register_module!`; it mounts
//! `DocsModule` at `/docs`. `catalog()` names the targets a configuration
//! file may route to.

use std::sync::Arc;

use axum::http::StatusCode;

use crate::http::host::{CachePolicy, Response};
use crate::register_module;
use crate::routing::catalog::TargetCatalog;
use crate::routing::context::RouteContext;
use crate::routing::error::{HandlerResult, RouteError};
use crate::routing::handler::{Handler, HandlerFactory};
use crate::routing::module::RouteModule;
use crate::routing::table::RuleTable;

#[derive(Debug, Default)]
pub struct HomeHandler;

impl Handler for HomeHandler {
    fn handle(&self, _context: &RouteContext, response: &mut dyn Response) -> HandlerResult {
        response.set_cache_headers(CachePolicy::NoCache);
        response.write(b"rule-router is running\n");
        Ok(())
    }
}

/// Writes back what the router knows about the request.
#[derive(Debug, Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(&self, context: &RouteContext, response: &mut dyn Response) -> HandlerResult {
        let body = format!(
            "method: {}\npath: {}\nroute_path: {}\nmodule_path: {}\npattern: {}\nsuffix: {}\n",
            context.method(),
            context.request_path(),
            context.route_path(),
            context.module_path(),
            context.pattern().unwrap_or(""),
            context.suffix(),
        );
        response.write(body.as_bytes());
        Ok(())
    }
}

/// Always fails; shows error containment.
#[derive(Debug, Default)]
pub struct FailingHandler;

impl Handler for FailingHandler {
    fn handle(&self, _context: &RouteContext, _response: &mut dyn Response) -> HandlerResult {
        Err("demo failure".into())
    }
}

#[derive(Debug, Default)]
pub struct SiteModule;

impl RouteModule for SiteModule {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table
            .route::<HomeHandler>("/$")?
            .route::<EchoHandler>("/echo")?
            .route::<FailingHandler>("/fail$")?
            .route_to_module::<DocsModule>("/docs")?
            .static_resource(&["/assets", "/favicon.ico$"])?
            .redirect("/home$", "~/", true)?
            .redirect_with("/u", |_, suffix| {
                format!("~/echo/users/{}", suffix.trim_start_matches('/'))
            })?;
        Ok(())
    }
}

register_module!(SiteModule);

/// Pages under `/docs/pages/<name>`, vetoing unknown names.
#[derive(Debug)]
pub struct PageFactory {
    pages: Vec<&'static str>,
}

impl Default for PageFactory {
    fn default() -> Self {
        Self {
            pages: vec!["routing", "modules", "redirects"],
        }
    }
}

impl HandlerFactory for PageFactory {
    fn supports(&self, path: &str, _context: &RouteContext) -> bool {
        let name = path.trim_start_matches("/pages").trim_matches('/');
        self.pages.contains(&name)
    }

    fn handler(&self, context: &RouteContext) -> Arc<dyn Handler> {
        Arc::new(PageHandler {
            name: context.suffix().trim_matches('/').to_string(),
        })
    }
}

#[derive(Debug)]
struct PageHandler {
    name: String,
}

impl Handler for PageHandler {
    fn handle(&self, _context: &RouteContext, response: &mut dyn Response) -> HandlerResult {
        response.write(format!("page: {}\n", self.name).as_bytes());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DocsModule;

impl RouteModule for DocsModule {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table
            .route_fn(
                "/$",
                crate::routing::handler::FnHandler::new(|_, response| {
                    response.write(b"docs index\n");
                    Ok(())
                }),
            )?
            .route_to_factory::<PageFactory>("/pages")?
            .redirect("/start$", "pages/routing", false)?
            .route_fn(
                "/teapot$",
                crate::routing::handler::FnHandler::new(|_, response| {
                    response.set_status(StatusCode::IM_A_TEAPOT);
                    Ok(())
                }),
            )?;
        Ok(())
    }
}

/// Targets a configuration file can name in `[[routes]]`.
pub fn catalog() -> TargetCatalog {
    TargetCatalog::new()
        .handler::<HomeHandler>("home")
        .handler::<EchoHandler>("echo")
        .handler::<FailingHandler>("fail")
        .factory::<PageFactory>("pages")
        .module::<DocsModule>("docs")
}
