//! Matching and dispatch scenarios through the public API.

use std::sync::Arc;
use std::time::Duration;

use rule_router::http::host::{HostRequest, Response};
use rule_router::routing::context::RouteContext;
use rule_router::routing::module::{ModuleRegistration, ModuleRegistry, RouteModule, StaticDiscovery};
use rule_router::routing::{DispatchOutcome, Handler, HandlerResult, RouteError, RuleTable, Target, TargetKind};

mod common;

fn table() -> RuleTable {
    RuleTable::with_registry("scenario", Arc::new(ModuleRegistry::new()), Duration::from_secs(2))
}

fn body_for(table: &RuleTable, path: &str) -> Option<String> {
    let context = RouteContext::from_request(&HostRequest::get(path));
    let matched = table.match_path(path, &context).unwrap()?;
    Some(matched.rule().pattern().to_string())
}

#[test]
fn test_admin_users_scenario() {
    let t = table();
    t.route_fn("/", common::labelled("A"))
        .unwrap()
        .route_fn("/admin", common::labelled("B"))
        .unwrap()
        .route_fn("/admin/users$", common::labelled("C"))
        .unwrap();
    t.sort().unwrap();

    assert_eq!(body_for(&t, "/admin/users").as_deref(), Some("/admin/users$"));
    assert_eq!(body_for(&t, "/admin/users/5").as_deref(), Some("/admin"));
    assert_eq!(body_for(&t, "/other").as_deref(), Some("/"));
    assert_eq!(body_for(&t, "/admin/users2").as_deref(), Some("/admin"));
    assert_eq!(body_for(&t, "/admin/user").as_deref(), Some("/admin"));
}

#[test]
fn test_longest_pattern_wins_regardless_of_insert_order() {
    let t = table();
    t.route_fn("/a/b/c", common::labelled("3"))
        .unwrap()
        .route_fn("/a", common::labelled("1"))
        .unwrap()
        .route_fn("/a/b", common::labelled("2"))
        .unwrap();

    assert_eq!(body_for(&t, "/a/b/c/d").as_deref(), Some("/a/b/c"));
    assert_eq!(body_for(&t, "/a/b/x").as_deref(), Some("/a/b"));
    assert_eq!(body_for(&t, "/a/x").as_deref(), Some("/a"));
    assert_eq!(body_for(&t, "/b"), None);
}

#[test]
fn test_ties_keep_insertion_order() {
    #[derive(Default)]
    struct Tied;

    impl RouteModule for Tied {
        fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
            table
                .route_fn("/x", common::labelled("first"))?
                .route_fn("/y", common::labelled("other"))?
                .route_fn("/x", common::labelled("second"))?;
            Ok(())
        }
    }

    let router = common::router_with(StaticDiscovery::new(vec![ModuleRegistration::of::<Tied>()]), false);
    let (_, response) = common::get(&router, "/x/1");
    assert_eq!(response.body_text(), "first");
}

#[test]
fn test_exact_and_escaped_markers() {
    let t = table();
    t.route_fn("/price$$", common::labelled("price"))
        .unwrap()
        .route_fn("/admin/users$", common::labelled("users"))
        .unwrap();

    assert_eq!(body_for(&t, "/price$"), Some("/price$".to_string()));
    assert_eq!(body_for(&t, "/price$/list"), Some("/price$".to_string()));
    assert_eq!(body_for(&t, "/price"), None);
    assert_eq!(body_for(&t, "/admin/users"), Some("/admin/users$".to_string()));
    assert_eq!(body_for(&t, "/admin/users/5"), None);
}

#[test]
fn test_sort_runs_once_without_inserts() {
    let t = table();
    t.route_fn("/a", common::labelled("a")).unwrap();
    t.sort().unwrap();
    t.sort().unwrap();
    assert_eq!(t.sort_passes(), 1);

    t.route_fn("/b", common::labelled("b")).unwrap();
    t.sort().unwrap();
    t.sort().unwrap();
    assert_eq!(t.sort_passes(), 2);
}

#[derive(Default)]
struct AppModule;

impl RouteModule for AppModule {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table.route_fn("/users", common::labelled("handler-a"))?;
        Ok(())
    }
}

#[derive(Default)]
struct RootModule;

impl RouteModule for RootModule {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table.route_to_module::<AppModule>("/app")?;
        Ok(())
    }
}

#[test]
fn test_module_recursion() {
    let router = common::router_with(
        StaticDiscovery::new(vec![ModuleRegistration::of::<RootModule>()]),
        false,
    );

    let (outcome, response) = common::get(&router, "/app/users");
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(response.body_text(), "handler-a");

    let (outcome, _) = common::get(&router, "/app/unknown");
    assert_eq!(outcome, DispatchOutcome::Unhandled);

    // Module instances are created once per registry.
    common::get(&router, "/app/users");
    assert_eq!(router.registry().constructed(), 2);
}

#[derive(Default)]
struct RootWithHomeModule;

impl RouteModule for RootWithHomeModule {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table
            .route_fn("/", common::labelled("home"))?
            .route_to_module::<AppModule>("/app")?;
        Ok(())
    }
}

#[test]
fn test_module_miss_does_not_fall_back_to_siblings() {
    let router = common::router_with(
        StaticDiscovery::new(vec![ModuleRegistration::of::<RootWithHomeModule>()]),
        false,
    );

    let (outcome, response) = common::get(&router, "/elsewhere");
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(response.body_text(), "home");

    // `/app` claims the path; `/` is never consulted once the module misses.
    let (outcome, response) = common::get(&router, "/app/unknown");
    assert_eq!(outcome, DispatchOutcome::Unhandled);
    assert_eq!(response.body_text(), "");
}

#[derive(Default)]
struct MisconfiguredModule;

impl RouteModule for MisconfiguredModule {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table.register("/bad", TargetKind::Module, Target::handler::<Noop>())?;
        Ok(())
    }
}

#[derive(Default)]
struct Noop;

impl Handler for Noop {
    fn handle(&self, _: &RouteContext, _: &mut dyn Response) -> HandlerResult {
        Ok(())
    }
}

#[test]
fn test_load_error_names_owning_module() {
    let t = table();
    let err = t.load::<MisconfiguredModule>().unwrap_err();
    match err {
        RouteError::Config(e) => {
            assert_eq!(e.pattern, "/bad");
            assert_eq!(e.module.as_deref(), Some(std::any::type_name::<MisconfiguredModule>()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(t.is_empty().unwrap());
}

#[test]
fn test_base_path_is_stripped() {
    let router = common::router_with(
        StaticDiscovery::new(vec![ModuleRegistration::of::<RootModule>()]),
        false,
    );
    let mut response = rule_router::http::host::BufferedResponse::new();
    let outcome = router
        .dispatch(&HostRequest::new("GET", "/site/app/users", "/site"), &mut response)
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(response.body_text(), "handler-a");
}

#[test]
fn test_describe_includes_module_tables() {
    let router = common::router_with(
        StaticDiscovery::new(vec![ModuleRegistration::of::<RootModule>()]),
        false,
    );
    let tree = router.describe().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].rule.pattern, "/app");
    assert_eq!(tree[0].children.len(), 1);
    assert_eq!(tree[0].children[0].rule.pattern, "/users");

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json[0]["kind"], "module");
    assert_eq!(json[0]["children"][0]["kind"], "direct");
}

#[test]
fn test_configured_routes_and_reload() {
    use rule_router::config::schema::{RouteConfig, RouteKind};
    use rule_router::routing::TargetCatalog;

    let catalog = TargetCatalog::new().handler_fn("hello", common::labelled("hello"));
    let router = common::router_with(StaticDiscovery::empty(), false).with_catalog(catalog);
    assert_eq!(common::get(&router, "/hi").0, DispatchOutcome::Unhandled);

    let mut settings = common::settings(false);
    settings.routes.push(RouteConfig {
        pattern: "/hi$".into(),
        kind: RouteKind::Route,
        target: Some("hello".into()),
        permanent: false,
    });
    router.apply_config(settings);

    let (outcome, response) = common::get(&router, "/hi");
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(response.body_text(), "hello");
    assert_eq!(router.builds(), 2);
}

#[test]
fn test_unknown_catalog_target_is_contained() {
    use rule_router::config::schema::{RouteConfig, RouteKind};

    let mut settings = common::settings(true);
    settings.routes.push(RouteConfig {
        pattern: "/x".into(),
        kind: RouteKind::Route,
        target: Some("missing".into()),
        permanent: false,
    });
    let router = rule_router::Router::with_discovery(StaticDiscovery::empty(), settings);

    let mut response = rule_router::http::host::BufferedResponse::new();
    let err = router.dispatch(&HostRequest::get("/x"), &mut response).unwrap_err();
    assert!(matches!(err, RouteError::Config(_)));
    assert!(!router.is_built());
}
