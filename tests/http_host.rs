//! End-to-end tests against a running `RouterServer`.

use std::sync::Arc;
use std::time::Duration;

use rule_router::config::schema::{RouteConfig, RouteKind};
use rule_router::routing::module::{ModuleRegistration, RouteModule, StaticDiscovery};
use rule_router::routing::{RouteError, RuleTable};
use rule_router::ServiceConfig;

mod common;

#[derive(Default)]
struct Web;

impl RouteModule for Web {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table
            .route_fn("/hello$", common::labelled("hello from the router"))?
            .route_fn(
                "/fail$",
                rule_router::routing::FnHandler::new(|_, _| Err("backend exploded".into())),
            )?
            .static_resource(&["/assets"])?
            .ignore(&["/skipped"])?
            .redirect("/old$", "/hello", true)?;
        Ok(())
    }
}

fn router() -> Arc<rule_router::Router> {
    Arc::new(common::router_with(
        StaticDiscovery::new(vec![ModuleRegistration::of::<Web>()]),
        false,
    ))
}

#[tokio::test]
async fn test_dispatch_over_http() {
    let (addr, shutdown, _updates) = common::start_server(ServiceConfig::default(), router()).await;
    let client = common::client();

    let res = client.get(format!("http://{}/hello", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello from the router");

    let res = client.get(format!("http://{}/missing", addr)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.get(format!("http://{}/skipped/page", addr)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.get(format!("http://{}/old", addr)).send().await.unwrap();
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/hello");

    let res = client.get(format!("http://{}/fail", addr)).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let body = res.text().await.unwrap();
    assert!(body.starts_with("handler runtime error ("));
    assert!(!body.contains("exploded"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_static_files_get_long_lived_headers() {
    let root = std::env::temp_dir().join(format!("rule-router-static-{}", std::process::id()));
    std::fs::create_dir_all(root.join("assets")).unwrap();
    std::fs::write(root.join("assets/app.css"), "body {}").unwrap();

    let mut config = ServiceConfig::default();
    config.router.static_root = root.to_string_lossy().into_owned();
    let (addr, shutdown, _updates) = common::start_server(config, router()).await;

    let res = common::client()
        .get(format!("http://{}/assets/app.css", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let control = res.headers()["cache-control"].to_str().unwrap().to_string();
    assert_eq!(control, "public, max-age=1209600");
    assert!(res.headers().contains_key("expires"));
    assert_eq!(res.text().await.unwrap(), "body {}");

    shutdown.trigger();
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_config_update_rebuilds_routes() {
    let (addr, shutdown, updates) = common::start_server(ServiceConfig::default(), router()).await;
    let client = common::client();

    let res = client.get(format!("http://{}/moved", addr)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let mut config = ServiceConfig::default();
    config.routes.push(RouteConfig {
        pattern: "/moved$".into(),
        kind: RouteKind::Redirect,
        target: Some("~/hello".into()),
        permanent: false,
    });
    updates.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client.get(format!("http://{}/moved", addr)).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "/hello");
    assert_eq!(res.headers()["cache-control"], "no-cache, max-age=0");

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_api_requires_key() {
    let admin_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    drop(admin_listener);

    let mut config = ServiceConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = "test-key".into();
    config.admin.bind_address = admin_addr.to_string();
    let (addr, shutdown, _updates) = common::start_server(config, router()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/admin/status", admin_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    // Build the root table.
    client.get(format!("http://{}/hello", addr)).send().await.unwrap();

    let routes: serde_json::Value = client
        .get(format!("http://{}/admin/routes", admin_addr))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let patterns: Vec<&str> = routes
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["pattern"].as_str().unwrap())
        .collect();
    assert_eq!(patterns, vec!["/skipped", "/assets", "/hello", "/fail", "/old"]);

    let reload: serde_json::Value = client
        .post(format!("http://{}/admin/reload", admin_addr))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reload["invalidated"], true);

    let status: serde_json::Value = client
        .get(format!("http://{}/admin/status", admin_addr))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["root_built"], false);
    assert_eq!(status["root_builds"], 1);

    shutdown.trigger();
}
