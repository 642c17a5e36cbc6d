//! Contained failures: the id in the response body is the id in the log.

use axum::http::StatusCode;
use rule_router::routing::module::{ModuleRegistration, RouteModule, StaticDiscovery};
use rule_router::routing::{DispatchOutcome, FnHandler, RouteError, RuleTable};
use uuid::Uuid;

mod common;

#[derive(Default)]
struct Faulty;

impl RouteModule for Faulty {
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
        table
            .route_fn(
                "/orders$",
                FnHandler::new(|_, response| {
                    response.write(b"partial output");
                    Err("order store unreachable: connection refused".into())
                }),
            )?
            .route_fn("/explode$", FnHandler::new(|_, _| panic!("index out of range")))?;
        Ok(())
    }
}

fn faulty_router(debug: bool) -> rule_router::Router {
    common::router_with(StaticDiscovery::new(vec![ModuleRegistration::of::<Faulty>()]), debug)
}

fn correlation_id(body: &str) -> Uuid {
    let start = body.find('(').expect("no id in body") + 1;
    let end = body.rfind(')').expect("no id in body");
    Uuid::parse_str(&body[start..end]).expect("id is not a uuid")
}

#[test]
fn test_handler_error_is_logged_with_body_id() {
    let router = faulty_router(false);
    let ((outcome, response), logs) = common::capture_logs(|| common::get(&router, "/orders"));

    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = response.body_text();
    assert!(body.starts_with("handler runtime error"));
    assert!(!body.contains("partial output"));
    assert!(!body.contains("connection refused"));

    let id = correlation_id(&body).to_string();
    let line = logs
        .lines()
        .find(|line| line.contains(&id))
        .expect("correlation id missing from log");
    assert!(line.contains("ERROR"));
    assert!(line.contains("order store unreachable: connection refused"));
    assert!(line.contains("GET /orders"));
}

#[test]
fn test_panic_is_logged_with_body_id() {
    let router = faulty_router(false);
    let ((_, response), logs) = common::capture_logs(|| common::get(&router, "/explode"));

    let id = correlation_id(&response.body_text()).to_string();
    let line = logs.lines().find(|line| line.contains(&id)).unwrap();
    assert!(line.contains("index out of range"));
}

#[test]
fn test_each_failure_gets_its_own_id() {
    let router = faulty_router(false);
    let (_, first) = common::get(&router, "/orders");
    let (_, second) = common::get(&router, "/orders");
    assert_ne!(
        correlation_id(&first.body_text()),
        correlation_id(&second.body_text())
    );
}

#[test]
fn test_debug_mode_returns_the_error() {
    let router = faulty_router(true);
    let mut response = rule_router::http::host::BufferedResponse::new();
    let err = router
        .dispatch(&rule_router::http::host::HostRequest::get("/orders"), &mut response)
        .unwrap_err();
    assert_eq!(err.label(), "handler runtime error");
    assert!(err.to_string().contains("connection refused"));
}
