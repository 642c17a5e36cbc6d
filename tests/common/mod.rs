//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rule_router::http::host::{BufferedResponse, HostRequest};
use rule_router::lifecycle::Shutdown;
use rule_router::routing::{DispatchOutcome, FnHandler, Router, RouterSettings, StaticDiscovery};
use rule_router::{RouterServer, ServiceConfig};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Handler that writes `label` as its body.
pub fn labelled(label: &'static str) -> FnHandler {
    FnHandler::new(move |_, response| {
        response.write(label.as_bytes());
        Ok(())
    })
}

/// Settings with a short lock timeout so failures surface quickly.
pub fn settings(debug: bool) -> RouterSettings {
    RouterSettings {
        debug,
        lock_timeout: Duration::from_millis(2_000),
        routes: Vec::new(),
    }
}

pub fn router_with(discovery: StaticDiscovery, debug: bool) -> Router {
    Router::with_discovery(discovery, settings(debug))
}

/// Dispatch a GET at the application root.
pub fn get(router: &Router, path: &str) -> (DispatchOutcome, BufferedResponse) {
    let mut response = BufferedResponse::new();
    let outcome = router
        .dispatch(&HostRequest::get(path), &mut response)
        .expect("dispatch failed");
    (outcome, response)
}

/// In-memory sink for `tracing` output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with all `tracing` events captured; returns its result and the log.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

/// Start a `RouterServer` on an ephemeral port.
pub async fn start_server(config: ServiceConfig, router: Arc<Router>) -> (SocketAddr, Shutdown, mpsc::UnboundedSender<ServiceConfig>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    let server = RouterServer::new(config, router);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown, updates_tx)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
