//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum app whose fallback hands every request to the `Router`
//! - Wire up middleware (tracing, request ID)
//! - Map dispatch outcomes to HTTP: 404 for unhandled/ignored, `ServeDir`
//!   for static, the buffered response for handled
//! - Apply configuration updates and shut down gracefully
//!
//! # Design Decisions
//! - Dispatch runs on the blocking pool; table locks may wait up to the
//!   lock timeout and must not stall the reactor
//! - The admin API gets its own listener and shares the server state

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceExt;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::host::{BufferedResponse, HostRequest};
use crate::http::request::{request_id_layers, RequestIdExt};
use crate::routing::context::strip_base_path;
use crate::routing::router::{DispatchOutcome, Router, RouterSettings};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub config: Arc<ArcSwap<ServiceConfig>>,
    pub started: Instant,
    pub request_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(router: Arc<Router>, config: ServiceConfig) -> Self {
        Self {
            router,
            config: Arc::new(ArcSwap::from_pointee(config)),
            started: Instant::now(),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// HTTP host for a `Router`.
pub struct RouterServer {
    app: axum::Router,
    state: AppState,
}

impl RouterServer {
    /// Create a server for `router`; the router's settings are replaced by
    /// the ones in `config`.
    pub fn new(config: ServiceConfig, router: Arc<Router>) -> Self {
        router.apply_config(RouterSettings::from_config(&config));
        let state = AppState::new(router, config);
        let app = Self::build_app(state.clone());
        Self { app, state }
    }

    /// Build the axum app with all middleware layers.
    fn build_app(state: AppState) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(request_id_layers())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` are applied to the router;
    /// the admin API is started on its own address when enabled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let config = self.state.config.load_full();
        if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let admin_app = setup_admin_router(self.state.clone());
            let mut admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let result = axum::serve(admin_listener, admin_app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }

        let updates_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                updates_state
                    .router
                    .apply_config(RouterSettings::from_config(&new_config));
                updates_state.config.store(Arc::new(new_config));
                tracing::info!("Configuration applied");
            }
        });

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback handler: every request goes through the router.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let config = state.config.load_full();
    let request_id = request.request_id().to_string();
    let host_request = HostRequest::new(
        request.method().as_str(),
        request.uri().path(),
        config.router.base_path.as_str(),
    );

    tracing::debug!(
        request_id = %request_id,
        method = %host_request.method,
        path = %host_request.path,
        "Dispatching request"
    );

    let router = state.router.clone();
    let dispatched = tokio::task::spawn_blocking(move || {
        let mut response = BufferedResponse::new();
        let outcome = router.dispatch(&host_request, &mut response);
        router.end_request();
        (outcome, response)
    })
    .await;

    match dispatched {
        Ok((Ok(DispatchOutcome::Handled), response)) => response.into_response(),
        Ok((Ok(DispatchOutcome::Static), response)) => {
            serve_static(&config, request, response).await
        }
        Ok((Ok(outcome), _)) => {
            tracing::debug!(request_id = %request_id, outcome = outcome.as_str(), "Not handled by router");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        Ok((Err(err), _)) => {
            // Debug mode: show everything.
            tracing::error!(request_id = %request_id, error = %err, "Dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}\n\n{:#?}", err, err),
            )
                .into_response()
        }
        Err(join_err) => {
            tracing::error!(request_id = %request_id, error = %join_err, "Dispatch task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Serve a static match from `static_root`, keeping the router's cache headers.
async fn serve_static(config: &ServiceConfig, request: Request<Body>, routed: BufferedResponse) -> Response {
    let (mut parts, body) = request.into_parts();
    let relative = strip_base_path(parts.uri.path(), &config.router.base_path);
    parts.uri = match relative.parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(path = %relative, error = %e, "Unservable static path");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    let served = ServeDir::new(&config.router.static_root)
        .oneshot(Request::from_parts(parts, body))
        .await;
    let mut response = match served {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        for (name, value) in routed.headers() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    response
}
