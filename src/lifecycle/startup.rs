//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: config and bind errors are fatal
//! - Logging first, listener last (traffic only when ready)
//! - The config watcher runs only when the config came from a file

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, ServiceConfig};
use crate::http::server::RouterServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::{logging, metrics};
use crate::routing::catalog::TargetCatalog;
use crate::routing::router::{Router, RouterSettings};

/// Everything `run` needs to start the service.
#[derive(Debug, Default)]
pub struct Startup {
    pub config_path: Option<PathBuf>,
    pub catalog: TargetCatalog,
}

impl Startup {
    /// Load config, start subsystems and serve until a shutdown signal.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let config = match &self.config_path {
            Some(path) => load_config(path)?,
            None => ServiceConfig::default(),
        };

        logging::init(&config.observability.log_level);
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            config = ?self.config_path,
            "rule-router starting"
        );
        tracing::info!(
            bind_address = %config.listener.bind_address,
            base_path = %config.router.base_path,
            routes = config.routes.len(),
            debug = config.router.debug,
            "Configuration loaded"
        );

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(_) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let router = Arc::new(Router::new(RouterSettings::from_config(&config)).with_catalog(self.catalog));

        let (_watcher, config_updates) = match &self.config_path {
            Some(path) => {
                let (watcher, updates) = ConfigWatcher::new(path);
                (Some(watcher.run()?), updates)
            }
            None => {
                let (_tx, updates) = mpsc::unbounded_channel();
                (None, updates)
            }
        };

        let listener = TcpListener::bind(&config.listener.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");

        let shutdown = Shutdown::new();
        spawn_signal_handler(shutdown.clone());

        let server = RouterServer::new(config, router);
        server.run(listener, config_updates, shutdown.subscribe()).await?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
