//! rule-router
//!
//! Serves the demo site in `rule_router::site` through the rule router.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ axum (request id, trace)
//!                      │
//!                      ▼  spawn_blocking
//!                    Router::dispatch
//!                      │  root table ─▶ module tables ─▶ rule
//!                      ▼
//!     ◀───────────── 404 | static file | handler response | 500 + correlation id
//! ```

use std::path::PathBuf;

use clap::Parser;

use rule_router::lifecycle::Startup;
use rule_router::site;

#[derive(Parser)]
#[command(name = "rule-router", version, about = "Hierarchical rule-based request router")]
struct Args {
    /// TOML configuration file; watched for changes
    #[arg(short, long, env = "RULE_ROUTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    Startup {
        config_path: args.config,
        catalog: site::catalog(),
    }
    .run()
    .await
}
