//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing + http produce:
//!     → logging.rs (structured tracing events, correlation ids on errors)
//!     → metrics.rs (dispatch counters and latency histograms)
//!
//! Consumers:
//!     → stdout log collection
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
