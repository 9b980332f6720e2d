//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Exporter, client and lifecycle produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters for buffered, exported and dropped telemetry)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or the configured level)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates are no-ops until a recorder is installed
//! - Export failures are visible here, never to producers

pub mod logging;
pub mod metrics;
