//! Trace-id minting, header propagation and batched telemetry export for
//! load-testing clients.

pub mod client;
pub mod config;
pub mod ids;
pub mod lifecycle;
pub mod observability;
pub mod propagation;
pub mod telemetry;

pub use client::{Instrumenter, RequestContext, TracingClient};
pub use config::LoadtraceConfig;
pub use ids::{EncodedTraceId, TraceCode, TraceId};
pub use lifecycle::Session;
pub use propagation::{build_header, Propagator};
pub use telemetry::PeriodicExporter;
