//! Traced outbound HTTP.
//!
//! # Data Flow
//! ```text
//! TracingClient::send
//!     → Instrumenter::prepare (TraceId now → encode → propagation header)
//!     → reqwest request with the header injected
//!     → HttpTrail sample (method, url, status, group, scenario, trace_id)
//!     → PeriodicExporter::add_samples
//! ```
//!
//! # Design Decisions
//! - Trace id padding uses OS entropy, span ids a fast generator
//! - Both random sources are injectable for deterministic tests
//! - A request that never reached the wire produces no sample

pub mod http;
pub mod instrument;

pub use http::{ClientError, RequestContext, TracedResponse, TracingClient};
pub use instrument::{Instrumenter, PreparedTrace};
