//! Trace context propagation.
//!
//! # Data Flow
//! ```text
//! EncodedTraceId (32 hex chars)
//!     + Propagator (w3c | b3 | jaeger)
//!     → header.rs (draw 8-hex span id, format scheme header)
//!     → PropagationHeader (name → values)
//!     → attached to the outbound request
//! ```
//!
//! # Design Decisions
//! - Closed set of schemes; unknown names are a typed error
//! - Builders are stateless apart from the shared random source

pub mod header;

pub use header::{
    build_header, build_header_for, random_span_id, PropagationError, PropagationHeader,
    Propagator, HEADER_B3, HEADER_JAEGER, HEADER_W3C, SPAN_ID_LEN,
};
