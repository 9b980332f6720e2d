//! Trace identifier subsystem.
//!
//! # Data Flow
//! ```text
//! TraceId { prefix, code, timestamp_ms }
//!     → trace_id.rs (validate, varint-encode into 16 bytes)
//!     → random.rs (fill the remaining bytes)
//!     → EncodedTraceId (raw bytes + 32-char lowercase hex)
//!
//! Inbound hex / raw bytes
//!     → trace_id.rs (varint-decode the leading fields)
//!     → TraceId
//! ```
//!
//! # Design Decisions
//! - 128-bit ids so the same value fits W3C, B3 and Jaeger headers
//! - Randomness is an injected capability, never a hidden global generator
//! - Decoding is strict: anything but a well-formed 16-byte buffer is rejected

pub mod random;
pub mod trace_id;

pub use random::{FastRandom, FixedSource, OsRandom, RandomSource};
pub use trace_id::{
    EncodedTraceId, TraceCode, TraceId, TraceIdError, CLOUD_CODE, LOCAL_CODE, RESERVED_PREFIX,
    TRACE_ID_LEN,
};
