//! Request telemetry export subsystem.
//!
//! # Data Flow
//! ```text
//! Producers (one per virtual user):
//!     Sample::Http(HttpTrail)
//!     → exporter.rs add_samples
//!     → buffer.rs (append under lock, non-HTTP samples discarded)
//!
//! Background flush task (one per exporter, timer driven):
//!     → buffer.rs drain (swap under lock)
//!     → exporter.rs project trails into TelemetryRecords
//!     → record.rs Batch + WireFormat encode
//!     → transport.rs POST to the collector
//! ```
//!
//! # Design Decisions
//! - Best effort: a failed batch is logged and dropped, never retried
//! - The lock covers only append and swap; encoding and I/O run outside it
//! - A single flush task; ticks missed during a slow upload are skipped
//! - Export failures never reach producers

pub mod buffer;
pub mod exporter;
pub mod record;
pub mod sample;
pub mod transport;
pub mod types;

pub use buffer::SampleBuffer;
pub use exporter::{ExporterPhase, PeriodicExporter};
pub use record::{Batch, TelemetryRecord, WireFormat};
pub use sample::{HttpTrail, MetricPoint, Sample};
pub use transport::{AuthMode, HttpTransport, Payload, Transport};
pub use types::{ExportError, ExportResult};
