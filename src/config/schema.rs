//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for loadtrace.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::ids::TraceCode;
use crate::propagation::Propagator;
use crate::telemetry::{AuthMode, WireFormat};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadtraceConfig {
    /// Telemetry collector settings.
    pub exporter: ExporterConfig,

    /// Trace id and header settings.
    pub propagation: PropagationConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Collector and flush settings.
///
/// Required values are optional here so that missing ones can be reported
/// together by validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Collector URL receiving batch uploads.
    pub endpoint: Option<String>,

    /// Flush interval, humantime syntax (e.g. "1s", "500ms").
    pub push_interval: String,

    /// Tenant identifier sent with every upload.
    pub org_id: Option<i64>,

    /// Credential sent with every upload.
    pub token: Option<String>,

    /// Authentication scheme for uploads.
    pub auth: AuthMode,

    /// Body encoding for uploads.
    pub format: WireFormat,

    /// Upper bound for one upload, humantime syntax.
    pub upload_timeout: String,

    /// Test run identifier; random when absent.
    pub test_run_id: Option<i64>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            push_interval: "1s".to_string(),
            org_id: None,
            token: None,
            auth: AuthMode::default(),
            format: WireFormat::default(),
            upload_timeout: "10s".to_string(),
            test_run_id: None,
        }
    }
}

/// Propagation settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PropagationConfig {
    /// Header scheme injected into outbound requests.
    pub propagator: Propagator,

    /// Run kind encoded into every trace id.
    pub code: TraceCode,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
