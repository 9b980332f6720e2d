//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check required collector parameters are present
//! - Validate value ranges (intervals > 0, URLs and addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - A successful validation yields the settings the exporter runs with
//! - Runs before the exporter is constructed

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use url::Url;

use crate::config::schema::LoadtraceConfig;
use crate::telemetry::{AuthMode, WireFormat};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing collector endpoint, set exporter.endpoint or LOADTRACE_ENDPOINT")]
    MissingEndpoint,

    #[error("invalid collector endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("missing org id, set exporter.org_id or LOADTRACE_ORG_ID")]
    MissingOrgId,

    #[error("missing token, set exporter.token, LOADTRACE_TOKEN or LOADTRACE_CLOUD_TOKEN")]
    MissingToken,

    #[error("invalid duration for {field} '{value}': {reason}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Validated collector settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub endpoint: Url,
    pub push_interval: Duration,
    pub org_id: i64,
    pub token: String,
    pub auth: AuthMode,
    pub format: WireFormat,
    pub upload_timeout: Duration,
    pub test_run_id: i64,
}

/// Validate `config`, returning the export settings or every problem found.
pub fn validate_config(config: &LoadtraceConfig) -> Result<ExportSettings, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let exporter = &config.exporter;

    let endpoint = match exporter.endpoint.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(ValidationError::MissingEndpoint);
            None
        }
        Some(raw) => match parse_endpoint(raw) {
            Ok(url) => Some(url),
            Err(reason) => {
                errors.push(ValidationError::InvalidEndpoint {
                    endpoint: raw.to_string(),
                    reason,
                });
                None
            }
        },
    };

    if exporter.org_id.is_none() {
        errors.push(ValidationError::MissingOrgId);
    }

    let token = exporter.token.as_deref().filter(|t| !t.is_empty());
    if token.is_none() {
        errors.push(ValidationError::MissingToken);
    }

    let push_interval =
        check_duration("exporter.push_interval", &exporter.push_interval, &mut errors);
    let upload_timeout =
        check_duration("exporter.upload_timeout", &exporter.upload_timeout, &mut errors);

    let metrics = &config.observability;
    if metrics.metrics_enabled && metrics.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            metrics.metrics_address.clone(),
        ));
    }

    match (endpoint, exporter.org_id, token, push_interval, upload_timeout) {
        (Some(endpoint), Some(org_id), Some(token), Some(push_interval), Some(upload_timeout))
            if errors.is_empty() =>
        {
            Ok(ExportSettings {
                endpoint,
                push_interval,
                org_id,
                token: token.to_string(),
                auth: exporter.auth,
                format: exporter.format,
                upload_timeout,
                test_run_id: exporter.test_run_id.unwrap_or_else(random_test_run_id),
            })
        }
        _ => Err(errors),
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

fn check_duration(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Duration> {
    match humantime::parse_duration(value) {
        Ok(d) if d.is_zero() => {
            errors.push(ValidationError::ZeroDuration { field });
            None
        }
        Ok(d) => Some(d),
        Err(e) => {
            errors.push(ValidationError::InvalidDuration {
                field,
                value: value.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}

fn random_test_run_id() -> i64 {
    rand::thread_rng().gen_range(10_000..99_999)
}
