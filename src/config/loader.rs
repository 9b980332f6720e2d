//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::LoadtraceConfig;
use crate::config::validation::ValidationError;
use crate::propagation::Propagator;

pub const ENV_ENDPOINT: &str = "LOADTRACE_ENDPOINT";
pub const ENV_PUSH_INTERVAL: &str = "LOADTRACE_PUSH_INTERVAL";
pub const ENV_ORG_ID: &str = "LOADTRACE_ORG_ID";
pub const ENV_TOKEN: &str = "LOADTRACE_TOKEN";
pub const ENV_CLOUD_TOKEN: &str = "LOADTRACE_CLOUD_TOKEN";
pub const ENV_PROPAGATOR: &str = "LOADTRACE_PROPAGATOR";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, reason: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, reason } => {
                write!(f, "error parsing environment variable '{}': {}", var, reason)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML configuration file without applying the environment.
pub fn load_config(path: &Path) -> Result<LoadtraceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` resolves a variable name; pass `|k| std::env::var(k).ok()` for
/// the process environment.
pub fn apply_env<F>(config: &mut LoadtraceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup(ENV_ENDPOINT) {
        config.exporter.endpoint = Some(endpoint);
    }

    if let Some(interval) = lookup(ENV_PUSH_INTERVAL) {
        humantime::parse_duration(&interval).map_err(|e| ConfigError::Env {
            var: ENV_PUSH_INTERVAL,
            reason: e.to_string(),
        })?;
        config.exporter.push_interval = interval;
    }

    if let Some(org_id) = lookup(ENV_ORG_ID) {
        let org_id = org_id.trim().parse::<i64>().map_err(|e| ConfigError::Env {
            var: ENV_ORG_ID,
            reason: e.to_string(),
        })?;
        config.exporter.org_id = Some(org_id);
    }

    if let Some(token) = lookup(ENV_TOKEN).or_else(|| lookup(ENV_CLOUD_TOKEN)) {
        config.exporter.token = Some(token);
    }

    if let Some(propagator) = lookup(ENV_PROPAGATOR) {
        config.propagation.propagator =
            propagator.parse::<Propagator>().map_err(|e| ConfigError::Env {
                var: ENV_PROPAGATOR,
                reason: e.to_string(),
            })?;
    }

    Ok(())
}
