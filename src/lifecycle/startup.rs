//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration into export settings
//! - Build and start the periodic exporter
//! - Build the tracing client feeding that exporter
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Must run inside a Tokio runtime (the exporter spawns its flush task)

use std::sync::Arc;

use thiserror::Error;

use crate::client::{Instrumenter, TracingClient};
use crate::config::{
    validate_config, ConfigError, ExportSettings, LoadtraceConfig, PropagationConfig,
};
use crate::telemetry::{ExportError, PeriodicExporter};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start exporter: {0}")]
    Export(#[from] ExportError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A running exporter plus a client that feeds it.
#[derive(Debug)]
pub struct Session {
    settings: ExportSettings,
    exporter: Arc<PeriodicExporter>,
    client: TracingClient,
}

impl Session {
    /// Validate `config` and start a session from it.
    pub fn start(config: &LoadtraceConfig) -> Result<Self, StartupError> {
        let settings = validate_config(config).map_err(ConfigError::Validation)?;
        Self::start_with(&config.propagation, settings)
    }

    /// Start a session from already validated settings.
    pub fn start_with(
        propagation: &PropagationConfig,
        settings: ExportSettings,
    ) -> Result<Self, StartupError> {
        let exporter = Arc::new(PeriodicExporter::from_settings(&settings)?);
        exporter.start(settings.push_interval)?;

        let http = reqwest::Client::builder().build()?;
        let instrumenter = Instrumenter::new(propagation.code, propagation.propagator);
        let client = TracingClient::new(http, instrumenter).with_exporter(exporter.clone());

        tracing::info!(
            endpoint = %settings.endpoint,
            test_run_id = settings.test_run_id,
            propagator = %propagation.propagator,
            "Session started"
        );

        Ok(Self {
            settings,
            exporter,
            client,
        })
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn exporter(&self) -> &Arc<PeriodicExporter> {
        &self.exporter
    }

    pub fn client(&self) -> &TracingClient {
        &self.client
    }

    /// Stop the exporter. Samples not yet flushed are discarded.
    pub async fn shutdown(&self) {
        self.exporter.stop().await;
        tracing::info!(test_run_id = self.settings.test_run_id, "Session stopped");
    }
}
