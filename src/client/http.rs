//! reqwest-backed client that traces every request.

use std::iter;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use reqwest::Method;
use thiserror::Error;

use crate::client::instrument::Instrumenter;
use crate::ids::{EncodedTraceId, TraceIdError};
use crate::telemetry::sample::{
    HttpTrail, META_TRACE_ID, TAG_GROUP, TAG_METHOD, TAG_SCENARIO, TAG_STATUS, TAG_URL,
};
use crate::telemetry::PeriodicExporter;

/// Status tag recorded when no response arrived.
const STATUS_NO_RESPONSE: &str = "0";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to mint trace id: {0}")]
    TraceId(#[from] TraceIdError),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Grouping tags attached to every sample of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub group: String,
    pub scenario: String,
}

impl RequestContext {
    pub fn new(group: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            scenario: scenario.into(),
        }
    }
}

/// A response together with the trace id sent with its request.
#[derive(Debug)]
pub struct TracedResponse {
    pub response: reqwest::Response,
    pub trace_id: EncodedTraceId,
}

/// HTTP client injecting a propagation header into every request and
/// feeding the resulting timings to an exporter.
#[derive(Debug, Clone)]
pub struct TracingClient {
    http: reqwest::Client,
    instrumenter: Instrumenter,
    exporter: Option<Arc<PeriodicExporter>>,
}

impl TracingClient {
    pub fn new(http: reqwest::Client, instrumenter: Instrumenter) -> Self {
        Self {
            http,
            instrumenter,
            exporter: None,
        }
    }

    /// Send samples of completed requests to `exporter`.
    pub fn with_exporter(mut self, exporter: Arc<PeriodicExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn instrumenter(&self) -> &Instrumenter {
        &self.instrumenter
    }

    pub async fn get(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::GET, url, ctx, None).await
    }

    pub async fn head(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::HEAD, url, ctx, None).await
    }

    pub async fn delete(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::DELETE, url, ctx, None).await
    }

    pub async fn options(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::OPTIONS, url, ctx, None).await
    }

    pub async fn post(
        &self,
        url: &str,
        ctx: &RequestContext,
        body: impl Into<Vec<u8>>,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::POST, url, ctx, Some(body.into())).await
    }

    pub async fn put(
        &self,
        url: &str,
        ctx: &RequestContext,
        body: impl Into<Vec<u8>>,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::PUT, url, ctx, Some(body.into())).await
    }

    pub async fn patch(
        &self,
        url: &str,
        ctx: &RequestContext,
        body: impl Into<Vec<u8>>,
    ) -> Result<TracedResponse, ClientError> {
        self.send(Method::PATCH, url, ctx, Some(body.into())).await
    }

    /// Execute a traced request.
    ///
    /// Requests that fail after leaving the client are still recorded, with
    /// status `0`. Requests that could not be built are not.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        ctx: &RequestContext,
        body: Option<Vec<u8>>,
    ) -> Result<TracedResponse, ClientError> {
        let prepared = self.instrumenter.prepare()?;

        let mut request = self.http.request(method.clone(), url);
        for (name, value) in prepared.headers.iter() {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let started = Instant::now();
        let result = request.send().await;
        let elapsed = started.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(source) => {
                if !source.is_builder() {
                    let trace_id = &prepared.trace_id;
                    self.record(&method, url, ctx, STATUS_NO_RESPONSE, elapsed, trace_id);
                }
                return Err(ClientError::Request {
                    url: url.to_string(),
                    source,
                });
            }
        };

        let status = response.status().as_u16().to_string();
        self.record(&method, url, ctx, &status, elapsed, &prepared.trace_id);

        Ok(TracedResponse {
            response,
            trace_id: prepared.trace_id,
        })
    }

    fn record(
        &self,
        method: &Method,
        url: &str,
        ctx: &RequestContext,
        status: &str,
        elapsed: Duration,
        trace_id: &EncodedTraceId,
    ) {
        tracing::trace!(
            method = %method,
            url = %url,
            status = %status,
            trace_id = %trace_id.as_hex(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Traced request completed"
        );

        let Some(exporter) = &self.exporter else {
            return;
        };
        let trail = HttpTrail::new(SystemTime::now(), elapsed)
            .with_tag(TAG_METHOD, method.as_str())
            .with_tag(TAG_URL, url)
            .with_tag(TAG_STATUS, status)
            .with_tag(TAG_GROUP, ctx.group.as_str())
            .with_tag(TAG_SCENARIO, ctx.scenario.as_str())
            .with_metadata(META_TRACE_ID, trace_id.as_hex());
        exporter.add_samples(iter::once(trail.into()));
    }
}
