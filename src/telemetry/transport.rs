//! Upload of encoded batches to the collector.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::telemetry::types::{ExportError, ExportResult};

/// Header naming the tenant for scope-based collectors.
pub const HEADER_SCOPE_ORG_ID: &str = "X-Scope-OrgID";

/// An encoded batch ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// Delivery of payloads to a collector.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one payload. Success means the collector accepted it.
    async fn send(&self, payload: Payload) -> ExportResult<()>;
}

/// How uploads authenticate against the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `X-Scope-OrgID` plus a bearer token.
    #[default]
    ScopeOrgId,
    /// Basic auth with the org id as user and the token as password.
    Basic,
}

/// reqwest-backed transport posting to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    org_id: i64,
    token: String,
    auth: AuthMode,
}

impl HttpTransport {
    /// Create a transport whose uploads time out after `timeout`.
    pub fn new(
        endpoint: Url,
        org_id: i64,
        token: impl Into<String>,
        auth: AuthMode,
        timeout: Duration,
    ) -> ExportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            org_id,
            token: token.into(),
            auth,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, payload: Payload) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static(payload.content_type))
            .body(payload.body);

        match self.auth {
            AuthMode::ScopeOrgId => request
                .header(HEADER_SCOPE_ORG_ID, self.org_id.to_string())
                .bearer_auth(&self.token),
            AuthMode::Basic => request.basic_auth(self.org_id, Some(&self.token)),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: Payload) -> ExportResult<()> {
        let response = self
            .request(payload)
            .send()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
