//! Shared helpers for integration tests: wiremock collectors and targets,
//! settings and sample builders.

#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use loadtrace::config::ExportSettings;
use loadtrace::telemetry::sample::{
    META_TRACE_ID, TAG_GROUP, TAG_METHOD, TAG_SCENARIO, TAG_STATUS, TAG_URL,
};
use loadtrace::telemetry::{AuthMode, HttpTrail, Sample, WireFormat};

pub const INGEST_PATH: &str = "/v1/traces";
pub const ORG_ID: i64 = 123;
pub const TOKEN: &str = "secret";
pub const TRACE: &str = "dc0718c0a78e9bb52f736f6d65736f6d";

/// Start a collector answering every upload with `status`.
pub async fn start_collector(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// Start a target answering GET requests on `route` with `status`.
pub async fn start_target(route: &str, status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string("ok"))
        .mount(&server)
        .await;
    server
}

pub fn ingest_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{}", server.uri(), INGEST_PATH)).unwrap()
}

pub fn settings(server: &MockServer, auth: AuthMode, format: WireFormat) -> ExportSettings {
    ExportSettings {
        endpoint: ingest_url(server),
        push_interval: Duration::from_millis(100),
        org_id: ORG_ID,
        token: TOKEN.to_string(),
        auth,
        format,
        upload_timeout: Duration::from_secs(5),
        test_run_id: 4242,
    }
}

/// A completed, traced request to `url`.
pub fn traced(url: &str, status: u16) -> Sample {
    HttpTrail::new(
        UNIX_EPOCH + Duration::from_secs(1_629_191_640),
        Duration::from_millis(120),
    )
    .with_tag(TAG_URL, url)
    .with_tag(TAG_METHOD, "GET")
    .with_tag(TAG_STATUS, status.to_string())
    .with_tag(TAG_GROUP, "::login")
    .with_tag(TAG_SCENARIO, "default")
    .with_metadata(META_TRACE_ID, TRACE)
    .into()
}

/// Requests received on the ingest path so far.
pub async fn uploads(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == INGEST_PATH)
        .collect()
}

/// Poll until at least `count` uploads arrived, panicking after 5 seconds.
pub async fn wait_for_uploads(server: &MockServer, count: usize) -> Vec<Request> {
    let deadline = SystemTime::now() + Duration::from_secs(5);
    loop {
        let received = uploads(server).await;
        if received.len() >= count {
            return received;
        }
        assert!(
            SystemTime::now() < deadline,
            "expected {} uploads, got {}",
            count,
            received.len()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}
