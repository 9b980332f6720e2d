//! Samples handed to the exporter by the load engine.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tag carrying the request URL.
pub const TAG_URL: &str = "url";
/// Tag carrying the HTTP method.
pub const TAG_METHOD: &str = "method";
/// Tag carrying the response status code.
pub const TAG_STATUS: &str = "status";
/// Tag carrying the group the request ran in.
pub const TAG_GROUP: &str = "group";
/// Tag carrying the scenario the request ran in.
pub const TAG_SCENARIO: &str = "scenario";
/// Metadata key carrying the hex trace id.
pub const META_TRACE_ID: &str = "trace_id";

/// A sample produced by the load engine. Only HTTP trails are exported.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Http(HttpTrail),
    Metric(MetricPoint),
}

/// A generic metric value, ignored by the exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub time: SystemTime,
    pub tags: BTreeMap<String, String>,
}

/// Timing and routing data of one completed HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTrail {
    /// When the response finished.
    pub end_time: SystemTime,
    /// Time spent waiting for a free connection slot.
    pub blocked: Duration,
    /// Time spent establishing the connection.
    pub connecting: Duration,
    /// Time from sending the request to receiving the full response.
    pub duration: Duration,
    pub tags: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
}

impl HttpTrail {
    /// A trail ending at `end_time` that took `duration`, with no tags.
    pub fn new(end_time: SystemTime, duration: Duration) -> Self {
        Self {
            end_time,
            blocked: Duration::ZERO,
            connecting: Duration::ZERO,
            duration,
            tags: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.metadata.get(META_TRACE_ID).map(String::as_str)
    }

    /// End time minus blocked, connecting and transfer time.
    pub fn start_time(&self) -> SystemTime {
        let total = self.blocked + self.connecting + self.duration;
        self.end_time
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|since_epoch| since_epoch.checked_sub(total))
            .map_or(UNIX_EPOCH, |since_epoch| UNIX_EPOCH + since_epoch)
    }
}

impl From<HttpTrail> for Sample {
    fn from(trail: HttpTrail) -> Self {
        Sample::Http(trail)
    }
}

impl From<MetricPoint> for Sample {
    fn from(point: MetricPoint) -> Self {
        Sample::Metric(point)
    }
}

/// Nanoseconds since the Unix epoch, saturating at zero.
pub fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .try_into()
        .unwrap_or(u64::MAX)
}
