//! Exported record and batch types.
//!
//! The protobuf field numbers below are part of the collector contract and
//! must not be renumbered.

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::telemetry::types::{ExportError, ExportResult};

/// One completed request as sent to the collector.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryRecord {
    #[prost(int64, tag = "1")]
    pub test_run_id: i64,
    #[prost(uint64, tag = "2")]
    pub start_time_unix_nano: u64,
    #[prost(uint64, tag = "3")]
    pub end_time_unix_nano: u64,
    #[prost(string, tag = "4")]
    pub group: String,
    #[prost(string, tag = "5")]
    pub scenario: String,
    /// 32-character lowercase hex.
    #[prost(string, tag = "6")]
    pub trace_id: String,
    #[prost(string, tag = "7")]
    pub http_url: String,
    #[prost(string, tag = "8")]
    pub http_method: String,
    #[prost(int64, tag = "9")]
    pub http_status: i64,
}

/// The records of one export cycle.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<TelemetryRecord>,
    #[prost(int64, tag = "2")]
    pub count: i64,
    /// Payload length of the batch encoded without this field.
    #[prost(int64, tag = "3")]
    pub size_bytes: i64,
}

impl Batch {
    pub fn new(records: Vec<TelemetryRecord>) -> Self {
        Self {
            count: records.len() as i64,
            records,
            size_bytes: 0,
        }
    }

    /// Fill in `size_bytes` and return the final payload.
    pub fn seal(mut self, format: WireFormat) -> ExportResult<(Self, Vec<u8>)> {
        self.size_bytes = 0;
        self.size_bytes = format.encode(&self)?.len() as i64;
        let body = format.encode(&self)?;
        Ok((self, body))
    }
}

/// Encoding used for upload bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Protobuf,
    Json,
}

impl WireFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Protobuf => "application/x-protobuf",
            WireFormat::Json => "application/json",
        }
    }

    pub fn encode(self, batch: &Batch) -> ExportResult<Vec<u8>> {
        match self {
            WireFormat::Protobuf => {
                let mut buf = Vec::with_capacity(batch.encoded_len());
                batch
                    .encode(&mut buf)
                    .map_err(|e| ExportError::Serialization(e.to_string()))?;
                Ok(buf)
            }
            WireFormat::Json => {
                serde_json::to_vec(batch).map_err(|e| ExportError::Serialization(e.to_string()))
            }
        }
    }

    pub fn decode(self, body: &[u8]) -> ExportResult<Batch> {
        match self {
            WireFormat::Protobuf => {
                Batch::decode(body).map_err(|e| ExportError::Serialization(e.to_string()))
            }
            WireFormat::Json => {
                serde_json::from_slice(body).map_err(|e| ExportError::Serialization(e.to_string()))
            }
        }
    }
}
