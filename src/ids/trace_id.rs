//! Structured 128-bit trace identifiers.
//!
//! Layout of the 16 encoded bytes:
//!
//! ```text
//! varint(prefix) | varint(code) | uvarint(timestamp_ms) | random padding
//! ```
//!
//! Signed fields use zig-zag varints, the timestamp a plain unsigned varint
//! (the same LEB128 encoding protobuf uses). The padding carries no meaning and
//! cannot be recovered.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use prost::encoding::{decode_varint, encode_varint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::random::RandomSource;

/// Length in bytes of an encoded trace id.
pub const TRACE_ID_LEN: usize = 16;

/// Marker identifying ids minted by this tool (octal 756).
pub const RESERVED_PREFIX: i16 = 0o756;

/// Spans belonging to runs whose telemetry is ingested remotely.
pub const CLOUD_CODE: i8 = 12;

/// Spans belonging to local runs, not ingested.
pub const LOCAL_CODE: i8 = 33;

/// Errors produced while encoding or decoding trace ids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceIdError {
    /// The id does not carry the reserved prefix and a recognised code.
    #[error("invalid trace id: prefix {prefix}, code {code}")]
    Invalid { prefix: i16, code: i8 },

    /// The bytes or hex string cannot be decoded.
    #[error("malformed trace id: {0}")]
    Malformed(String),
}

/// The kind of run a trace id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceCode {
    #[default]
    Cloud,
    Local,
}

impl TraceCode {
    /// Wire value of the code.
    pub fn as_raw(self) -> i8 {
        match self {
            TraceCode::Cloud => CLOUD_CODE,
            TraceCode::Local => LOCAL_CODE,
        }
    }

    /// Map a raw code back to a known kind.
    pub fn from_raw(raw: i8) -> Option<Self> {
        match raw {
            CLOUD_CODE => Some(TraceCode::Cloud),
            LOCAL_CODE => Some(TraceCode::Local),
            _ => None,
        }
    }
}

/// A structured trace identifier. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId {
    prefix: i16,
    code: i8,
    timestamp_ms: u64,
}

impl TraceId {
    /// Build an id from raw parts. The result may be invalid.
    pub fn from_parts(prefix: i16, code: i8, timestamp_ms: u64) -> Self {
        Self {
            prefix,
            code,
            timestamp_ms,
        }
    }

    /// Build a valid id for `code` at `timestamp_ms`.
    pub fn new(code: TraceCode, timestamp_ms: u64) -> Self {
        Self::from_parts(RESERVED_PREFIX, code.as_raw(), timestamp_ms)
    }

    /// Build a valid id for `code` stamped with the current wall clock.
    pub fn now(code: TraceCode) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::new(code, timestamp_ms)
    }

    pub fn prefix(&self) -> i16 {
        self.prefix
    }

    pub fn code(&self) -> i8 {
        self.code
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// The recognised kind of this id, if any.
    pub fn kind(&self) -> Option<TraceCode> {
        TraceCode::from_raw(self.code)
    }

    /// True iff the prefix is reserved and the code is Cloud or Local.
    pub fn is_valid(&self) -> bool {
        self.prefix == RESERVED_PREFIX && self.kind().is_some()
    }

    /// True iff the id is valid and marked for remote ingestion.
    pub fn is_valid_cloud(&self) -> bool {
        self.prefix == RESERVED_PREFIX && self.code == CLOUD_CODE
    }

    /// Encode into 16 bytes, padding with bytes drawn from `random`.
    pub fn encode(&self, random: &dyn RandomSource) -> Result<EncodedTraceId, TraceIdError> {
        if !self.is_valid() {
            return Err(TraceIdError::Invalid {
                prefix: self.prefix,
                code: self.code,
            });
        }

        let mut raw = [0u8; TRACE_ID_LEN];
        let written = {
            let mut cursor: &mut [u8] = &mut raw[..];
            encode_varint(zigzag(i64::from(self.prefix)), &mut cursor);
            encode_varint(zigzag(i64::from(self.code)), &mut cursor);
            encode_varint(self.timestamp_ms, &mut cursor);
            TRACE_ID_LEN - cursor.len()
        };
        random.fill(&mut raw[written..]);

        Ok(EncodedTraceId::from_bytes(raw))
    }

    /// Decode the structured fields from a 16-byte buffer.
    pub fn decode(raw: &[u8]) -> Result<Self, TraceIdError> {
        if raw.len() != TRACE_ID_LEN {
            return Err(TraceIdError::Malformed(format!(
                "expected {} bytes, got {}",
                TRACE_ID_LEN,
                raw.len()
            )));
        }

        let mut cursor = raw;
        let prefix = read_field(&mut cursor, "prefix").map(unzigzag)?;
        let code = read_field(&mut cursor, "code").map(unzigzag)?;
        let timestamp_ms = read_field(&mut cursor, "timestamp")?;

        let prefix = i16::try_from(prefix)
            .map_err(|_| TraceIdError::Malformed(format!("prefix {} out of range", prefix)))?;
        let code = i8::try_from(code)
            .map_err(|_| TraceIdError::Malformed(format!("code {} out of range", code)))?;

        Ok(Self::from_parts(prefix, code, timestamp_ms))
    }

    /// Decode from the 32-character hex rendering.
    pub fn decode_hex(hex_id: &str) -> Result<Self, TraceIdError> {
        EncodedTraceId::from_hex(hex_id)?.decode()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prefix={} code={} timestamp_ms={}",
            self.prefix, self.code, self.timestamp_ms
        )
    }
}

fn read_field(cursor: &mut &[u8], field: &str) -> Result<u64, TraceIdError> {
    decode_varint(cursor).map_err(|e| TraceIdError::Malformed(format!("{}: {}", field, e)))
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// The 16 raw bytes of a trace id together with their hex rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedTraceId {
    raw: [u8; TRACE_ID_LEN],
    hex: String,
}

impl EncodedTraceId {
    pub fn from_bytes(raw: [u8; TRACE_ID_LEN]) -> Self {
        Self {
            raw,
            hex: hex::encode(raw),
        }
    }

    /// Parse a 32-character hex string.
    pub fn from_hex(hex_id: &str) -> Result<Self, TraceIdError> {
        let bytes = hex::decode(hex_id).map_err(|e| TraceIdError::Malformed(e.to_string()))?;
        let raw: [u8; TRACE_ID_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            TraceIdError::Malformed(format!("expected {} bytes, got {}", TRACE_ID_LEN, b.len()))
        })?;
        Ok(Self::from_bytes(raw))
    }

    pub fn as_bytes(&self) -> &[u8; TRACE_ID_LEN] {
        &self.raw
    }

    /// Lowercase hex, always 32 characters.
    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn into_hex(self) -> String {
        self.hex
    }

    pub fn decode(&self) -> Result<TraceId, TraceIdError> {
        TraceId::decode(&self.raw)
    }
}

impl fmt::Display for EncodedTraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}
