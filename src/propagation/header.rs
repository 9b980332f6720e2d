//! Scheme-specific header synthesis.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::RandomSource;

/// W3C Trace Context header.
pub const HEADER_W3C: &str = "traceparent";
/// Zipkin B3 single header.
pub const HEADER_B3: &str = "b3";
/// Jaeger native header.
pub const HEADER_JAEGER: &str = "uber-trace-id";

/// Number of hex characters in a generated span id.
pub const SPAN_ID_LEN: usize = 8;

const HEX_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Errors from header construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropagationError {
    #[error("unsupported propagation scheme: {0}")]
    UnsupportedScheme(String),
}

/// Supported propagation schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Propagator {
    #[default]
    W3c,
    B3,
    Jaeger,
}

impl Propagator {
    /// Scheme name as used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Propagator::W3c => "w3c",
            Propagator::B3 => "b3",
            Propagator::Jaeger => "jaeger",
        }
    }

    /// Header carrying the trace context for this scheme.
    pub fn header_name(self) -> &'static str {
        match self {
            Propagator::W3c => HEADER_W3C,
            Propagator::B3 => HEADER_B3,
            Propagator::Jaeger => HEADER_JAEGER,
        }
    }

    fn format_value(self, trace_id: &str, span_id: &str) -> String {
        match self {
            // https://www.w3.org/TR/trace-context/#traceparent-header
            Propagator::W3c => format!("00-{}-{}-01", trace_id, span_id),
            // https://github.com/openzipkin/b3-propagation#single-header
            Propagator::B3 => format!("{}-{}-1", trace_id, span_id),
            Propagator::Jaeger => format!("{}-{}:0:1", trace_id, span_id),
        }
    }
}

impl FromStr for Propagator {
    type Err = PropagationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w3c" => Ok(Propagator::W3c),
            "b3" => Ok(Propagator::B3),
            "jaeger" => Ok(Propagator::Jaeger),
            other => Err(PropagationError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header name → ordered values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationHeader {
    entries: BTreeMap<String, Vec<String>>,
}

impl PropagationHeader {
    fn single(name: &str, value: String) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(name.to_string(), vec![value]);
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (name, value) pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }
}

/// Draw a span id one hex digit at a time from `random`.
pub fn random_span_id(random: &dyn RandomSource) -> String {
    let mut bytes = [0u8; SPAN_ID_LEN];
    random.fill(&mut bytes);
    bytes
        .iter()
        .map(|b| HEX_ALPHABET[(b & 0x0f) as usize] as char)
        .collect()
}

/// Build the propagation header for `propagator` around `trace_id_hex`.
pub fn build_header(
    propagator: Propagator,
    trace_id_hex: &str,
    random: &dyn RandomSource,
) -> PropagationHeader {
    let span_id = random_span_id(random);
    PropagationHeader::single(
        propagator.header_name(),
        propagator.format_value(trace_id_hex, &span_id),
    )
}

/// Build a header from a scheme name, failing on unknown schemes.
pub fn build_header_for(
    scheme: &str,
    trace_id_hex: &str,
    random: &dyn RandomSource,
) -> Result<PropagationHeader, PropagationError> {
    let propagator = scheme.parse::<Propagator>()?;
    Ok(build_header(propagator, trace_id_hex, random))
}
