//! Per-request trace id and header minting.

use std::sync::Arc;

use crate::ids::{
    EncodedTraceId, FastRandom, OsRandom, RandomSource, TraceCode, TraceId, TraceIdError,
};
use crate::propagation::{build_header, PropagationHeader, Propagator};

/// Trace id and header for one outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTrace {
    pub trace_id: EncodedTraceId,
    pub headers: PropagationHeader,
}

/// Mints a fresh trace id and propagation header per call.
#[derive(Clone)]
pub struct Instrumenter {
    code: TraceCode,
    propagator: Propagator,
    id_random: Arc<dyn RandomSource>,
    span_random: Arc<dyn RandomSource>,
}

impl Instrumenter {
    pub fn new(code: TraceCode, propagator: Propagator) -> Self {
        Self {
            code,
            propagator,
            id_random: Arc::new(OsRandom),
            span_random: Arc::new(FastRandom),
        }
    }

    /// Replace the random sources used for id padding and span ids.
    pub fn with_random(
        mut self,
        id_random: Arc<dyn RandomSource>,
        span_random: Arc<dyn RandomSource>,
    ) -> Self {
        self.id_random = id_random;
        self.span_random = span_random;
        self
    }

    pub fn code(&self) -> TraceCode {
        self.code
    }

    pub fn propagator(&self) -> Propagator {
        self.propagator
    }

    /// Mint an id stamped with the current wall clock.
    pub fn prepare(&self) -> Result<PreparedTrace, TraceIdError> {
        self.prepare_id(TraceId::now(self.code))
    }

    /// Like [`prepare`](Self::prepare) with an explicit timestamp.
    pub fn prepare_at(&self, timestamp_ms: u64) -> Result<PreparedTrace, TraceIdError> {
        self.prepare_id(TraceId::new(self.code, timestamp_ms))
    }

    fn prepare_id(&self, id: TraceId) -> Result<PreparedTrace, TraceIdError> {
        let trace_id = id.encode(self.id_random.as_ref())?;
        let headers = build_header(self.propagator, trace_id.as_hex(), self.span_random.as_ref());
        Ok(PreparedTrace { trace_id, headers })
    }
}

impl std::fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumenter")
            .field("code", &self.code)
            .field("propagator", &self.propagator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FixedSource;
    use crate::propagation::HEADER_W3C;

    fn fixed(propagator: Propagator) -> Instrumenter {
        Instrumenter::new(TraceCode::Cloud, propagator).with_random(
            Arc::new(FixedSource::new(*b"some")),
            Arc::new(FixedSource::new([0x01u8, 0x2a])),
        )
    }

    #[test]
    fn test_prepare_at_is_deterministic() {
        let prepared = fixed(Propagator::W3c).prepare_at(1_629_191_640_000).unwrap();
        assert_eq!(prepared.trace_id.as_hex(), "dc0718c0a78e9bb52f736f6d65736f6d");
        assert_eq!(
            prepared.headers.get(HEADER_W3C).unwrap(),
            ["00-dc0718c0a78e9bb52f736f6d65736f6d-1a1a1a1a-01"]
        );
    }

    #[test]
    fn test_prepared_id_decodes_back() {
        let instrumenter = Instrumenter::new(TraceCode::Local, Propagator::B3);
        let before = TraceId::now(TraceCode::Local).timestamp_ms();
        let prepared = instrumenter.prepare().unwrap();
        let after = TraceId::now(TraceCode::Local).timestamp_ms();
        let id = prepared.trace_id.decode().unwrap();
        assert!((before..=after).contains(&id.timestamp_ms()));
        assert_eq!(id.kind(), Some(TraceCode::Local));
        assert!(id.is_valid());
        assert!(!id.is_valid_cloud());
        assert_eq!(prepared.headers.len(), 1);
    }
}
