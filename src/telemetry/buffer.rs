//! Shared sample buffer.

use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::telemetry::sample::{HttpTrail, Sample};

/// Accumulates HTTP trails from many producers until the next flush.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    trails: Mutex<Vec<HttpTrail>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the HTTP trails among `samples`, discarding everything else.
    ///
    /// Returns the number of trails accepted.
    pub fn add(&self, samples: impl IntoIterator<Item = Sample>) -> usize {
        let accepted: Vec<HttpTrail> = samples
            .into_iter()
            .filter_map(|sample| match sample {
                Sample::Http(trail) => Some(trail),
                Sample::Metric(_) => None,
            })
            .collect();

        if accepted.is_empty() {
            return 0;
        }

        let count = accepted.len();
        self.lock().extend(accepted);
        count
    }

    /// Take everything buffered so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<HttpTrail> {
        mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HttpTrail>> {
        // Critical sections never panic midway, the data is still consistent
        self.trails.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sample::MetricPoint;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    fn trail(url: &str) -> Sample {
        HttpTrail::new(SystemTime::now(), Duration::from_millis(5))
            .with_tag("url", url)
            .into()
    }

    fn metric() -> Sample {
        MetricPoint {
            name: "vus".into(),
            value: 1.0,
            time: SystemTime::now(),
            tags: BTreeMap::new(),
        }
        .into()
    }

    #[test]
    fn test_empty_add_is_noop() {
        let buffer = SampleBuffer::new();
        assert_eq!(buffer.add(Vec::new()), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_non_http_samples_discarded() {
        let buffer = SampleBuffer::new();
        let accepted = buffer.add(vec![metric(), trail("/a"), metric()]);
        assert_eq!(accepted, 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let buffer = SampleBuffer::new();
        buffer.add(vec![trail("/a"), trail("/b")]);
        buffer.add(vec![trail("/c")]);

        let drained = buffer.drain();
        let urls: Vec<_> = drained.iter().map(|t| t.tag("url").unwrap()).collect();
        assert_eq!(urls, vec!["/a", "/b", "/c"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_concurrent_producers() {
        let buffer = Arc::new(SampleBuffer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        buffer.add(vec![trail("/x")]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.drain().len(), 2000);
    }
}
