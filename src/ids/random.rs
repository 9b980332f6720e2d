//! Injectable random byte sources.

use rand::rngs::OsRng;
use rand::RngCore;

/// A source of random bytes shared by concurrent callers.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]);
}

/// Operating-system entropy. Used for trace id padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Fast non-cryptographic generator, thread-local per caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastRandom;

impl RandomSource for FastRandom {
    fn fill(&self, dest: &mut [u8]) {
        fastrand::fill(dest);
    }
}

/// Deterministic source that repeats a fixed pattern.
///
/// Every call starts again from the beginning of the pattern, so two calls
/// with the same destination length always produce the same bytes.
#[derive(Debug, Clone)]
pub struct FixedSource {
    pattern: Vec<u8>,
}

impl FixedSource {
    /// Create a source repeating `pattern`. An empty pattern yields zeros.
    pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl RandomSource for FixedSource {
    fn fill(&self, dest: &mut [u8]) {
        if self.pattern.is_empty() {
            dest.fill(0);
            return;
        }
        for (slot, byte) in dest.iter_mut().zip(self.pattern.iter().cycle()) {
            *slot = *byte;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_source_cycles_pattern() {
        let source = FixedSource::new(*b"some");
        let mut buf = [0u8; 7];
        source.fill(&mut buf);
        assert_eq!(&buf, b"somesom");

        // Restarts on every call
        let mut again = [0u8; 3];
        source.fill(&mut again);
        assert_eq!(&again, b"som");
    }

    #[test]
    fn test_fixed_source_empty_pattern() {
        let source = FixedSource::new(Vec::new());
        let mut buf = [0xffu8; 4];
        source.fill(&mut buf);
        assert_eq!(buf, [0, 0, 0, 0]);
    }

    #[test]
    fn test_os_random_fills() {
        // Two 32-byte draws colliding is not a realistic outcome
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        OsRandom.fill(&mut a);
        OsRandom.fill(&mut b);
        assert_ne!(a, b);
    }
}
