// Copyright (c) 2024 The Umbra Project Developers

//! Domain-separated Fiat–Shamir transcript.

use blake2::digest::Digest;
use curve25519_dalek::scalar::Scalar;

use crate::hash::{wide_scalar, Absorb, Blake2b256, Hash, Sink};

/// A transcript oracle: absorb values, squeeze challenges.
///
/// Squeezing ratchets the state, so successive extractions after the same
/// absorptions yield an unbounded stream of independent challenges. The
/// absorb encoding is the canonical one from [`Absorb`]; the exact sequence
/// of absorptions is consensus-critical for every use site.
#[derive(Clone)]
pub struct Oracle {
    state: Blake2b256,
    counter: u64,
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for Oracle {
    fn write(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
    }
}

impl Oracle {
    /// Start a fresh oracle.
    pub fn new() -> Self {
        let mut state = Blake2b256::new();
        state.update(b"umbra.oracle");
        Self { state, counter: 0 }
    }

    /// Absorb a value in place.
    pub fn absorb<T: Absorb + ?Sized>(&mut self, v: &T) {
        v.absorb_to(self);
    }

    /// Absorb a value, chaining.
    pub fn chain<T: Absorb + ?Sized>(mut self, v: &T) -> Self {
        self.absorb(v);
        self
    }

    /// Squeeze a hash challenge and ratchet the state.
    pub fn squeeze(&mut self) -> Hash {
        let out: [u8; 32] = self.state.clone().finalize().into();
        self.counter += 1;
        self.state.update(self.counter.to_le_bytes());
        self.state.update(out);
        Hash(out)
    }

    /// Squeeze a scalar challenge (64 uniform bytes, wide reduction).
    pub fn scalar(&mut self) -> Scalar {
        let a = self.squeeze();
        let b = self.squeeze();
        wide_scalar(&a, &b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_ratchets() {
        let mut o = Oracle::new().chain("test");
        let a = o.squeeze();
        let b = o.squeeze();
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_for_equal_transcripts() {
        let mut a = Oracle::new().chain(&42u64).chain("tag");
        let mut b = Oracle::new().chain(&42u64).chain("tag");
        assert_eq!(a.squeeze(), b.squeeze());
        assert_eq!(a.scalar(), b.scalar());
    }

    #[test]
    fn absorption_changes_challenges() {
        let mut a = Oracle::new().chain(&1u64);
        let mut b = Oracle::new().chain(&2u64);
        assert_ne!(a.scalar(), b.scalar());
    }
}
