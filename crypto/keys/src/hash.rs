// Copyright (c) 2024 The Umbra Project Developers

//! 32-byte hash values and the canonical absorb encoding.

use blake2::{
    digest::{consts::U32, Digest},
    Blake2b,
};
use core::fmt;
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use serde::{Deserialize, Serialize};

pub(crate) type Blake2b256 = Blake2b<U32>;

/// A 32-byte hash value.
#[derive(
    Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// View the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<[u8; 32]> for Hash {
    fn from(src: [u8; 32]) -> Self {
        Self(src)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A byte sink absorbing canonical encodings.
pub trait Sink {
    /// Feed raw bytes into the sink.
    fn write(&mut self, bytes: &[u8]);
}

/// Canonical consensus encoding of a value into a [`Sink`].
///
/// Fixed-width integers are absorbed little-endian; variable-length byte
/// strings are length-prefixed. Everything hashed by the ledger goes through
/// this trait, so the encoding doubles as the contract the serialization
/// adapter has to honor for hashed fields.
pub trait Absorb {
    /// Write the canonical encoding of `self` into `sink`.
    fn absorb_to(&self, sink: &mut dyn Sink);
}

impl Absorb for u8 {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&[*self]);
    }
}

impl Absorb for bool {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&[*self as u8]);
    }
}

impl Absorb for u32 {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.to_le_bytes());
    }
}

impl Absorb for u64 {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.to_le_bytes());
    }
}

impl Absorb for u128 {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.to_le_bytes());
    }
}

impl Absorb for i64 {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.to_le_bytes());
    }
}

impl Absorb for [u8] {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        (self.len() as u64).absorb_to(sink);
        sink.write(self);
    }
}

impl Absorb for str {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.as_bytes().absorb_to(sink);
    }
}

impl Absorb for Hash {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.0);
    }
}

impl Absorb for Scalar {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.to_bytes());
    }
}

impl Absorb for CompressedRistretto {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(self.as_bytes());
    }
}

impl Absorb for RistrettoPoint {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(self.compress().as_bytes());
    }
}

impl<T: Absorb + ?Sized> Absorb for &T {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        (**self).absorb_to(sink);
    }
}

/// Streaming hash processor producing a [`Hash`].
#[derive(Clone)]
pub struct Hasher {
    state: Blake2b256,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for Hasher {
    fn write(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
    }
}

impl Hasher {
    /// Start a fresh processor.
    pub fn new() -> Self {
        Self {
            state: Blake2b256::new(),
        }
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

    /// Finish and produce the hash value.
    pub fn finalize(self) -> Hash {
        Hash(self.state.finalize().into())
    }
}

/// Reduce 64 uniform bytes to a scalar.
pub(crate) fn wide_scalar(a: &Hash, b: &Hash) -> Scalar {
    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&a.0);
    wide[32..].copy_from_slice(&b.0);
    Scalar::from_bytes_mod_order_wide(&wide)
}
