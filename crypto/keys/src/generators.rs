// Copyright (c) 2024 The Umbra Project Developers

//! The fixed generator set: `G` (blinding), `H` (value), `J` (switch).
//!
//! `H` and `J` are nothing-up-my-sleeve points derived by hashing fixed
//! domain tags to the curve, the same construction the per-asset generators
//! use at runtime.

use blake2::{digest::Digest, Blake2b512};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint,
};
use lazy_static::lazy_static;

/// Derive a curve point from a domain tag by uniform hashing.
pub fn hash_to_point(tag: &[u8]) -> RistrettoPoint {
    let mut hasher = Blake2b512::new();
    hasher.update(b"umbra.generator");
    hasher.update(tag);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    RistrettoPoint::from_uniform_bytes(&wide)
}

lazy_static! {
    /// The blinding generator. Commitments blind with `sk * G`.
    pub static ref GEN_G: RistrettoPoint = RISTRETTO_BASEPOINT_POINT;

    /// The default value generator. Amounts commit as `value * H`.
    pub static ref GEN_H: RistrettoPoint = hash_to_point(b"H");

    /// The switch generator, binding blinding factors to commitments.
    pub static ref GEN_J: RistrettoPoint = hash_to_point(b"J");
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::traits::IsIdentity;

    #[test]
    fn generators_distinct() {
        assert_ne!(*GEN_G, *GEN_H);
        assert_ne!(*GEN_G, *GEN_J);
        assert_ne!(*GEN_H, *GEN_J);
        assert!(!GEN_H.is_identity());
        assert!(!GEN_J.is_identity());
    }

    #[test]
    fn hash_to_point_is_tag_sensitive() {
        assert_ne!(hash_to_point(b"a"), hash_to_point(b"b"));
    }
}
