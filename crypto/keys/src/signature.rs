// Copyright (c) 2024 The Umbra Project Developers

//! Schnorr-style signatures over Ristretto.
//!
//! The single-key form signs kernel IDs; the dual form is the 2-key
//! aggregate used by asset emission (excess key + asset owner key) and by
//! shielded serial binding. Nonces are derived deterministically from the
//! secret and the message.

use blake2::{digest::Digest, Blake2b512};
use core::cmp::Ordering;
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::Identity,
};
use serde::{Deserialize, Serialize};

use crate::{
    generators::GEN_G,
    hash::{Absorb, Hash, Sink},
    import, Oracle,
};

fn derive_nonce(sk: &Scalar, msg: &Hash, domain: u8) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(b"umbra.sig.nonce");
    hasher.update([domain]);
    hasher.update(sk.to_bytes());
    hasher.update(msg.as_bytes());
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn challenge_oracle(nonce_pub: &CompressedRistretto, msg: &Hash) -> Oracle {
    Oracle::new()
        .chain("umbra.sig")
        .chain(nonce_pub)
        .chain(msg)
}

/// A single-key Schnorr signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// The public nonce `n * G`.
    pub nonce_pub: CompressedRistretto,
    /// The response scalar `n - e * sk`.
    pub k: Scalar,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            nonce_pub: CompressedRistretto::identity(),
            k: Scalar::ZERO,
        }
    }
}

impl Signature {
    /// Sign a message hash.
    pub fn sign(msg: &Hash, sk: &Scalar) -> Self {
        let nonce = derive_nonce(sk, msg, 1);
        let nonce_pub = (*GEN_G * nonce).compress();
        let e = challenge_oracle(&nonce_pub, msg).scalar();
        Self {
            nonce_pub,
            k: nonce - e * sk,
        }
    }

    /// Verify against a public key.
    pub fn is_valid(&self, msg: &Hash, pk: &RistrettoPoint) -> bool {
        let nonce_pub = match import(&self.nonce_pub) {
            Ok(pt) => pt,
            Err(_) => return false,
        };
        let e = challenge_oracle(&self.nonce_pub, msg).scalar();
        *GEN_G * self.k + pk * e == nonce_pub
    }

    /// Canonical byte ordering, for sorted containers.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.nonce_pub
            .as_bytes()
            .cmp(other.nonce_pub.as_bytes())
            .then_with(|| self.k.as_bytes().cmp(other.k.as_bytes()))
    }
}

impl Absorb for Signature {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.nonce_pub.absorb_to(sink);
        self.k.absorb_to(sink);
    }
}

/// A 2-key aggregated signature: one joint nonce, one response per key.
///
/// Challenges for the two keys are independent extractions from the same
/// transcript, so the signature proves knowledge of both secrets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DualSignature {
    /// The joint public nonce.
    pub nonce_pub: CompressedRistretto,
    /// Per-key response scalars.
    pub k: [Scalar; 2],
}

impl Default for DualSignature {
    fn default() -> Self {
        Self {
            nonce_pub: CompressedRistretto::identity(),
            k: [Scalar::ZERO; 2],
        }
    }
}

impl DualSignature {
    /// Sign a message hash with two secrets.
    pub fn sign(msg: &Hash, sks: [&Scalar; 2]) -> Self {
        let n0 = derive_nonce(sks[0], msg, 2);
        let n1 = derive_nonce(sks[1], msg, 3);
        let nonce_pub = (*GEN_G * (n0 + n1)).compress();
        let mut oracle = challenge_oracle(&nonce_pub, msg);
        let e0 = oracle.scalar();
        let e1 = oracle.scalar();
        Self {
            nonce_pub,
            k: [n0 - e0 * sks[0], n1 - e1 * sks[1]],
        }
    }

    /// Verify against two public keys.
    pub fn is_valid(&self, msg: &Hash, pks: [&RistrettoPoint; 2]) -> bool {
        let nonce_pub = match import(&self.nonce_pub) {
            Ok(pt) => pt,
            Err(_) => return false,
        };
        let mut oracle = challenge_oracle(&self.nonce_pub, msg);
        let e0 = oracle.scalar();
        let e1 = oracle.scalar();
        *GEN_G * (self.k[0] + self.k[1]) + pks[0] * e0 + pks[1] * e1 == nonce_pub
    }
}

impl Absorb for DualSignature {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.nonce_pub.absorb_to(sink);
        self.k[0].absorb_to(sink);
        self.k[1].absorb_to(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hasher;

    fn msg(tag: &str) -> Hash {
        Hasher::new().chain(tag).finalize()
    }

    #[test]
    fn sign_verify_roundtrip() {
        let sk = Scalar::from(42u64);
        let pk = *GEN_G * sk;
        let sig = Signature::sign(&msg("hello"), &sk);
        assert!(sig.is_valid(&msg("hello"), &pk));
    }

    #[test]
    fn wrong_message_rejected() {
        let sk = Scalar::from(42u64);
        let pk = *GEN_G * sk;
        let sig = Signature::sign(&msg("hello"), &sk);
        assert!(!sig.is_valid(&msg("other"), &pk));
    }

    #[test]
    fn wrong_key_rejected() {
        let sk = Scalar::from(42u64);
        let sig = Signature::sign(&msg("hello"), &sk);
        let pk2 = *GEN_G * Scalar::from(43u64);
        assert!(!sig.is_valid(&msg("hello"), &pk2));
    }

    #[test]
    fn dual_sign_verify_roundtrip() {
        let sk0 = Scalar::from(7u64);
        let sk1 = Scalar::from(11u64);
        let pk0 = *GEN_G * sk0;
        let pk1 = *GEN_G * sk1;
        let sig = DualSignature::sign(&msg("emit"), [&sk0, &sk1]);
        assert!(sig.is_valid(&msg("emit"), [&pk0, &pk1]));
    }

    #[test]
    fn dual_requires_both_keys() {
        let sk0 = Scalar::from(7u64);
        let sk1 = Scalar::from(11u64);
        let pk0 = *GEN_G * sk0;
        let pk1 = *GEN_G * sk1;
        let sig = DualSignature::sign(&msg("emit"), [&sk0, &sk1]);
        // Swapped keys must not verify.
        assert!(!sig.is_valid(&msg("emit"), [&pk1, &pk0]));
    }

    #[test]
    fn tampered_response_rejected() {
        let sk = Scalar::from(42u64);
        let pk = *GEN_G * sk;
        let mut sig = Signature::sign(&msg("hello"), &sk);
        sig.k += Scalar::ONE;
        assert!(!sig.is_valid(&msg("hello"), &pk));
    }
}
