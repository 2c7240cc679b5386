// Copyright (c) 2024 The Umbra Project Developers

//! Hierarchical key derivation.
//!
//! An [`HKdf`] holds a nonce secret shared with its public half and a
//! cofactor scalar that stays private. Scalars derive as
//! `nonce(hv) * cofactor`, so the public half can reproduce `sk * G` and
//! `sk * J` without learning `sk`. This is what makes commitment recovery
//! possible from watch-only key material.

use blake2::{digest::Digest, Blake2b512};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use hkdf::Hkdf;
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    generators::{GEN_G, GEN_J},
    hash::{Hash, Hasher},
    key_id::{KeyIdValue, SCHEME_BB21},
};

/// Secret-side key derivation.
pub trait Kdf {
    /// Derive a blinding scalar from an identifier hash.
    fn derive_scalar(&self, hv: &Hash) -> Scalar;
}

/// Public-side key derivation: everything recovery needs.
pub trait PublicKdf {
    /// `derive_scalar(hv) * G` without knowledge of the scalar.
    fn derive_pkey_g(&self, hv: &Hash) -> RistrettoPoint;
    /// `derive_scalar(hv) * J` without knowledge of the scalar.
    fn derive_pkey_j(&self, hv: &Hash) -> RistrettoPoint;
    /// Derive a tag scalar (seed material, not a curve secret).
    fn derive_tag(&self, hv: &Hash) -> Scalar;
}

fn nonce_scalar(secret: &[u8; 32], hv: &Hash) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(b"umbra.kdf.nonce");
    hasher.update(secret);
    hasher.update(hv.as_bytes());
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// A hierarchical KDF instance.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HKdf {
    generator_secret: [u8; 32],
    cofactor: Scalar,
}

impl HKdf {
    /// Expand a seed into a KDF instance.
    pub fn from_seed(seed: &[u8]) -> Self {
        let hk = Hkdf::<Sha512>::new(Some(b"umbra.kdf"), seed);
        let mut okm = [0u8; 96];
        hk.expand(b"master", &mut okm)
            .expect("96 bytes is a valid hkdf-sha512 output length");

        let mut generator_secret = [0u8; 32];
        generator_secret.copy_from_slice(&okm[..32]);
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&okm[32..]);
        let cofactor = Scalar::from_bytes_mod_order_wide(&wide);
        okm.zeroize();
        wide.zeroize();

        Self {
            generator_secret,
            cofactor,
        }
    }

    /// Derive the child KDF for a subkey index.
    pub fn create_child(&self, index: u32) -> Self {
        let hv = Hasher::new()
            .chain("umbra.kdf.child")
            .chain(&self.generator_secret[..])
            .chain(&self.cofactor)
            .chain(&index)
            .finalize();
        Self::from_seed(hv.as_bytes())
    }

    /// Resolve the KDF an identifier derives under: subkey 0 and the BB21
    /// compatibility scheme stay on the master, everything else gets a child.
    pub fn for_key_id(&self, kidv: &KeyIdValue) -> HKdf {
        let sub_key = kidv.id.sub_key();
        if sub_key == 0 || kidv.id.scheme() == SCHEME_BB21 {
            self.clone()
        } else {
            self.create_child(sub_key)
        }
    }

    /// The public half.
    pub fn public(&self) -> HKdfPub {
        HKdfPub {
            generator_secret: self.generator_secret,
            pk_g: *GEN_G * self.cofactor,
            pk_j: *GEN_J * self.cofactor,
        }
    }
}

impl Kdf for HKdf {
    fn derive_scalar(&self, hv: &Hash) -> Scalar {
        nonce_scalar(&self.generator_secret, hv) * self.cofactor
    }
}

/// The public (watch-only) half of an [`HKdf`].
#[derive(Clone)]
pub struct HKdfPub {
    generator_secret: [u8; 32],
    pk_g: RistrettoPoint,
    pk_j: RistrettoPoint,
}

impl PublicKdf for HKdfPub {
    fn derive_pkey_g(&self, hv: &Hash) -> RistrettoPoint {
        self.pk_g * nonce_scalar(&self.generator_secret, hv)
    }

    fn derive_pkey_j(&self, hv: &Hash) -> RistrettoPoint {
        self.pk_j * nonce_scalar(&self.generator_secret, hv)
    }

    fn derive_tag(&self, hv: &Hash) -> Scalar {
        nonce_scalar(&self.generator_secret, hv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_id::{KeyIdValue, KeyKind};

    fn test_kdf() -> HKdf {
        HKdf::from_seed(b"test vectors are not secrets")
    }

    #[test]
    fn public_half_tracks_secret_derivation() {
        let kdf = test_kdf();
        let pkdf = kdf.public();
        let hv = Hasher::new().chain("probe").finalize();

        let sk = kdf.derive_scalar(&hv);
        assert_eq!(pkdf.derive_pkey_g(&hv), *GEN_G * sk);
        assert_eq!(pkdf.derive_pkey_j(&hv), *GEN_J * sk);
    }

    #[test]
    fn children_diverge() {
        let kdf = test_kdf();
        let hv = Hasher::new().chain("probe").finalize();
        let a = kdf.create_child(1).derive_scalar(&hv);
        let b = kdf.create_child(2).derive_scalar(&hv);
        assert_ne!(a, b);
        assert_ne!(a, kdf.derive_scalar(&hv));
    }

    #[test]
    fn subkey_zero_stays_on_master() {
        let kdf = test_kdf();
        let kidv = KeyIdValue::new(5, 1, KeyKind::REGULAR, 0);
        let hv = kidv.hash();
        assert_eq!(
            kdf.for_key_id(&kidv).derive_scalar(&hv),
            kdf.derive_scalar(&hv)
        );
    }

    #[test]
    fn bb21_stays_on_master() {
        let kdf = test_kdf();
        let mut kidv = KeyIdValue::new(5, 1, KeyKind::REGULAR, 9);
        kidv.id.set_sub_key(9, SCHEME_BB21);
        let hv = kidv.hash();
        assert_eq!(
            kdf.for_key_id(&kidv).derive_scalar(&hv),
            kdf.derive_scalar(&hv)
        );
    }

    #[test]
    fn nonzero_subkey_derives_child() {
        let kdf = test_kdf();
        let kidv = KeyIdValue::new(5, 1, KeyKind::REGULAR, 3);
        let hv = kidv.hash();
        assert_eq!(
            kdf.for_key_id(&kidv).derive_scalar(&hv),
            kdf.create_child(3).derive_scalar(&hv)
        );
    }
}
