// Copyright (c) 2024 The Umbra Project Developers

//! Switch commitments: Pedersen commitments whose blinding factor is bound
//! to the commitment itself.
//!
//! The plain commitment `C0 = sk0*G + value*H_asset` is malleable in the
//! sense that a recipient knowing `sk0` could later claim a different value
//! against a different blinding. The switch tweak closes that hole: a second
//! scalar `sk1 = oracle(C0, sk0*J)` is folded into both the blinding and the
//! commitment, so the final blinding is a function of the commitment it
//! opens.

use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::Identity};
use umbra_crypto_keys::{
    generators::{GEN_G, GEN_J},
    CompressedRistretto, Kdf, KeyIdValue, Oracle, PublicKdf,
};

use crate::amount::{add_value, AssetId};

/// Derive the value generator for an asset id by rejection sampling.
///
/// Returns `None` for the native asset, which commits against the standard
/// `H` generator.
pub fn asset_generator(asset_id: &AssetId) -> Option<RistrettoPoint> {
    if asset_id.is_native() {
        return None;
    }

    let mut oracle = Oracle::new().chain("a-id").chain(asset_id);
    loop {
        oracle.absorb("a-gen");
        let hv = oracle.squeeze();
        if let Some(pt) = CompressedRistretto(hv.0).decompress() {
            if pt != RistrettoPoint::identity() {
                return Some(pt);
            }
        }
    }
}

/// Commitment builder for one asset generator.
pub struct SwitchCommitment {
    h_gen: Option<RistrettoPoint>,
}

impl SwitchCommitment {
    /// Builder for the given asset.
    pub fn new(asset_id: &AssetId) -> Self {
        Self {
            h_gen: asset_generator(asset_id),
        }
    }

    /// Builder for the native asset.
    pub fn native() -> Self {
        Self { h_gen: None }
    }

    /// The value generator in use; `None` is the standard `H`.
    pub fn generator(&self) -> Option<&RistrettoPoint> {
        self.h_gen.as_ref()
    }

    /// Fold `value` into a commitment under this asset's generator.
    pub fn add_value(&self, comm: &mut RistrettoPoint, value: u64) {
        add_value(comm, self.h_gen.as_ref(), value);
    }

    fn sk1(comm0: &RistrettoPoint, sk0_j: &RistrettoPoint) -> Scalar {
        Oracle::new().chain(comm0).chain(sk0_j).scalar()
    }

    /// Derive the blinding scalar and commitment for a key identifier.
    pub fn create(&self, kdf: &impl Kdf, kidv: &KeyIdValue) -> (Scalar, RistrettoPoint) {
        let hv = kidv.hash();
        let sk0 = kdf.derive_scalar(&hv);

        let mut comm = *GEN_G * sk0;
        self.add_value(&mut comm, kidv.value);

        let sk0_j = *GEN_J * sk0;
        let sk1 = Self::sk1(&comm, &sk0_j);

        comm += *GEN_G * sk1;
        (sk0 + sk1, comm)
    }

    /// Rebuild the commitment from public key material only.
    ///
    /// The result equals the stored commitment iff the supplied identifier
    /// and value are the ones it was created from.
    pub fn recover(&self, pkdf: &impl PublicKdf, kidv: &KeyIdValue) -> RistrettoPoint {
        let hv = kidv.hash();

        let sk0_j = pkdf.derive_pkey_j(&hv);
        let mut res = pkdf.derive_pkey_g(&hv);
        self.add_value(&mut res, kidv.value);

        let sk1 = Self::sk1(&res, &sk0_j);
        res + *GEN_G * sk1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_crypto_keys::{HKdf, Hash, KeyKind};

    fn test_kdf() -> HKdf {
        HKdf::from_seed(b"switch commitment tests")
    }

    fn test_asset() -> AssetId {
        AssetId(Hash([3u8; 32]))
    }

    #[test]
    fn native_asset_has_no_custom_generator() {
        assert!(asset_generator(&AssetId::NATIVE).is_none());
    }

    #[test]
    fn asset_generator_is_deterministic_and_id_sensitive() {
        let a = asset_generator(&test_asset()).unwrap();
        let b = asset_generator(&test_asset()).unwrap();
        assert_eq!(a, b);

        let c = asset_generator(&AssetId(Hash([4u8; 32]))).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn commitment_opens_to_derived_scalar() {
        let kdf = test_kdf();
        let kidv = KeyIdValue::new(700, 1, KeyKind::REGULAR, 0);
        let (sk, comm) = SwitchCommitment::native().create(&kdf, &kidv);

        let mut expected = *GEN_G * sk;
        add_value(&mut expected, None, kidv.value);
        assert_eq!(comm, expected);
    }

    #[test]
    fn recover_matches_create() {
        let kdf = test_kdf();
        let pkdf = kdf.public();

        for asset in [AssetId::NATIVE, test_asset()] {
            let sc = SwitchCommitment::new(&asset);
            let kidv = KeyIdValue::new(12345, 7, KeyKind::REGULAR, 0);
            let (_sk, comm) = sc.create(&kdf, &kidv);
            assert_eq!(sc.recover(&pkdf, &kidv), comm);
        }
    }

    #[test]
    fn recover_detects_wrong_value() {
        let kdf = test_kdf();
        let pkdf = kdf.public();
        let sc = SwitchCommitment::native();

        let kidv = KeyIdValue::new(12345, 7, KeyKind::REGULAR, 0);
        let (_sk, comm) = sc.create(&kdf, &kidv);

        let mut wrong = kidv;
        wrong.value += 1;
        assert_ne!(sc.recover(&pkdf, &wrong), comm);
    }

    #[test]
    fn recover_detects_wrong_index() {
        let kdf = test_kdf();
        let pkdf = kdf.public();
        let sc = SwitchCommitment::native();

        let kidv = KeyIdValue::new(12345, 7, KeyKind::REGULAR, 0);
        let (_sk, comm) = sc.create(&kdf, &kidv);

        let wrong = KeyIdValue::new(12345, 8, KeyKind::REGULAR, 0);
        assert_ne!(sc.recover(&pkdf, &wrong), comm);
    }
}
