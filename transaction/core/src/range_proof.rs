// Copyright (c) 2024 The Umbra Project Developers

//! Output range proofs.
//!
//! Confidential outputs carry a bulletproof over the committed value;
//! coinbase and explicitly-public outputs carry a visible amount signed by
//! the blinding key. Both flavors embed a masked key-identifier blob so the
//! owner can recover the derivation tuple from the seed alone.

use alloc::vec::Vec;
use bulletproofs::{BulletproofGens, PedersenGens, RangeProof};
use core::cmp::Ordering;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use lazy_static::lazy_static;
use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{
    generators::{GEN_G, GEN_H},
    CompressedRistretto, Hash, Hasher, KeyId, KeyIdValue, KeyKind, Oracle, PublicKdf, Signature,
};

use crate::amount::Amount;

lazy_static! {
    static ref BP_GENS: BulletproofGens = BulletproofGens::new(64, 1);
}

/// Everything needed to create or recover a proof for one output.
#[derive(Clone, Copy, Debug)]
pub struct CreatorParams {
    /// The key identifier the output derives from.
    pub kidv: KeyIdValue,
    /// Recovery seed, bound to the commitment and the tag KDF.
    pub seed: Hash,
}

impl CreatorParams {
    /// Derive the seed for a commitment: hash the commitment, mix in a
    /// tag-KDF scalar, hash again.
    pub fn new(kidv: KeyIdValue, commitment: &CompressedRistretto, tag_kdf: &impl PublicKdf) -> Self {
        Self {
            kidv,
            seed: Self::seed_for(commitment, tag_kdf),
        }
    }

    /// The seed alone, for recovery paths that do not know the identifier.
    pub fn seed_for(commitment: &CompressedRistretto, tag_kdf: &impl PublicKdf) -> Hash {
        let hv = Hasher::new().chain(commitment).finalize();
        let tag = tag_kdf.derive_tag(&hv);
        Hasher::new().chain(&tag).finalize()
    }
}

const RECOVERY_LEN: usize = 24;

/// A key identifier masked under a seed-derived keystream.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct RecoveryData {
    masked: [u8; RECOVERY_LEN],
    tag: [u8; 8],
}

impl RecoveryData {
    fn pack(kidv: &KeyIdValue) -> [u8; RECOVERY_LEN] {
        let mut out = [0u8; RECOVERY_LEN];
        out[..8].copy_from_slice(&kidv.id.idx.to_le_bytes());
        out[8..12].copy_from_slice(&kidv.id.kind.0.to_le_bytes());
        out[12..16].copy_from_slice(&kidv.id.sub_idx.to_le_bytes());
        out[16..24].copy_from_slice(&kidv.value.to_le_bytes());
        out
    }

    fn unpack(raw: &[u8; RECOVERY_LEN]) -> KeyIdValue {
        KeyIdValue {
            id: KeyId {
                idx: u64::from_le_bytes(raw[..8].try_into().expect("8 bytes")),
                kind: KeyKind(u32::from_le_bytes(raw[8..12].try_into().expect("4 bytes"))),
                sub_idx: u32::from_le_bytes(raw[12..16].try_into().expect("4 bytes")),
            },
            value: u64::from_le_bytes(raw[16..24].try_into().expect("8 bytes")),
        }
    }

    fn keystream(seed: &Hash) -> [u8; 32] {
        Hasher::new().chain("umbra.rec.key").chain(seed).finalize().0
    }

    fn mac(seed: &Hash, packed: &[u8; RECOVERY_LEN]) -> [u8; 8] {
        let hv = Hasher::new()
            .chain("umbra.rec.mac")
            .chain(seed)
            .chain(&packed[..])
            .finalize();
        hv.0[..8].try_into().expect("8 bytes")
    }

    /// Mask an identifier under the seed.
    pub fn conceal(kidv: &KeyIdValue, seed: &Hash) -> Self {
        let packed = Self::pack(kidv);
        let ks = Self::keystream(seed);
        let mut masked = packed;
        for (m, k) in masked.iter_mut().zip(ks.iter()) {
            *m ^= k;
        }
        Self {
            masked,
            tag: Self::mac(seed, &packed),
        }
    }

    /// Unmask with the seed; `None` if the blob was not made under it.
    pub fn reveal(&self, seed: &Hash) -> Option<KeyIdValue> {
        let ks = Self::keystream(seed);
        let mut packed = self.masked;
        for (m, k) in packed.iter_mut().zip(ks.iter()) {
            *m ^= k;
        }
        if Self::mac(seed, &packed) != self.tag {
            return None;
        }
        Some(Self::unpack(&packed))
    }
}

/// A public (visible-amount) range proof.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RangeProofPublic {
    /// The visible value.
    pub value: Amount,
    /// Schnorr signature by the blinding key over the oracle challenge.
    pub signature: Signature,
    /// Masked key identifier.
    pub recovery: RecoveryData,
}

impl RangeProofPublic {
    fn challenge(value: Amount, oracle: &mut Oracle) -> Hash {
        oracle.absorb(&value);
        oracle.squeeze()
    }

    /// Create a proof for `cp.kidv.value` signed by `sk`.
    pub fn create(sk: &Scalar, cp: &CreatorParams, oracle: &mut Oracle) -> Self {
        let value = cp.kidv.value;
        let hv = Self::challenge(value, oracle);
        Self {
            value,
            signature: Signature::sign(&hv, sk),
            recovery: RecoveryData::conceal(&cp.kidv, &cp.seed),
        }
    }

    /// Verify against the commitment the proof claims to open.
    pub fn is_valid(
        &self,
        comm: &RistrettoPoint,
        oracle: &mut Oracle,
        h_gen: Option<&RistrettoPoint>,
    ) -> bool {
        // Strip the value; what remains must be the blinding key.
        let pk = comm - h_gen.unwrap_or(&GEN_H) * Scalar::from(self.value);
        let hv = Self::challenge(self.value, oracle);
        self.signature.is_valid(&hv, &pk)
    }

    /// Recover the key identifier from the seed.
    pub fn recover(&self, cp_seed: &Hash) -> Option<KeyIdValue> {
        let kidv = self.recovery.reveal(cp_seed)?;
        (kidv.value == self.value).then_some(kidv)
    }

    /// Canonical ordering for sorted containers.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.signature.cmp_canonical(&other.signature))
    }
}

/// A confidential (bulletproof) range proof.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeProofConfidential {
    /// The bulletproof itself (external scheme).
    pub proof: RangeProof,
    /// Masked key identifier and value.
    pub recovery: RecoveryData,
}

impl PartialEq for RangeProofConfidential {
    fn eq(&self, other: &Self) -> bool {
        self.recovery == other.recovery && self.proof.to_bytes() == other.proof.to_bytes()
    }
}

impl Eq for RangeProofConfidential {}

impl RangeProofConfidential {
    fn pedersen_gens(h_gen: Option<&RistrettoPoint>) -> PedersenGens {
        PedersenGens {
            B: *h_gen.unwrap_or(&GEN_H),
            B_blinding: *GEN_G,
        }
    }

    fn transcript(oracle: &mut Oracle) -> Transcript {
        let mut t = Transcript::new(b"umbra.range_proof");
        t.append_message(b"seed", oracle.squeeze().as_bytes());
        t
    }

    /// Prove that the committed value lies in `[0, 2^64)`.
    ///
    /// `sk` must be the final (switch-adjusted) blinding scalar; the
    /// bulletproof's internally-computed commitment then coincides with
    /// the output's commitment.
    pub fn create<R: RngCore + CryptoRng>(
        sk: &Scalar,
        cp: &CreatorParams,
        oracle: &mut Oracle,
        h_gen: Option<&RistrettoPoint>,
        rng: &mut R,
    ) -> Option<Self> {
        let mut transcript = Self::transcript(oracle);
        let (proof, _comm) = RangeProof::prove_single_with_rng(
            &BP_GENS,
            &Self::pedersen_gens(h_gen),
            &mut transcript,
            cp.kidv.value,
            sk,
            64,
            rng,
        )
        .ok()?;

        Some(Self {
            proof,
            recovery: RecoveryData::conceal(&cp.kidv, &cp.seed),
        })
    }

    /// Verify against a compressed commitment.
    pub fn is_valid(
        &self,
        comm: &CompressedRistretto,
        oracle: &mut Oracle,
        h_gen: Option<&RistrettoPoint>,
    ) -> bool {
        let mut transcript = Self::transcript(oracle);
        self.proof
            .verify_single(
                &BP_GENS,
                &Self::pedersen_gens(h_gen),
                &mut transcript,
                comm,
                64,
            )
            .is_ok()
    }

    /// Recover the key identifier (value included) from the seed.
    pub fn recover(&self, cp_seed: &Hash) -> Option<KeyIdValue> {
        self.recovery.reveal(cp_seed)
    }

    /// Canonical byte serialization, for hashing and ordering.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.proof.to_bytes();
        out.extend_from_slice(&self.recovery.masked);
        out.extend_from_slice(&self.recovery.tag);
        out
    }

    /// Canonical ordering for sorted containers.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}
