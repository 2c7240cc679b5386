// Copyright (c) 2024 The Umbra Project Developers

//! Transaction outputs: confidential or public range-proofed UTXOs.

use core::cmp::Ordering;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::Identity};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{
    import_nnz, CompressedRistretto, Kdf, KeyIdValue, Oracle, PublicKdf,
};

use crate::{
    amount::AssetId,
    error::{TransactionValidationError, TransactionValidationResult},
    height::{height_add, Height},
    range_proof::{CreatorParams, RangeProofConfidential, RangeProofPublic},
    rules::Rules,
    stats::TxStats,
    switch_commitment::SwitchCommitment,
};

/// A transaction output.
///
/// Carries exactly one range proof: confidential (bulletproof) or public
/// (visible amount). Coinbase outputs must be public; non-coinbase public
/// outputs require the `allow_public_utxos` rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Pedersen commitment to the value.
    pub commitment: CompressedRistretto,
    /// Whether this output is a coinbase subsidy.
    pub coinbase: bool,
    /// Wallet-recovery marker: the output is stripped of its proof when it
    /// leaves the horizon and only the recovery data is kept.
    pub recovery_only: bool,
    /// Extra maturity delta requested by the creator.
    pub incubation: Height,
    /// Asset this output commits under.
    pub asset_id: AssetId,
    /// Confidential proof, if any.
    pub confidential: Option<RangeProofConfidential>,
    /// Public proof, if any.
    pub public: Option<RangeProofPublic>,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            commitment: CompressedRistretto::identity(),
            coinbase: false,
            recovery_only: false,
            incubation: 0,
            asset_id: AssetId::NATIVE,
            confidential: None,
            public: None,
        }
    }
}

impl Output {
    /// Derive the commitment and build the range proof for `kidv`.
    ///
    /// Uses the flags already set on `self` (`coinbase`, `incubation`,
    /// `asset_id`); a public proof is built when `public` is requested or
    /// the output is coinbase. Returns the final blinding scalar.
    pub fn generate<R: RngCore + CryptoRng>(
        &mut self,
        h_scheme: Height,
        rules: &Rules,
        coin_kdf: &impl Kdf,
        tag_kdf: &impl PublicKdf,
        kidv: &KeyIdValue,
        public: bool,
        rng: &mut R,
    ) -> TransactionValidationResult<Scalar> {
        let sc = SwitchCommitment::new(&self.asset_id);
        let (sk, comm) = sc.create(coin_kdf, kidv);
        self.commitment = comm.compress();

        let cp = CreatorParams::new(*kidv, &self.commitment, tag_kdf);
        let mut oracle = self.prepare_oracle(h_scheme, rules);

        if public || self.coinbase {
            self.public = Some(RangeProofPublic::create(&sk, &cp, &mut oracle));
            self.confidential = None;
        } else {
            self.confidential = Some(
                RangeProofConfidential::create(&sk, &cp, &mut oracle, sc.generator(), rng)
                    .ok_or(TransactionValidationError::InvalidRangeProof)?,
            );
            self.public = None;
        }

        Ok(sk)
    }

    /// Seed the proof oracle for this output. From Fork1 on, the commitment
    /// itself enters the transcript.
    fn prepare_oracle(&self, h_scheme: Height, rules: &Rules) -> Oracle {
        let mut oracle = Oracle::new().chain(&self.incubation);
        if h_scheme >= rules.forks[1].height {
            oracle.absorb(&self.commitment);
        }
        oracle
    }

    /// Validate the output, returning the imported commitment point for
    /// excess accumulation.
    pub fn is_valid(
        &self,
        h_scheme: Height,
        rules: &Rules,
    ) -> TransactionValidationResult<RistrettoPoint> {
        let comm =
            import_nnz(&self.commitment).map_err(|_| TransactionValidationError::PointImport)?;

        let sc = SwitchCommitment::new(&self.asset_id);
        let mut oracle = self.prepare_oracle(h_scheme, rules);

        if let Some(confidential) = &self.confidential {
            if self.coinbase {
                // Coinbase emission must be visible.
                return Err(TransactionValidationError::CoinbaseNotPublic);
            }
            if self.public.is_some() {
                return Err(TransactionValidationError::ProofShapeInvalid);
            }
            if !confidential.is_valid(&self.commitment, &mut oracle, sc.generator()) {
                return Err(TransactionValidationError::InvalidRangeProof);
            }
            return Ok(comm);
        }

        let public = self
            .public
            .as_ref()
            .ok_or(TransactionValidationError::ProofShapeInvalid)?;

        if !(rules.allow_public_utxos || self.coinbase) {
            return Err(TransactionValidationError::PublicUtxoNotAllowed);
        }
        if !public.is_valid(&comm, &mut oracle, sc.generator()) {
            return Err(TransactionValidationError::InvalidRangeProof);
        }
        Ok(comm)
    }

    /// Recover the key identifier using the tag KDF.
    pub fn recover(&self, tag_kdf: &impl PublicKdf) -> Option<KeyIdValue> {
        let seed = CreatorParams::seed_for(&self.commitment, tag_kdf);
        if let Some(confidential) = &self.confidential {
            confidential.recover(&seed)
        } else {
            self.public.as_ref()?.recover(&seed)
        }
    }

    /// Reconstruct the commitment from the public coin KDF and compare.
    pub fn verify_recovered(&self, coin_pkdf: &impl PublicKdf, kidv: &KeyIdValue) -> bool {
        let expected = SwitchCommitment::new(&self.asset_id).recover(coin_pkdf, kidv);
        expected.compress() == self.commitment
    }

    /// First height at which this output may be spent.
    pub fn maturity(&self, h: Height, rules: &Rules) -> Height {
        let base = if self.coinbase {
            rules.maturity.coinbase
        } else {
            rules.maturity.std
        };
        height_add(height_add(h, base), self.incubation)
    }

    /// Count this element; coinbase value accumulates wide.
    pub fn add_stats(&self, s: &mut TxStats) {
        s.outputs += 1;
        if self.coinbase {
            if let Some(public) = &self.public {
                s.coinbase += public.value as u128;
            }
        }
    }

    /// Canonical total order mirroring the serialized field order.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.commitment
            .as_bytes()
            .cmp(other.commitment.as_bytes())
            .then_with(|| self.coinbase.cmp(&other.coinbase))
            .then_with(|| self.recovery_only.cmp(&other.recovery_only))
            .then_with(|| self.incubation.cmp(&other.incubation))
            .then_with(|| self.asset_id.cmp(&other.asset_id))
            .then_with(|| cmp_opt(&self.confidential, &other.confidential, |a, b| {
                a.cmp_canonical(b)
            }))
            .then_with(|| cmp_opt(&self.public, &other.public, |a, b| a.cmp_canonical(b)))
    }
}

impl PartialOrd for Output {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Output {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_canonical(other)
    }
}

/// `None` sorts below `Some`, as a missing optional field serializes first.
pub(crate) fn cmp_opt<T>(
    a: &Option<T>,
    b: &Option<T>,
    f: impl FnOnce(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => f(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use umbra_crypto_keys::{HKdf, KeyKind};

    fn rng() -> StdRng {
        SeedableRng::from_seed([42u8; 32])
    }

    fn kdf() -> HKdf {
        HKdf::from_seed(b"output tests")
    }

    fn tag_kdf() -> HKdf {
        HKdf::from_seed(b"output tag tests")
    }

    fn rules() -> Rules {
        let mut r = Rules::default();
        r.forks[1].height = 10;
        r.forks[2].height = 20;
        r.update_checksum().unwrap();
        r
    }

    #[test]
    fn confidential_roundtrip() {
        let rules = rules();
        let kidv = KeyIdValue::new(4000, 1, KeyKind::REGULAR, 0);

        let mut output = Output::default();
        let sk = output
            .generate(
                30,
                &rules,
                &kdf(),
                &tag_kdf().public(),
                &kidv,
                false,
                &mut rng(),
            )
            .unwrap();

        assert!(output.confidential.is_some());
        assert!(output.public.is_none());
        assert!(output.is_valid(30, &rules).is_ok());

        // The commitment opens to the returned scalar.
        let mut expected = *umbra_crypto_keys::generators::GEN_G * sk;
        crate::amount::add_value(&mut expected, None, kidv.value);
        assert_eq!(output.commitment, expected.compress());
    }

    #[test]
    fn coinbase_is_public() {
        let rules = rules();
        let kidv = KeyIdValue::new(5000, 2, KeyKind::COINBASE, 0);

        let mut output = Output {
            coinbase: true,
            ..Default::default()
        };
        output
            .generate(
                30,
                &rules,
                &kdf(),
                &tag_kdf().public(),
                &kidv,
                false,
                &mut rng(),
            )
            .unwrap();

        assert!(output.public.is_some());
        assert!(output.is_valid(30, &rules).is_ok());
    }

    #[test]
    fn plain_public_needs_permission() {
        let rules = rules();
        let kidv = KeyIdValue::new(5000, 2, KeyKind::REGULAR, 0);

        let mut output = Output::default();
        output
            .generate(
                30,
                &rules,
                &kdf(),
                &tag_kdf().public(),
                &kidv,
                true,
                &mut rng(),
            )
            .unwrap();

        assert_eq!(
            output.is_valid(30, &rules),
            Err(TransactionValidationError::PublicUtxoNotAllowed)
        );

        let mut permissive = rules.clone();
        permissive.allow_public_utxos = true;
        assert!(output.is_valid(30, &permissive).is_ok());
    }

    #[test]
    fn proof_binds_commitment_after_fork1() {
        let rules = rules();
        let kidv = KeyIdValue::new(4000, 1, KeyKind::REGULAR, 0);

        let mut output = Output::default();
        output
            .generate(
                30,
                &rules,
                &kdf(),
                &tag_kdf().public(),
                &kidv,
                false,
                &mut rng(),
            )
            .unwrap();

        // A proof created at fork1+ does not verify under the pre-fork1
        // oracle, which omits the commitment.
        assert_eq!(
            output.is_valid(5, &rules),
            Err(TransactionValidationError::InvalidRangeProof)
        );
    }

    #[test]
    fn recover_yields_key_id() {
        let rules = rules();
        let kidv = KeyIdValue::new(4000, 11, KeyKind::REGULAR, 0);

        let mut output = Output::default();
        output
            .generate(
                30,
                &rules,
                &kdf(),
                &tag_kdf().public(),
                &kidv,
                false,
                &mut rng(),
            )
            .unwrap();

        assert_eq!(output.recover(&tag_kdf().public()), Some(kidv));
        assert!(output.verify_recovered(&kdf().public(), &kidv));

        let mut wrong = kidv;
        wrong.value += 1;
        assert!(!output.verify_recovered(&kdf().public(), &wrong));

        // The wrong tag KDF recovers nothing.
        assert_eq!(output.recover(&kdf().public()), None);
    }

    #[test]
    fn maturity_saturates() {
        let rules = rules();
        let output = Output {
            coinbase: true,
            incubation: 50,
            ..Default::default()
        };
        assert_eq!(
            output.maturity(100, &rules),
            100 + rules.maturity.coinbase + 50
        );

        let far = Output {
            incubation: u64::MAX,
            ..Default::default()
        };
        assert_eq!(far.maturity(100, &rules), u64::MAX);
    }
}
