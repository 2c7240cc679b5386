// Copyright (c) 2024 The Umbra Project Developers

//! Transaction kernels: the signed and proved components carrying excess
//! and fee.
//!
//! Kernels form a tagged hierarchy. The standard kernel hashes its identity
//! in a single stage; the non-standard subclasses derive a *message* first
//! and hash the ID over (message, signature-or-proof), because the signature
//! or proof itself depends on the message. That split is what prevents a
//! third party from mauling a non-standard kernel into a different ID.

use alloc::vec::Vec;
use core::cmp::Ordering;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::Identity};
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{
    generators::GEN_G, import_nnz, Absorb, CompressedRistretto, DualSignature, Hash, Hasher,
    Oracle, Signature, Sink,
};

use crate::{
    amount::{add_value, Amount, AmountBig, AssetId},
    error::{TransactionValidationError, TransactionValidationResult},
    height::{Height, HeightRange},
    output::cmp_opt,
    range_proof::RangeProofConfidential,
    rules::Rules,
    stats::TxStats,
    switch_commitment::SwitchCommitment,
};

/// Subtype code of the standard kernel.
pub const SUBTYPE_STD: u32 = 1;
/// Subtype code of the asset-emission kernel.
pub const SUBTYPE_ASSET_EMIT: u32 = 2;
/// Subtype code of the shielded-output kernel.
pub const SUBTYPE_SHIELDED_OUTPUT: u32 = 3;
/// Subtype code of the shielded-input kernel.
pub const SUBTYPE_SHIELDED_INPUT: u32 = 4;

/// A preimage-or-image hash lock on a standard kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HashLock {
    /// Preimage or image, depending on `is_image`.
    pub value: Hash,
    /// Whether `value` already is the image.
    pub is_image: bool,
}

impl HashLock {
    /// The lock image entering the kernel ID.
    pub fn image(&self) -> Hash {
        if self.is_image {
            self.value
        } else {
            Hasher::new().chain(&self.value).finalize()
        }
    }

    fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

/// A relative lock: this kernel is valid only `lock_height` blocks after
/// the kernel with `id` entered the chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelativeLock {
    /// ID of the prior kernel.
    pub id: Hash,
    /// Height delta from the prior kernel's inclusion.
    pub lock_height: Height,
}

impl RelativeLock {
    fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.lock_height.cmp(&other.lock_height))
    }
}

/// The serial part of a shielded TXO: a nullifier-base point with an
/// ownership binding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShieldedSerial {
    /// The serial public point.
    pub serial_pub: CompressedRistretto,
    /// Binding signature by the serial secret.
    pub signature: Signature,
}

impl ShieldedSerial {
    /// Build a serial from its secret.
    pub fn create(serial_sk: &Scalar) -> Self {
        let serial_pub = (*GEN_G * serial_sk).compress();
        let msg = Self::binding_msg(&serial_pub);
        Self {
            serial_pub,
            signature: Signature::sign(&msg, serial_sk),
        }
    }

    fn binding_msg(serial_pub: &CompressedRistretto) -> Hash {
        Hasher::new().chain("umbra.serial").chain(serial_pub).finalize()
    }

    /// Internal validity: the point imports and the binding holds.
    pub fn is_valid(&self) -> bool {
        match import_nnz(&self.serial_pub) {
            Ok(pt) => self
                .signature
                .is_valid(&Self::binding_msg(&self.serial_pub), &pt),
            Err(_) => false,
        }
    }
}

/// A shielded transaction output: commitment, serial and range proof.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShieldedTxo {
    /// Value commitment.
    pub commitment: CompressedRistretto,
    /// Serial descriptor.
    pub serial: ShieldedSerial,
    /// Range proof over the committed value.
    pub range_proof: RangeProofConfidential,
}

/// The spend proof of a shielded input. The heavy decoy-set verification is
/// deferred to an external batch verifier; this layer only consumes the
/// commitment and hashes the rest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpendProof {
    /// Commitment of the value being spent.
    pub commitment: CompressedRistretto,
    /// Nullifier point, unique per spent TXO.
    pub nullifier: CompressedRistretto,
    /// Opaque proof payload for the batch verifier.
    pub witness: Vec<u8>,
}

impl Default for SpendProof {
    fn default() -> Self {
        Self {
            commitment: CompressedRistretto::identity(),
            nullifier: CompressedRistretto::identity(),
            witness: Vec::new(),
        }
    }
}

impl Absorb for SpendProof {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.commitment.absorb_to(sink);
        self.nullifier.absorb_to(sink);
        self.witness[..].absorb_to(sink);
    }
}

/// Standard kernel payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KernelStd {
    /// Excess commitment `sk * G`.
    pub commitment: CompressedRistretto,
    /// Signature over the kernel ID by the excess key.
    pub signature: Signature,
    /// Optional hash lock.
    pub hash_lock: Option<HashLock>,
    /// Optional relative lock.
    pub relative_lock: Option<RelativeLock>,
}

impl Default for KernelStd {
    fn default() -> Self {
        Self {
            commitment: CompressedRistretto::identity(),
            signature: Signature::default(),
            hash_lock: None,
            relative_lock: None,
        }
    }
}

/// Asset-emission kernel payload. Positive values mint, negative burn.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KernelAssetEmit {
    /// Excess commitment `sk * G`.
    pub commitment: CompressedRistretto,
    /// 2-key aggregate over (excess key, asset owner key).
    pub signature: DualSignature,
    /// The asset being emitted; never the native asset.
    pub asset_id: AssetId,
    /// Signed emission value.
    pub value: i64,
}

impl Default for KernelAssetEmit {
    fn default() -> Self {
        Self {
            commitment: CompressedRistretto::identity(),
            signature: DualSignature::default(),
            asset_id: AssetId::NATIVE,
            value: 0,
        }
    }
}

/// Shielded-output kernel payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KernelShieldedOutput {
    /// The shielded TXO being created.
    pub txo: ShieldedTxo,
}

/// Shielded-input kernel payload.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct KernelShieldedInput {
    /// End of the decoy window in the shielded pool.
    pub window_end: u64,
    /// The spend proof.
    pub spend_proof: SpendProof,
}

/// The kernel subtype payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum KernelVariant {
    /// Standard kernel.
    Std(KernelStd),
    /// Asset emission.
    AssetEmit(KernelAssetEmit),
    /// Shielded output.
    ShieldedOutput(KernelShieldedOutput),
    /// Shielded input.
    ShieldedInput(KernelShieldedInput),
}

impl KernelVariant {
    /// The subtype code entering non-standard message hashes and ordering.
    pub fn subtype(&self) -> u32 {
        match self {
            Self::Std(_) => SUBTYPE_STD,
            Self::AssetEmit(_) => SUBTYPE_ASSET_EMIT,
            Self::ShieldedOutput(_) => SUBTYPE_SHIELDED_OUTPUT,
            Self::ShieldedInput(_) => SUBTYPE_SHIELDED_INPUT,
        }
    }

    fn hash_for_msg(&self, hp: &mut Hasher) {
        match self {
            Self::Std(_) => {}
            Self::AssetEmit(v) => {
                hp.absorb(&v.commitment);
                hp.absorb(&v.asset_id);
                hp.absorb(&v.value);
            }
            Self::ShieldedOutput(v) => {
                // The serial does not contribute to the balance, so it must
                // be bound into the range-proof oracle via the message.
                hp.absorb(&v.txo.commitment);
                hp.absorb(&v.txo.serial.serial_pub);
                hp.absorb(&v.txo.serial.signature);
            }
            Self::ShieldedInput(v) => {
                hp.absorb(&v.window_end);
            }
        }
    }

    fn hash_for_id(&self, hp: &mut Hasher) {
        match self {
            Self::Std(_) => {}
            Self::AssetEmit(v) => hp.absorb(&v.signature),
            Self::ShieldedOutput(v) => hp.absorb(&v.txo.range_proof.to_bytes()[..]),
            Self::ShieldedInput(v) => hp.absorb(&v.spend_proof),
        }
    }
}

/// A transaction kernel with its nested children.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    /// Fee this kernel pays.
    pub fee: Amount,
    /// Heights at which the kernel (and so the transaction) is valid.
    pub height: HeightRange,
    /// Whether the kernel may appear nested inside another.
    pub can_embed: bool,
    /// Owned nested kernels; tree-structured, never cyclic.
    pub nested: Vec<Kernel>,
    /// Subtype payload.
    pub variant: KernelVariant,
    id: Hash,
}

impl Kernel {
    /// A kernel around the given payload.
    pub fn from_variant(variant: KernelVariant, fee: Amount, height: HeightRange) -> Self {
        Self {
            fee,
            height,
            can_embed: false,
            nested: Vec::new(),
            variant,
            id: Hash::ZERO,
        }
    }

    /// An unsigned standard kernel.
    pub fn new_std(fee: Amount, height: HeightRange) -> Self {
        Self::from_variant(KernelVariant::Std(KernelStd::default()), fee, height)
    }

    /// The cached internal ID.
    ///
    /// Refreshed by the signing constructors and by [`Kernel::update_id`];
    /// code that mutates identity-relevant fields must refresh it before
    /// relying on ordering.
    pub fn id(&self) -> &Hash {
        &self.id
    }

    fn hash_base(&self, hp: &mut Hasher) {
        hp.absorb(&self.fee);
        hp.absorb(&self.height.min);
        hp.absorb(&self.height.max);
    }

    /// Nested-list digest: each child's ID behind a continuation bit.
    fn hash_nested(&self, hp: &mut Hasher) {
        for child in &self.nested {
            hp.absorb(&false);
            hp.absorb(&child.compute_id());
        }
        hp.absorb(&true);
    }

    /// The message hash of a non-standard kernel.
    pub fn compute_msg(&self) -> Hash {
        let mut hp = Hasher::new();
        self.hash_base(&mut hp);

        // Invalid-point sentinel: separates this layout from the standard
        // kernel, whose commitment occupies the same slot.
        hp.absorb(&Hash::ZERO);
        hp.absorb(&1u8);

        hp.absorb(&self.variant.subtype());
        self.hash_nested(&mut hp);
        self.variant.hash_for_msg(&mut hp);
        hp.finalize()
    }

    /// Recompute the internal ID from scratch.
    pub fn compute_id(&self) -> Hash {
        match &self.variant {
            KernelVariant::Std(v) => {
                let mut hp = Hasher::new();
                self.hash_base(&mut hp);

                let flags: u8 = (v.hash_lock.is_some() as u8)
                    | ((v.relative_lock.is_some() as u8) << 1)
                    | ((self.can_embed as u8) << 2);

                hp.absorb(&v.commitment);
                hp.absorb(&0u64); // slot once held an asset emission amount
                hp.absorb(&flags);

                if let Some(lock) = &v.hash_lock {
                    hp.absorb(&lock.image());
                }
                if let Some(lock) = &v.relative_lock {
                    hp.absorb(&lock.id);
                    hp.absorb(&lock.lock_height);
                }

                self.hash_nested(&mut hp);
                hp.finalize()
            }
            variant => {
                let mut hp = Hasher::new().chain(&self.compute_msg());
                variant.hash_for_id(&mut hp);
                hp.finalize()
            }
        }
    }

    /// Refresh the cached ID, children first.
    pub fn update_id(&mut self) {
        for child in &mut self.nested {
            child.update_id();
        }
        self.id = self.compute_id();
    }

    /// Sign a standard kernel with its excess key.
    pub fn sign(&mut self, sk: &Scalar) {
        match &mut self.variant {
            KernelVariant::Std(v) => v.commitment = (*GEN_G * sk).compress(),
            _ => {
                debug_assert!(false, "sign() is for standard kernels");
                return;
            }
        }
        self.update_id();
        let id = self.id;
        if let KernelVariant::Std(v) = &mut self.variant {
            v.signature = Signature::sign(&id, sk);
        }
    }

    /// Sign an asset-emission kernel with the excess and asset owner keys.
    pub fn sign_asset_emit(&mut self, sk: &Scalar, sk_asset: &Scalar) {
        match &mut self.variant {
            KernelVariant::AssetEmit(v) => v.commitment = (*GEN_G * sk).compress(),
            _ => {
                debug_assert!(false, "sign_asset_emit() is for asset-emission kernels");
                return;
            }
        }
        let msg = self.compute_msg();
        if let KernelVariant::AssetEmit(v) = &mut self.variant {
            v.signature = DualSignature::sign(&msg, [sk, sk_asset]);
        }
        self.update_id();
    }

    /// Shared base validation: embed gating, nesting restrictions, nested
    /// recursion and excess accumulation.
    fn is_valid_base(
        &self,
        h_scheme: Height,
        rules: &Rules,
        exc: &mut RistrettoPoint,
        parent: Option<&Kernel>,
        mut own_comm: Option<&mut RistrettoPoint>,
    ) -> TransactionValidationResult<()> {
        if h_scheme < rules.forks[1].height && self.can_embed {
            return Err(TransactionValidationError::UnsupportedAtHeight);
        }

        if let Some(parent) = parent {
            if !self.can_embed {
                return Err(TransactionValidationError::EmbedFlagMissing);
            }
            // The parent's range must be contained in ours: we promise
            // validity wherever the parent may land.
            if self.height.min > parent.height.min || self.height.max < parent.height.max {
                return Err(TransactionValidationError::NestedRangeEscape);
            }
        } else if h_scheme >= rules.forks[2].height && self.height.min < rules.forks[2].height {
            // From Fork2 on, top-level kernels must declare a post-fork
            // minimum height.
            return Err(TransactionValidationError::UnsupportedAtHeight);
        }

        if !self.nested.is_empty() {
            let mut exc_nested = RistrettoPoint::identity();

            let mut prev: Option<&Kernel> = None;
            for child in &self.nested {
                // Sort order of nested kernels stopped mattering at Fork2,
                // but is enforced before it to match historical blocks.
                if h_scheme < rules.forks[2].height {
                    if let Some(prev) = prev {
                        if prev.cmp_order(child, rules) == Ordering::Greater {
                            return Err(TransactionValidationError::Unsorted);
                        }
                    }
                }
                prev = Some(child);

                child.is_valid(h_scheme, rules, &mut exc_nested, Some(self))?;
            }

            if h_scheme < rules.forks[2].height {
                // Before Fork2 the parent commitment was expected to absorb
                // the nested excess. Retire once no such kernels remain on
                // the historical chain.
                let own = own_comm
                    .as_deref_mut()
                    .ok_or(TransactionValidationError::UnsupportedAtHeight)?;
                *own -= exc_nested;
            } else {
                *exc += exc_nested;
            }
        }

        Ok(())
    }

    /// Validate the kernel and fold its excess into `exc`.
    pub fn is_valid(
        &self,
        h_scheme: Height,
        rules: &Rules,
        exc: &mut RistrettoPoint,
        parent: Option<&Kernel>,
    ) -> TransactionValidationResult<()> {
        match &self.variant {
            KernelVariant::Std(v) => {
                if h_scheme < rules.forks[1].height && v.relative_lock.is_some() {
                    return Err(TransactionValidationError::UnsupportedAtHeight);
                }

                let pt = import_nnz(&v.commitment)
                    .map_err(|_| TransactionValidationError::PointImport)?;
                *exc += pt;

                let mut pt_sig = pt;
                self.is_valid_base(h_scheme, rules, exc, parent, Some(&mut pt_sig))?;

                if !v.signature.is_valid(&self.compute_id(), &pt_sig) {
                    return Err(TransactionValidationError::InvalidSignature);
                }
                Ok(())
            }

            KernelVariant::AssetEmit(v) => {
                self.is_valid_base(h_scheme, rules, exc, parent, None)?;

                if h_scheme < rules.forks[2].height || !rules.ca.enabled {
                    return Err(TransactionValidationError::UnsupportedAtHeight);
                }
                if v.value == 0 || v.asset_id.is_native() {
                    return Err(TransactionValidationError::InvalidAssetEmission);
                }

                let pt = import_nnz(&v.commitment)
                    .map_err(|_| TransactionValidationError::PointImport)?;
                *exc += pt;

                let pk_asset = import_nnz(&CompressedRistretto(v.asset_id.0 .0))
                    .map_err(|_| TransactionValidationError::PointImport)?;

                // The prover must know both the excess and the asset key.
                if !v
                    .signature
                    .is_valid(&self.compute_msg(), [&pt, &pk_asset])
                {
                    return Err(TransactionValidationError::InvalidSignature);
                }

                let sc = SwitchCommitment::new(&v.asset_id);
                let mut h_gen = -*sc.generator().expect("non-native asset has a generator");

                if rules.ca.deposit {
                    // Emission locks or releases the native asset alongside.
                    h_gen += *umbra_crypto_keys::generators::GEN_H;
                }

                let val: Amount = if v.value > 0 {
                    v.value as u64
                } else {
                    h_gen = -h_gen;
                    v.value.unsigned_abs()
                };
                add_value(exc, Some(&h_gen), val);
                Ok(())
            }

            KernelVariant::ShieldedOutput(v) => {
                self.is_valid_base(h_scheme, rules, exc, parent, None)?;

                if h_scheme < rules.forks[2].height || !rules.shielded.enabled {
                    return Err(TransactionValidationError::UnsupportedAtHeight);
                }

                let comm = import_nnz(&v.txo.commitment)
                    .map_err(|_| TransactionValidationError::PointImport)?;
                *exc += comm;

                if !v.txo.serial.is_valid() {
                    return Err(TransactionValidationError::InvalidSerial);
                }

                let mut oracle = Oracle::new().chain(&self.compute_msg());
                if !v.txo.range_proof.is_valid(&v.txo.commitment, &mut oracle, None) {
                    return Err(TransactionValidationError::InvalidRangeProof);
                }
                Ok(())
            }

            KernelVariant::ShieldedInput(v) => {
                self.is_valid_base(h_scheme, rules, exc, parent, None)?;

                if h_scheme < rules.forks[2].height || !rules.shielded.enabled {
                    return Err(TransactionValidationError::UnsupportedAtHeight);
                }

                // An input spends value: the commitment enters the excess
                // negated. Spend-proof verification happens in the external
                // batch verifier.
                let comm = import_nnz(&v.spend_proof.commitment)
                    .map_err(|_| TransactionValidationError::PointImport)?;
                *exc += -comm;
                Ok(())
            }
        }
    }

    /// Fee carried by this kernel and its children.
    pub fn total_fee(&self) -> AmountBig {
        self.nested
            .iter()
            .fold(self.fee as AmountBig, |acc, k| acc + k.total_fee())
    }

    /// Count this kernel and its children.
    pub fn add_stats(&self, s: &mut TxStats) {
        s.kernels += 1;
        s.fee += self.fee as AmountBig;

        match &self.variant {
            KernelVariant::ShieldedOutput(_) => {
                s.outputs += 1;
                s.outputs_shielded += 1;
            }
            KernelVariant::ShieldedInput(_) => {
                s.inputs += 1;
                s.inputs_shielded += 1;
            }
            _ => {}
        }

        for child in &self.nested {
            child.add_stats(s);
        }
    }

    /// Depth-first pre-order traversal; `false` from the callback aborts.
    pub fn walk(&self, on_kernel: &mut impl FnMut(&Kernel) -> bool) -> bool {
        if !on_kernel(self) {
            return false;
        }
        for child in &self.nested {
            if !child.walk(on_kernel) {
                return false;
            }
        }
        true
    }

    /// Canonical ordering.
    ///
    /// From Fork2 on, kernels order purely by internal ID, and pre-Fork2
    /// kernels sort strictly below Fork2+ ones. Within pre-Fork2 the order
    /// walks the structural fields, matching historical serialization.
    pub fn cmp_order(&self, other: &Kernel, rules: &Rules) -> Ordering {
        let fork2 = rules.forks[2].height;
        match (self.height.min >= fork2, other.height.min >= fork2) {
            (true, true) => return self.id.cmp(&other.id),
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        self.variant
            .subtype()
            .cmp(&other.variant.subtype())
            .then_with(|| self.cmp_structural(other, rules))
    }

    fn cmp_structural(&self, other: &Kernel, rules: &Rules) -> Ordering {
        match (&self.variant, &other.variant) {
            (KernelVariant::Std(a), KernelVariant::Std(b)) => a
                .commitment
                .as_bytes()
                .cmp(b.commitment.as_bytes())
                .then_with(|| a.signature.cmp_canonical(&b.signature))
                .then_with(|| self.fee.cmp(&other.fee))
                .then_with(|| self.height.min.cmp(&other.height.min))
                .then_with(|| self.height.max.cmp(&other.height.max))
                .then_with(|| self.cmp_nested(other, rules))
                .then_with(|| cmp_opt(&a.hash_lock, &b.hash_lock, HashLock::cmp_canonical))
                .then_with(|| {
                    cmp_opt(&a.relative_lock, &b.relative_lock, RelativeLock::cmp_canonical)
                }),
            // Non-standard kernels never appear pre-Fork2; the subtype
            // comparison above is all the order they need.
            _ => Ordering::Equal,
        }
    }

    fn cmp_nested(&self, other: &Kernel, rules: &Rules) -> Ordering {
        for (a, b) in self.nested.iter().zip(other.nested.iter()) {
            let n = a.cmp_order(b, rules);
            if n != Ordering::Equal {
                return n;
            }
        }
        self.nested.len().cmp(&other.nested.len())
    }
}

/// Walk a forest of kernels depth-first pre-order.
pub fn walk_kernels<'a>(
    kernels: impl IntoIterator<Item = &'a Kernel>,
    on_kernel: &mut impl FnMut(&Kernel) -> bool,
) -> bool {
    for k in kernels {
        if !k.walk(on_kernel) {
            return false;
        }
    }
    true
}
