// Copyright (c) 2024 The Umbra Project Developers

//! Umbra transaction data types, construction and validation routines.
//!
//! The ledger model is confidential-UTXO: transactions bundle inputs,
//! outputs and kernels plus a scalar offset, and validity is an algebraic
//! identity over the summed commitments. Everything here is value-like and
//! immutable once constructed; validation consumers may run concurrently on
//! disjoint instances. Protocol parameters travel as an explicit [`Rules`]
//! snapshot, never as ambient state.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod amount;
mod context;
mod error;
mod fee;
mod height;
mod input;
mod kernel;
mod output;
mod range_proof;
mod rules;
mod stats;
mod switch_commitment;
mod transaction;

pub use crate::{
    amount::{add_value, add_value_wide, Amount, AmountBig, AssetId},
    context::{Context, ContextParams},
    error::{TransactionValidationError, TransactionValidationResult},
    fee::FeeSettings,
    height::{height_add, Height, HeightRange, MAX_HEIGHT},
    input::{Input, InputInternal},
    kernel::{
        walk_kernels, HashLock, Kernel, KernelAssetEmit, KernelShieldedInput,
        KernelShieldedOutput, KernelStd, KernelVariant, RelativeLock, ShieldedSerial, ShieldedTxo,
        SpendProof, SUBTYPE_ASSET_EMIT, SUBTYPE_SHIELDED_INPUT, SUBTYPE_SHIELDED_OUTPUT,
        SUBTYPE_STD,
    },
    output::Output,
    range_proof::{CreatorParams, RangeProofConfidential, RangeProofPublic, RecoveryData},
    rules::{
        CaSettings, DaSettings, EmissionSchedule, HeightHash, MaturitySettings, Rules, RulesError,
        ShieldedSettings, COIN, HEIGHT_GENESIS, POW_K, POW_N, POW_NONCE_BYTES, POW_SOLUTION_BYTES,
    },
    stats::TxStats,
    switch_commitment::{asset_generator, SwitchCommitment},
    transaction::{compare_readers, Transaction, TxReader, TxWriter, VecReader},
};

// Re-export the curve and key-derivation surface consumed by this crate so
// downstream crates name one stack.
pub use umbra_crypto_keys::{
    generators, Absorb, CompressedRistretto, DualSignature, HKdf, HKdfPub, Hash, Hasher, Kdf,
    KeyError, KeyId, KeyIdValue, KeyKind, Oracle, PublicKdf, RistrettoPoint, Scalar, Signature,
};
