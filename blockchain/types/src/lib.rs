// Copyright (c) 2024 The Umbra Project Developers

//! Umbra blockchain data structures: headers, chain work, Merkle proofs
//! and the block builder.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod block;
mod builder;
mod difficulty;
mod merkle;
mod pow;

pub use crate::{
    block::{
        HistoryMap, KernelLongProof, ShieldedTxoDescription, StateId, SystemState, UtxoLeaf,
        UtxoProof,
    },
    builder::BlockBuilder,
    difficulty::{ChainWork, Difficulty, MANTISSA_BITS},
    merkle::{hash_join, interpret, HardProof, HardVerifier, Mmr, Proof, ProofNode},
    pow::{PowEngine, ProofOfWork},
};
