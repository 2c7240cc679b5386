// Copyright (c) 2024 The Umbra Project Developers

//! Proof-of-work binding. The Equihash-family engine itself is an external
//! collaborator; headers carry its solution and delegate to it.

use alloc::{vec, vec::Vec};
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{Absorb, Sink};
use umbra_transaction_core::{Height, POW_NONCE_BYTES, POW_SOLUTION_BYTES};

use crate::difficulty::Difficulty;

/// The PoW fields of a block header.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProofOfWork {
    /// Packed Equihash solution indices; [`POW_SOLUTION_BYTES`] long.
    pub indices: Vec<u8>,
    /// Grinding nonce.
    pub nonce: [u8; POW_NONCE_BYTES],
    /// Difficulty this solution claims.
    pub difficulty: Difficulty,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self {
            indices: vec![0u8; POW_SOLUTION_BYTES],
            nonce: [0u8; POW_NONCE_BYTES],
            difficulty: Difficulty::default(),
        }
    }
}

impl ProofOfWork {
    /// Whether the solution has the mandated shape.
    pub fn is_well_formed(&self) -> bool {
        self.indices.len() == POW_SOLUTION_BYTES
    }
}

impl Absorb for ProofOfWork {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        sink.write(&self.indices);
        sink.write(&self.nonce);
        self.difficulty.packed.absorb_to(sink);
    }
}

/// The external solver/verifier contract.
///
/// `solve` fills `pow.indices`/`pow.nonce` for the given input hash, polling
/// `cancel` between attempts; it returns `false` when cancelled.
pub trait PowEngine {
    /// Attempt to solve; mutates `pow` on success.
    fn solve(
        &self,
        input: &[u8],
        height: Height,
        pow: &mut ProofOfWork,
        cancel: &mut dyn FnMut() -> bool,
    ) -> bool;

    /// Verify a claimed solution.
    fn is_valid(&self, input: &[u8], height: Height, pow: &ProofOfWork) -> bool;
}
