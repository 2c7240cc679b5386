// Copyright (c) 2024 The Umbra Project Developers

//! Block headers (system state) and Merkle proof verification against the
//! definition root.
//!
//! The definition root commits to the whole system state in a fixed shape:
//!
//! ```text
//! definition = join(join(shielded_pool_root, utxo_tree_root), history_root)
//! ```
//!
//! UTXO proofs walk a flagged path whose final step joins the history on
//! the right; state proofs walk the history MMR and join the live subtree
//! on the left; shielded proofs walk the pool MMR and take two fixed
//! right-hand joins. All three shapes are verified here.

use alloc::collections::BTreeMap;
use core::cmp::Ordering;
use core::fmt;
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{CompressedRistretto, Hash, Hasher};
use umbra_transaction_core::{Height, Kernel, Rules, HEIGHT_GENESIS};

use crate::{
    difficulty::ChainWork,
    merkle::{interpret, HardProof, HardVerifier, Proof},
    pow::{PowEngine, ProofOfWork},
};

/// A height plus the header hash at that height.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct StateId {
    /// Header height.
    pub height: Height,
    /// Header hash.
    pub hash: Hash,
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.hash)
    }
}

/// The full system-state header of one block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    /// Block height.
    pub height: Height,
    /// Hash of the previous header.
    pub prev: Hash,
    /// Total chain work up to and including this block.
    pub chain_work: ChainWork,
    /// Root of the block's kernel MMR.
    pub kernels: Hash,
    /// The composite definition root.
    pub definition: Hash,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Proof-of-work binding.
    pub pow: ProofOfWork,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            height: 0,
            prev: Hash::ZERO,
            chain_work: ChainWork::ZERO,
            kernels: Hash::ZERO,
            definition: Hash::ZERO,
            timestamp: 0,
            pow: ProofOfWork::default(),
        }
    }
}

impl SystemState {
    fn hash_internal(&self, rules: &Rules, total: bool) -> Hash {
        let mut hp = Hasher::new()
            .chain(&self.height)
            .chain(&self.prev)
            .chain(&self.chain_work)
            .chain(&self.kernels)
            .chain(&self.definition)
            .chain(&self.timestamp)
            .chain(&self.pow.difficulty.packed);

        // From Fork2 on the active fork hash joins in, so headers mined
        // under different parameters cannot be replayed across chains.
        let fork = rules.fork_at(self.height);
        if fork >= 2 {
            hp.absorb(&rules.forks[fork].hash);
        }

        if total {
            hp.absorb(&self.pow);
        }

        hp.finalize()
    }

    /// The header hash. Pre-genesis heights hash to the prehistoric
    /// constant.
    pub fn hash(&self, rules: &Rules) -> Hash {
        if self.height >= HEIGHT_GENESIS {
            self.hash_internal(rules, true)
        } else {
            rules.prehistoric
        }
    }

    /// The hash miners grind on: nonce and solution indices excluded.
    pub fn hash_for_pow(&self, rules: &Rules) -> Hash {
        self.hash_internal(rules, false)
    }

    /// Height plus hash.
    pub fn id(&self, rules: &Rules) -> StateId {
        StateId {
            height: self.height,
            hash: self.hash(rules),
        }
    }

    /// Whether `next` chains directly onto this header.
    pub fn is_next(&self, next: &SystemState, rules: &Rules) -> bool {
        self.height + 1 == next.height && next.prev == self.hash(rules)
    }

    /// Turn this header into the prefix of its successor.
    pub fn next_prefix(&mut self, rules: &Rules) {
        self.prev = self.hash(rules);
        self.height += 1;
    }

    /// Structural sanity: at or above genesis, and genesis links the
    /// prehistoric hash.
    pub fn is_sane(&self, rules: &Rules) -> bool {
        if self.height < HEIGHT_GENESIS {
            return false;
        }
        if self.height == HEIGHT_GENESIS && self.prev != rules.prehistoric {
            return false;
        }
        true
    }

    /// Verify the proof of work, honoring the `fake_pow` test switch.
    pub fn is_valid_pow(&self, rules: &Rules, engine: &dyn PowEngine) -> bool {
        if rules.fake_pow {
            return true;
        }
        if !self.pow.is_well_formed() {
            return false;
        }
        let hv = self.hash_for_pow(rules);
        engine.is_valid(hv.as_bytes(), self.height, &self.pow)
    }

    /// Solve the PoW for this header in place.
    pub fn generate_pow(
        &mut self,
        rules: &Rules,
        engine: &dyn PowEngine,
        cancel: &mut dyn FnMut() -> bool,
    ) -> bool {
        let hv = self.hash_for_pow(rules);
        let mut pow = core::mem::take(&mut self.pow);
        let ok = engine.solve(hv.as_bytes(), self.height, &mut pow, cancel);
        self.pow = pow;
        ok
    }

    /// Verify a UTXO membership proof against the definition root.
    pub fn is_valid_proof_utxo(&self, comm: &CompressedRistretto, proof: &UtxoProof) -> bool {
        // The terminal join must put the history subtree on the right.
        match proof.proof.last() {
            None => return false,
            Some(node) if node.left => return false,
            _ => {}
        }

        let mut hv = proof.leaf.leaf_hash(comm);
        interpret(&mut hv, &proof.proof);
        hv == self.definition
    }

    /// Verify that a kernel was included in some reachable state.
    pub fn is_valid_proof_kernel(
        &self,
        krn: &Kernel,
        proof: &KernelLongProof,
        rules: &Rules,
        engine: &dyn PowEngine,
    ) -> bool {
        self.is_valid_proof_kernel_id(&krn.compute_id(), proof, rules, engine)
    }

    /// [`SystemState::is_valid_proof_kernel`] for a bare kernel ID.
    pub fn is_valid_proof_kernel_id(
        &self,
        kernel_id: &Hash,
        proof: &KernelLongProof,
        rules: &Rules,
        engine: &dyn PowEngine,
    ) -> bool {
        if !proof.state.is_sane(rules) || !proof.state.is_valid_pow(rules, engine) {
            return false;
        }

        // Inner: from the kernel ID to that state's kernel root.
        let mut hv = *kernel_id;
        interpret(&mut hv, &proof.inner);
        if hv != proof.state.kernels {
            return false;
        }

        if proof.state == *self {
            return true;
        }
        if proof.state.height > self.height {
            return false;
        }

        // Outer: that state must be in our history.
        let id = proof.state.id(rules);
        self.is_valid_proof_state(&id, &proof.outer)
    }

    /// Verify that an earlier state is part of this header's history.
    pub fn is_valid_proof_state(&self, id: &StateId, proof: &HardProof) -> bool {
        if id.height < HEIGHT_GENESIS || id.height >= self.height {
            return false;
        }

        let mut hver = HardVerifier::new(id.hash, proof);
        hver.interpret_mmr(id.height - HEIGHT_GENESIS, self.height - HEIGHT_GENESIS)
            && hver.interpret_once(true)
            && hver.is_end()
            && hver.hv == self.definition
    }

    /// Verify a shielded-TXO membership proof over a pool of `total`
    /// entries.
    pub fn is_valid_proof_shielded(
        &self,
        d: &ShieldedTxoDescription,
        proof: &HardProof,
        total: u64,
    ) -> bool {
        let mut hver = HardVerifier::new(d.hash(), proof);
        hver.interpret_mmr(d.id, total)
            && hver.interpret_once(false)
            && hver.interpret_once(false)
            && hver.is_end()
            && hver.hv == self.definition
    }

    /// Canonical full-field ordering.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.height
            .cmp(&other.height)
            .then_with(|| self.kernels.cmp(&other.kernels))
            .then_with(|| self.definition.cmp(&other.definition))
            .then_with(|| self.prev.cmp(&other.prev))
            .then_with(|| self.chain_work.cmp(&other.chain_work))
            .then_with(|| self.timestamp.cmp(&other.timestamp))
            .then_with(|| self.pow.difficulty.packed.cmp(&other.pow.difficulty.packed))
            .then_with(|| self.pow.nonce.cmp(&other.pow.nonce))
            .then_with(|| self.pow.indices.cmp(&other.pow.indices))
    }
}

/// The authenticated part of a UTXO leaf: duplicate count and maturity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UtxoLeaf {
    /// Height at which the UTXO matures.
    pub maturity: Height,
    /// How many identical UTXOs this leaf represents.
    pub count: u64,
}

impl UtxoLeaf {
    /// The leaf hash binding the commitment to the leaf data.
    pub fn leaf_hash(&self, comm: &CompressedRistretto) -> Hash {
        Hasher::new()
            .chain("utxo")
            .chain(comm)
            .chain(&self.maturity)
            .chain(&self.count)
            .finalize()
    }
}

/// A UTXO membership proof: leaf data plus a flagged path.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UtxoProof {
    /// The authenticated leaf data.
    pub leaf: UtxoLeaf,
    /// Path from the leaf to the definition root.
    pub proof: Proof,
}

/// Proof that a kernel exists in some state reachable from a header.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KernelLongProof {
    /// The state whose kernel root the inner path reaches.
    pub state: SystemState,
    /// Path from the kernel ID to `state.kernels`.
    pub inner: Proof,
    /// Path from `state` into the verifying header's history; empty when
    /// `state` is the verifying header itself.
    pub outer: HardProof,
}

/// The authenticated descriptor of a shielded TXO.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShieldedTxoDescription {
    /// Serial public point.
    pub serial_pub: CompressedRistretto,
    /// Value commitment.
    pub commitment: CompressedRistretto,
    /// Position in the shielded pool.
    pub id: u64,
}

impl ShieldedTxoDescription {
    /// The pool leaf hash.
    pub fn hash(&self) -> Hash {
        Hasher::new()
            .chain("stxo")
            .chain(&self.serial_pub)
            .chain(&self.commitment)
            .chain(&self.id)
            .finalize()
    }
}

/// An in-memory height-indexed header window.
#[derive(Clone, Debug, Default)]
pub struct HistoryMap {
    map: BTreeMap<Height, SystemState>,
}

impl HistoryMap {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// The highest stored header.
    pub fn tip(&self) -> Option<&SystemState> {
        self.map.values().next_back()
    }

    /// The header at an exact height.
    pub fn get_at(&self, h: Height) -> Option<&SystemState> {
        self.map.get(&h)
    }

    /// Insert headers, overwriting by height.
    pub fn add_states(&mut self, states: &[SystemState]) {
        for s in states {
            self.map.insert(s.height, s.clone());
        }
    }

    /// Walk headers downward, starting below `below` when given; `false`
    /// from the callback aborts and is returned.
    pub fn enum_states(
        &self,
        below: Option<Height>,
        on_state: &mut dyn FnMut(&SystemState) -> bool,
    ) -> bool {
        let iter: alloc::vec::Vec<&SystemState> = match below {
            Some(h) => self.map.range(..h).map(|(_, s)| s).collect(),
            None => self.map.values().collect(),
        };
        for s in iter.into_iter().rev() {
            if !on_state(s) {
                return false;
            }
        }
        true
    }

    /// Drop every header at `h` and above.
    pub fn delete_from(&mut self, h: Height) {
        self.map.split_off(&h);
    }

    /// Keep only the `dh` most recent heights below the tip.
    pub fn shrink_to_window(&mut self, dh: Height) {
        if let Some(&top) = self.map.keys().next_back() {
            if top > dh {
                let keep_from = top - dh;
                self.map = self.map.split_off(&keep_from);
            }
        }
    }

    /// Number of stored headers.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no headers are stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
