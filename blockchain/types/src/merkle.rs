// Copyright (c) 2024 The Umbra Project Developers

//! Merkle and Merkle-mountain-range proof machinery.
//!
//! An MMR over `total` leaves decomposes into perfect trees ("peaks") by
//! the binary digits of `total`, and the root folds the peaks right to
//! left: `root = join(peak0, join(peak1, ...))`. Proofs serialize as the
//! in-peak siblings bottom-up, then the folded right-hand rest (if any),
//! then the left peaks innermost-first. [`HardVerifier::interpret_mmr`]
//! consumes exactly that shape.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{Hash, Hasher};

/// Join two child hashes into their parent.
pub fn hash_join(left: &Hash, right: &Hash) -> Hash {
    Hasher::new().chain(left).chain(right).finalize()
}

/// One step of a flag-carrying proof path.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProofNode {
    /// Whether the sibling sits on the left.
    pub left: bool,
    /// The sibling hash.
    pub hash: Hash,
}

/// A proof path with explicit sibling sides.
pub type Proof = Vec<ProofNode>;

/// Fold a proof path into `hv`.
pub fn interpret(hv: &mut Hash, proof: &[ProofNode]) {
    for node in proof {
        *hv = if node.left {
            hash_join(&node.hash, hv)
        } else {
            hash_join(hv, &node.hash)
        };
    }
}

/// A proof whose sibling sides are implied by structure, not flags.
pub type HardProof = Vec<Hash>;

/// Step-by-step consumer of a [`HardProof`].
pub struct HardVerifier<'a> {
    /// The running hash, seeded with the leaf and compared by the caller
    /// at the end.
    pub hv: Hash,
    proof: &'a [Hash],
    pos: usize,
}

impl<'a> HardVerifier<'a> {
    /// Start a verification at `leaf`.
    pub fn new(leaf: Hash, proof: &'a [Hash]) -> Self {
        Self { hv: leaf, proof, pos: 0 }
    }

    /// Whether the proof is fully consumed.
    pub fn is_end(&self) -> bool {
        self.pos == self.proof.len()
    }

    /// Consume one sibling; `left` places it on the left.
    pub fn interpret_once(&mut self, left: bool) -> bool {
        let Some(sibling) = self.proof.get(self.pos) else {
            return false;
        };
        self.pos += 1;
        self.hv = if left {
            hash_join(sibling, &self.hv)
        } else {
            hash_join(&self.hv, sibling)
        };
        true
    }

    /// Consume the siblings of leaf `idx` in an MMR over `total` leaves.
    pub fn interpret_mmr(&mut self, mut idx: u64, mut total: u64) -> bool {
        if total == 0 || idx >= total {
            return false;
        }

        let mut left_peaks = 0u32;
        loop {
            let peak = prev_pow2(total);
            if idx < peak {
                // In-peak path, leaf level first.
                let mut i = idx;
                for _ in 0..peak.trailing_zeros() {
                    if !self.interpret_once(i & 1 == 1) {
                        return false;
                    }
                    i >>= 1;
                }
                // The folded rest of the range joins on the right.
                if total > peak && !self.interpret_once(false) {
                    return false;
                }
                break;
            }
            idx -= peak;
            total -= peak;
            left_peaks += 1;
        }

        // Enclosing peaks join on the left, innermost first.
        for _ in 0..left_peaks {
            if !self.interpret_once(true) {
                return false;
            }
        }
        true
    }
}

fn prev_pow2(n: u64) -> u64 {
    debug_assert!(n > 0);
    if n.is_power_of_two() {
        n
    } else {
        n.next_power_of_two() >> 1
    }
}

/// An append-only MMR accumulator over leaf hashes.
///
/// Nodes and tests use it to build the structures the verifiers consume;
/// `root`, `proof` and `node_proof` agree with [`HardVerifier`] and
/// [`interpret`] by construction.
#[derive(Clone, Debug, Default)]
pub struct Mmr {
    leaves: Vec<Hash>,
}

impl Mmr {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf.
    pub fn append(&mut self, leaf: Hash) {
        self.leaves.push(leaf);
    }

    /// Leaf count.
    pub fn count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// The MMR root; the zero hash when empty.
    pub fn root(&self) -> Hash {
        Self::range_root(&self.leaves)
    }

    fn range_root(leaves: &[Hash]) -> Hash {
        match leaves.len() {
            0 => Hash::ZERO,
            1 => leaves[0],
            n => {
                let peak = prev_pow2(n as u64) as usize;
                if peak == n {
                    let half = n / 2;
                    hash_join(
                        &Self::range_root(&leaves[..half]),
                        &Self::range_root(&leaves[half..]),
                    )
                } else {
                    hash_join(
                        &Self::range_root(&leaves[..peak]),
                        &Self::range_root(&leaves[peak..]),
                    )
                }
            }
        }
    }

    /// The sibling list for leaf `idx`, in [`HardVerifier::interpret_mmr`]
    /// order.
    pub fn proof(&self, idx: u64) -> Option<HardProof> {
        if idx >= self.count() {
            return None;
        }
        let mut out = Vec::new();
        Self::range_proof(&self.leaves, idx as usize, &mut out);
        Some(out)
    }

    fn range_proof(leaves: &[Hash], idx: usize, out: &mut Vec<Hash>) {
        if leaves.len() <= 1 {
            return;
        }
        let peak = prev_pow2(leaves.len() as u64) as usize;
        if peak == leaves.len() {
            // Perfect subtree: recurse into the half holding the leaf and
            // emit the other half's root on the way out.
            let half = peak / 2;
            if idx < half {
                Self::range_proof(&leaves[..half], idx, out);
                out.push(Self::range_root(&leaves[half..]));
            } else {
                Self::range_proof(&leaves[half..], idx - half, out);
                out.push(Self::range_root(&leaves[..half]));
            }
        } else if idx < peak {
            Self::range_proof(&leaves[..peak], idx, out);
            out.push(Self::range_root(&leaves[peak..]));
        } else {
            Self::range_proof(&leaves[peak..], idx - peak, out);
            out.push(Self::range_root(&leaves[..peak]));
        }
    }

    /// The same path with explicit sibling sides, for flag-carrying proofs.
    pub fn node_proof(&self, idx: u64) -> Option<Proof> {
        if idx >= self.count() {
            return None;
        }
        let mut out = Vec::new();
        Self::range_node_proof(&self.leaves, idx as usize, &mut out);
        Some(out)
    }

    fn range_node_proof(leaves: &[Hash], idx: usize, out: &mut Vec<ProofNode>) {
        if leaves.len() <= 1 {
            return;
        }
        let peak = prev_pow2(leaves.len() as u64) as usize;
        let split = if peak == leaves.len() { peak / 2 } else { peak };
        if idx < split {
            Self::range_node_proof(&leaves[..split], idx, out);
            out.push(ProofNode {
                left: false,
                hash: Self::range_root(&leaves[split..]),
            });
        } else {
            Self::range_node_proof(&leaves[split..], idx - split, out);
            out.push(ProofNode {
                left: true,
                hash: Self::range_root(&leaves[..split]),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(i: u64) -> Hash {
        Hasher::new().chain("leaf").chain(&i).finalize()
    }

    fn mmr(n: u64) -> Mmr {
        let mut m = Mmr::new();
        for i in 0..n {
            m.append(leaf(i));
        }
        m
    }

    #[test]
    fn singleton_root_is_the_leaf() {
        assert_eq!(mmr(1).root(), leaf(0));
    }

    #[test]
    fn two_leaves_join() {
        assert_eq!(mmr(2).root(), hash_join(&leaf(0), &leaf(1)));
    }

    #[test]
    fn three_leaves_fold_right() {
        let expected = hash_join(&hash_join(&leaf(0), &leaf(1)), &leaf(2));
        assert_eq!(mmr(3).root(), expected);
    }

    #[test]
    fn hard_proofs_verify_for_every_leaf() {
        for total in 1u64..=20 {
            let m = mmr(total);
            let root = m.root();
            for idx in 0..total {
                let proof = m.proof(idx).unwrap();
                let mut hver = HardVerifier::new(leaf(idx), &proof);
                assert!(hver.interpret_mmr(idx, total), "mmr({total}) leaf {idx}");
                assert!(hver.is_end());
                assert_eq!(hver.hv, root, "mmr({total}) leaf {idx}");
            }
        }
    }

    #[test]
    fn node_proofs_verify_for_every_leaf() {
        for total in 1u64..=16 {
            let m = mmr(total);
            let root = m.root();
            for idx in 0..total {
                let proof = m.node_proof(idx).unwrap();
                let mut hv = leaf(idx);
                interpret(&mut hv, &proof);
                assert_eq!(hv, root, "mmr({total}) leaf {idx}");
            }
        }
    }

    #[test]
    fn wrong_leaf_fails() {
        let m = mmr(7);
        let proof = m.proof(3).unwrap();
        let mut hver = HardVerifier::new(leaf(4), &proof);
        assert!(hver.interpret_mmr(3, 7));
        assert!(hver.is_end());
        assert_ne!(hver.hv, m.root());
    }

    #[test]
    fn out_of_range_rejected() {
        let m = mmr(5);
        assert!(m.proof(5).is_none());

        let proof = m.proof(0).unwrap();
        let mut hver = HardVerifier::new(leaf(0), &proof);
        assert!(!hver.interpret_mmr(5, 5));
        assert!(!hver.interpret_mmr(0, 0));
    }

    #[test]
    fn truncated_proof_rejected() {
        let m = mmr(9);
        let mut proof = m.proof(2).unwrap();
        proof.pop();
        let mut hver = HardVerifier::new(leaf(2), &proof);
        assert!(!hver.interpret_mmr(2, 9));
    }

    proptest! {
        #[test]
        fn proof_roundtrip(total in 1u64..200, seed in 0u64..1000) {
            let idx = seed % total;
            let m = mmr(total);
            let proof = m.proof(idx).unwrap();
            let mut hver = HardVerifier::new(leaf(idx), &proof);
            prop_assert!(hver.interpret_mmr(idx, total));
            prop_assert!(hver.is_end());
            prop_assert_eq!(hver.hv, m.root());
        }
    }
}
