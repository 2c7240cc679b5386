// Copyright (c) 2024 The Umbra Project Developers

//! Transaction inputs.

use core::cmp::Ordering;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::CompressedRistretto;

use crate::{height::Height, stats::TxStats};

/// Node-side bookkeeping attached to an input. Not hashed, not ordered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct InputInternal {
    /// The spent TXO's sequential id.
    pub id: u64,
    /// Height at which the spent TXO matured.
    pub maturity: Height,
}

/// A transaction input: a reference to the UTXO it spends, by commitment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Input {
    /// Commitment of the spent output.
    pub commitment: CompressedRistretto,
    /// Bookkeeping, excluded from identity and ordering.
    pub internal: InputInternal,
}

impl Input {
    /// Input spending the output with the given commitment.
    pub fn new(commitment: CompressedRistretto) -> Self {
        Self {
            commitment,
            internal: InputInternal::default(),
        }
    }

    /// Count this element.
    pub fn add_stats(&self, s: &mut TxStats) {
        s.inputs += 1;
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new(CompressedRistretto::identity())
    }
}

impl PartialEq for Input {
    fn eq(&self, other: &Self) -> bool {
        self.commitment == other.commitment
    }
}

impl Eq for Input {}

impl PartialOrd for Input {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Input {
    fn cmp(&self, other: &Self) -> Ordering {
        self.commitment.as_bytes().cmp(other.commitment.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ignores_internal() {
        let mut a = Input::new(CompressedRistretto([1u8; 32]));
        let mut b = Input::new(CompressedRistretto([1u8; 32]));
        a.internal.id = 5;
        b.internal.maturity = 9;
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a, b);
    }

    #[test]
    fn order_follows_commitment_bytes() {
        let a = Input::new(CompressedRistretto([1u8; 32]));
        let b = Input::new(CompressedRistretto([2u8; 32]));
        assert!(a < b);
    }
}
