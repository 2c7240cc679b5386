// Copyright (c) 2024 The Umbra Project Developers

//! The per-element fee schedule.

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    stats::TxStats,
    transaction::TxReader,
};

/// Fee pricing per transaction element.
///
/// Shielded elements are priced two orders of magnitude above plain ones:
/// their proofs dominate verification cost.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FeeSettings {
    /// Price per plain output.
    pub output: Amount,
    /// Price per kernel.
    pub kernel: Amount,
    /// Price per shielded input.
    pub shielded_input: Amount,
    /// Price per shielded output.
    pub shielded_output: Amount,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            output: 10,
            kernel: 10,
            shielded_input: 1000,
            shielded_output: 1000,
        }
    }
}

impl FeeSettings {
    /// The fee the schedule demands for the given statistics.
    pub fn calculate(&self, s: &TxStats) -> Amount {
        self.output
            .saturating_mul(s.outputs)
            .saturating_add(self.kernel.saturating_mul(s.kernels))
            .saturating_add(self.shielded_input.saturating_mul(s.inputs_shielded))
            .saturating_add(self.shielded_output.saturating_mul(s.outputs_shielded))
    }

    /// Gather statistics from a reader and price them.
    pub fn calculate_for(&self, reader: &mut impl TxReader) -> Amount {
        let mut s = TxStats::default();
        reader.add_stats(&mut s);
        self.calculate(&s)
    }
}
