// Copyright (c) 2024 The Umbra Project Developers

//! Transaction statistics accumulator.

use core::ops::AddAssign;
use serde::{Deserialize, Serialize};

use crate::amount::AmountBig;

/// Running counters over a set of transaction elements.
///
/// Fee and coinbase totals are wide: a block aggregates many transactions
/// and the sums can exceed 64 bits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxStats {
    /// Sum of kernel fees.
    pub fee: AmountBig,
    /// Sum of coinbase output values.
    pub coinbase: AmountBig,
    /// Kernel count, nested included.
    pub kernels: u64,
    /// Input count.
    pub inputs: u64,
    /// Output count.
    pub outputs: u64,
    /// Shielded input count.
    pub inputs_shielded: u64,
    /// Shielded output count.
    pub outputs_shielded: u64,
}

impl TxStats {
    /// Zero all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl AddAssign<&TxStats> for TxStats {
    fn add_assign(&mut self, s: &TxStats) {
        self.fee += s.fee;
        self.coinbase += s.coinbase;
        self.kernels += s.kernels;
        self.inputs += s.inputs;
        self.outputs += s.outputs;
        self.inputs_shielded += s.inputs_shielded;
        self.outputs_shielded += s.outputs_shielded;
    }
}
