// Copyright (c) 2024 The Umbra Project Developers

//! Validation context: the signed excess sum over a transaction or block
//! body.
//!
//! The walk accumulates `sigma = sum(outputs) - sum(inputs) +
//! sum(kernel excess) - offset * G`. A valid transaction satisfies
//! `sigma + fee * H = 0` (the value deficit pays the fee); a valid block
//! satisfies `sigma = coinbase * H` (the surplus is the subsidy) with the
//! subsidy capped by the emission schedule. The sum is associative, so the
//! walk order never matters; element order is still enforced because hashes
//! and cut-through depend on it.

use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::Identity};
use umbra_crypto_keys::{generators::GEN_G, import};

use crate::{
    amount::add_value_wide,
    error::{TransactionValidationError, TransactionValidationResult},
    height::{HeightRange, Height},
    rules::{Rules, HEIGHT_GENESIS},
    stats::TxStats,
    transaction::{Transaction, TxReader},
};

/// Validation mode switches.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextParams {
    /// Block mode: balance against the coinbase subsidy instead of the fee.
    pub block_mode: bool,
}

/// Running validation state over one element walk.
pub struct Context<'a> {
    rules: &'a Rules,
    params: ContextParams,
    /// The height range the elements must all be valid in. Callers narrow
    /// it before the walk (block range / scheme height); kernels narrow it
    /// further.
    pub height: HeightRange,
    sigma: RistrettoPoint,
    stats: TxStats,
}

impl<'a> Context<'a> {
    /// Fresh context over a rule set.
    pub fn new(rules: &'a Rules, params: ContextParams) -> Self {
        Self {
            rules,
            params,
            height: HeightRange::default(),
            sigma: RistrettoPoint::identity(),
            stats: TxStats::default(),
        }
    }

    /// Statistics gathered during the walk.
    pub fn stats(&self) -> &TxStats {
        &self.stats
    }

    /// The scheme height all fork gating evaluates at.
    pub fn scheme_height(&self) -> Height {
        self.height.min
    }

    /// Walk all element streams, checking order and element validity and
    /// summing excesses. May be called repeatedly to aggregate bodies.
    pub fn validate_and_summarize<R: TxReader + Clone>(
        &mut self,
        offset: &Scalar,
        reader: &mut R,
    ) -> TransactionValidationResult<()> {
        reader.reset();

        // Kernels first: they narrow the height range and with it the
        // scheme height everything else is gated on. A lagging reader clone
        // keeps the previous kernel in reach for the order check.
        let mut kernel_range = HeightRange::default();
        let mut lag: Option<R> = None;
        while let Some(krn) = reader.kernel() {
            if let Some(prev) = lag.as_ref().and_then(R::kernel) {
                if prev.cmp_order(krn, self.rules) == core::cmp::Ordering::Greater {
                    return Err(TransactionValidationError::Unsorted);
                }
            }
            kernel_range.intersect(&krn.height);
            lag = Some(reader.clone());
            reader.next_kernel();
        }

        self.height.intersect(&kernel_range);
        if self.height.is_empty() {
            return Err(TransactionValidationError::InvalidHeightRange);
        }
        let h_scheme = self.height.min;

        reader.reset();
        while let Some(krn) = reader.kernel() {
            krn.is_valid(h_scheme, self.rules, &mut self.sigma, None)?;
            krn.add_stats(&mut self.stats);
            reader.next_kernel();
        }

        // Inputs subtract. Order is non-descending by commitment.
        let mut input_comms: alloc::vec::Vec<[u8; 32]> = alloc::vec::Vec::new();
        while let Some(input) = reader.utxo_in() {
            let comm = *input.commitment.as_bytes();
            if let Some(prev) = input_comms.last() {
                if prev > &comm {
                    return Err(TransactionValidationError::Unsorted);
                }
            }
            input_comms.push(comm);

            let pt = import(&input.commitment)
                .map_err(|_| TransactionValidationError::PointImport)?;
            self.sigma -= pt;
            input.add_stats(&mut self.stats);
            reader.next_utxo_in();
        }

        // Outputs add, and each must carry a valid proof. An output
        // sharing a commitment with an input means cut-through was skipped.
        let mut prev_out: Option<[u8; 32]> = None;
        while let Some(output) = reader.utxo_out() {
            let comm = *output.commitment.as_bytes();
            if let Some(prev) = prev_out {
                if prev > comm {
                    return Err(TransactionValidationError::Unsorted);
                }
            }
            prev_out = Some(comm);
            if input_comms.binary_search(&comm).is_ok() {
                return Err(TransactionValidationError::CutThroughRequired);
            }

            let pt = output.is_valid(h_scheme, self.rules)?;
            self.sigma += pt;
            output.add_stats(&mut self.stats);
            reader.next_utxo_out();
        }

        self.sigma -= *GEN_G * offset;
        Ok(())
    }

    /// Transaction-boundary identity: the value deficit equals the fee.
    pub fn is_valid_transaction(&self) -> TransactionValidationResult<()> {
        debug_assert!(!self.params.block_mode);
        let mut sigma = self.sigma;
        add_value_wide(&mut sigma, None, self.stats.fee);
        if sigma != RistrettoPoint::identity() {
            return Err(TransactionValidationError::ImbalancedTransaction);
        }
        Ok(())
    }

    /// Block-boundary identity: the value surplus equals the coinbase
    /// subsidy, and the subsidy respects the emission schedule.
    pub fn is_valid_block(&self) -> TransactionValidationResult<()> {
        debug_assert!(self.params.block_mode);
        let mut expected = RistrettoPoint::identity();
        add_value_wide(&mut expected, None, self.stats.coinbase);
        if self.sigma != expected {
            return Err(TransactionValidationError::ImbalancedBlock);
        }

        if self.stats.coinbase > self.rules.emission_range(&self.height) {
            return Err(TransactionValidationError::ExcessCoinbase);
        }
        Ok(())
    }
}

impl Transaction {
    /// Validate this transaction standalone at the given height range.
    pub fn is_valid(&self, rules: &Rules, hr: HeightRange) -> TransactionValidationResult<()> {
        let mut ctx = Context::new(rules, ContextParams::default());
        ctx.height = hr;
        ctx.validate_and_summarize(&self.offset, &mut self.reader())?;
        ctx.is_valid_transaction()
    }

    /// Validate this bundle as a block body for the given height range.
    pub fn is_valid_as_block(
        &self,
        rules: &Rules,
        hr: HeightRange,
    ) -> TransactionValidationResult<()> {
        if hr.min < HEIGHT_GENESIS || hr.is_empty() {
            return Err(TransactionValidationError::InvalidHeightRange);
        }
        let mut ctx = Context::new(
            rules,
            ContextParams { block_mode: true },
        );
        ctx.height = hr;
        ctx.validate_and_summarize(&self.offset, &mut self.reader())?;
        ctx.is_valid_block()
    }
}
