// Copyright (c) 2024 The Umbra Project Developers

//! Assembling the miner's own block elements: coinbase and fee outputs
//! plus the signing kernel.

use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use umbra_transaction_core::{
    Amount, HKdf, HKdfPub, Height, HeightRange, Kdf, Kernel, KeyId, KeyIdValue, KeyKind, Output,
    Rules, Transaction, TransactionValidationResult,
};

/// Builds the block-reward elements for one height.
///
/// Every derived blinding scalar accumulates into `offset`, which becomes
/// the block body's offset once the user transactions merge in.
pub struct BlockBuilder<'a> {
    sub_idx: u32,
    coin_kdf: &'a HKdf,
    tag_kdf: &'a HKdfPub,
    height: Height,
    /// Accumulated offset over all generated elements.
    pub offset: Scalar,
    /// The elements generated so far.
    pub body: Transaction,
}

impl<'a> BlockBuilder<'a> {
    /// A builder for one block at `height`.
    pub fn new(sub_idx: u32, coin_kdf: &'a HKdf, tag_kdf: &'a HKdfPub, height: Height) -> Self {
        Self {
            sub_idx,
            coin_kdf,
            tag_kdf,
            height,
            offset: Scalar::ZERO,
            body: Transaction::default(),
        }
    }

    /// Create the coinbase output (if the schedule still emits) and the
    /// block's signing kernel.
    pub fn add_coinbase_and_kernel<R: RngCore + CryptoRng>(
        &mut self,
        rules: &Rules,
        rng: &mut R,
    ) -> TransactionValidationResult<()> {
        let value = rules.emission_at(self.height);
        if value != 0 {
            let kidv = KeyIdValue::new(value, self.height, KeyKind::COINBASE, self.sub_idx);
            let mut output = Output {
                coinbase: true,
                ..Default::default()
            };
            let sk = output.generate(
                self.height,
                rules,
                &self.coin_kdf.for_key_id(&kidv),
                self.tag_kdf,
                &kidv,
                false,
                rng,
            )?;
            self.offset += sk;
            self.body.outputs.push(output);
        }

        let mut kernel = Kernel::new_std(0, HeightRange::new(self.height, umbra_transaction_core::MAX_HEIGHT));
        let sk = self
            .coin_kdf
            .derive_scalar(&KeyId::new(self.height, KeyKind::KERNEL, self.sub_idx).hash());
        kernel.sign(&sk);
        self.offset += sk;
        self.body.kernels.push(kernel);

        Ok(())
    }

    /// Create the commission output collecting `fees`.
    pub fn add_fees<R: RngCore + CryptoRng>(
        &mut self,
        rules: &Rules,
        fees: Amount,
        rng: &mut R,
    ) -> TransactionValidationResult<()> {
        if fees == 0 {
            return Ok(());
        }

        let kidv = KeyIdValue::new(fees, self.height, KeyKind::COMMISSION, self.sub_idx);
        let mut output = Output::default();
        let sk = output.generate(
            self.height,
            rules,
            &self.coin_kdf.for_key_id(&kidv),
            self.tag_kdf,
            &kidv,
            false,
            rng,
        )?;
        self.offset += sk;
        self.body.outputs.push(output);
        Ok(())
    }

    /// Finish: the generated elements as a block body carrying the offset.
    pub fn into_body(mut self, rules: &Rules) -> Transaction {
        self.body.offset = self.offset;
        self.body.normalize(rules);
        self.body
    }
}

// Scenario coverage for the builder lives in tests/block_chain.rs.
