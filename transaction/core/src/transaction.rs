// Copyright (c) 2024 The Umbra Project Developers

//! Transactions: element bundles, streaming readers, normalization.

use alloc::vec::Vec;
use core::cmp::Ordering;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

use crate::{
    input::Input,
    kernel::Kernel,
    output::Output,
    rules::Rules,
    stats::TxStats,
};

/// A bundle of inputs, outputs and kernels plus the scalar offset.
///
/// Canonical form: all three vectors sorted, no input/output pair sharing a
/// commitment. [`Transaction::normalize`] establishes it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Spent UTXO references, sorted by commitment.
    pub inputs: Vec<Input>,
    /// Created UTXOs, sorted.
    pub outputs: Vec<Output>,
    /// Kernels, sorted.
    pub kernels: Vec<Kernel>,
    /// The blinding offset completing the balance identity.
    pub offset: Scalar,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            kernels: Vec::new(),
            offset: Scalar::ZERO,
        }
    }
}

impl Transaction {
    /// A cheap propagation key: the offset scalar. Proper transactions
    /// carry a non-trivial offset, so collisions merely cost propagation.
    pub fn key(&self) -> [u8; 32] {
        self.offset.to_bytes()
    }

    /// Move all elements of `other` into `self`, adding the offsets.
    pub fn merge(&mut self, other: Transaction) {
        let Transaction {
            inputs,
            outputs,
            kernels,
            offset,
        } = other;
        self.inputs.extend(inputs);
        self.outputs.extend(outputs);
        self.kernels.extend(kernels);
        self.offset += offset;
    }

    /// Sort all element vectors and perform input/output cut-through.
    ///
    /// Returns the number of eliminated pairs. Idempotent: a normal
    /// transaction comes back unchanged with a zero count.
    pub fn normalize(&mut self, rules: &Rules) -> usize {
        for krn in &mut self.kernels {
            krn.update_id();
        }
        self.kernels.sort_by(|a, b| a.cmp_order(b, rules));

        self.inputs.sort();
        self.outputs.sort();

        // Two-pointer sweep over the sorted vectors: equal commitments mark
        // an (input, output) pair for deletion.
        let mut del_in = alloc::vec![false; self.inputs.len()];
        let mut del_out = alloc::vec![false; self.outputs.len()];
        let mut deleted = 0usize;

        let mut i1 = 0usize;
        for (i0, input) in self.inputs.iter().enumerate() {
            while i1 < self.outputs.len() {
                let n = input
                    .commitment
                    .as_bytes()
                    .cmp(self.outputs[i1].commitment.as_bytes());
                match n {
                    Ordering::Less => break,
                    Ordering::Equal => {
                        del_in[i0] = true;
                        del_out[i1] = true;
                        deleted += 1;
                        i1 += 1;
                        break;
                    }
                    Ordering::Greater => i1 += 1,
                }
            }
        }

        if deleted > 0 {
            let mut keep_in = del_in.iter();
            self.inputs.retain(|_| !keep_in.next().unwrap());
            let mut keep_out = del_out.iter();
            self.outputs.retain(|_| !keep_out.next().unwrap());
        }

        deleted
    }

    /// A reader over this transaction's element streams.
    pub fn reader(&self) -> VecReader<'_> {
        VecReader::new(&self.inputs, &self.outputs, &self.kernels)
    }
}

/// Forward iteration over the three element streams of a transaction.
///
/// The streams advance independently; `reset` rewinds all three.
pub trait TxReader {
    /// Rewind every stream.
    fn reset(&mut self);

    /// Current input, if any.
    fn utxo_in(&self) -> Option<&Input>;
    /// Advance the input stream.
    fn next_utxo_in(&mut self);

    /// Current output, if any.
    fn utxo_out(&self) -> Option<&Output>;
    /// Advance the output stream.
    fn next_utxo_out(&mut self);

    /// Current kernel, if any.
    fn kernel(&self) -> Option<&Kernel>;
    /// Advance the kernel stream.
    fn next_kernel(&mut self);

    /// Accumulate statistics over all three streams. Rewinds first.
    fn add_stats(&mut self, s: &mut TxStats)
    where
        Self: Sized,
    {
        self.reset();
        while let Some(input) = self.utxo_in() {
            input.add_stats(s);
            self.next_utxo_in();
        }
        while let Some(output) = self.utxo_out() {
            output.add_stats(s);
            self.next_utxo_out();
        }
        while let Some(kernel) = self.kernel() {
            kernel.add_stats(s);
            self.next_kernel();
        }
    }
}

/// Element sink for assembling a transaction.
pub trait TxWriter {
    /// Append an input.
    fn write_input(&mut self, input: Input);
    /// Append an output.
    fn write_output(&mut self, output: Output);
    /// Append a kernel.
    fn write_kernel(&mut self, kernel: Kernel);
}

impl TxWriter for Transaction {
    fn write_input(&mut self, input: Input) {
        self.inputs.push(input);
    }

    fn write_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    fn write_kernel(&mut self, kernel: Kernel) {
        self.kernels.push(kernel);
    }
}

/// Reader over borrowed element vectors.
#[derive(Clone)]
pub struct VecReader<'a> {
    inputs: &'a [Input],
    outputs: &'a [Output],
    kernels: &'a [Kernel],
    idx: [usize; 3],
}

impl<'a> VecReader<'a> {
    /// Reader over the given streams, positioned at the start.
    pub fn new(inputs: &'a [Input], outputs: &'a [Output], kernels: &'a [Kernel]) -> Self {
        Self {
            inputs,
            outputs,
            kernels,
            idx: [0; 3],
        }
    }
}

impl TxReader for VecReader<'_> {
    fn reset(&mut self) {
        self.idx = [0; 3];
    }

    fn utxo_in(&self) -> Option<&Input> {
        self.inputs.get(self.idx[0])
    }

    fn next_utxo_in(&mut self) {
        self.idx[0] += 1;
    }

    fn utxo_out(&self) -> Option<&Output> {
        self.outputs.get(self.idx[1])
    }

    fn next_utxo_out(&mut self) {
        self.idx[1] += 1;
    }

    fn kernel(&self) -> Option<&Kernel> {
        self.kernels.get(self.idx[2])
    }

    fn next_kernel(&mut self) {
        self.idx[2] += 1;
    }
}

/// Subset comparison of two readers over sorted streams.
///
/// Returns `(i_cover, other_covers)`: whether every element of `other` is in
/// `self`, and vice versa. Both readers are rewound first.
pub fn compare_readers(
    a: &mut dyn TxReader,
    b: &mut dyn TxReader,
    rules: &Rules,
) -> (bool, bool) {
    let mut i_cover = true;
    let mut other_covers = true;
    a.reset();
    b.reset();

    // One merge pass per stream; on a tie both sides advance.
    macro_rules! sweep {
        ($cur:ident, $next:ident, $cmp:expr) => {
            loop {
                let Some(va) = a.$cur() else {
                    if b.$cur().is_some() {
                        i_cover = false;
                    }
                    break;
                };
                let Some(vb) = b.$cur() else {
                    other_covers = false;
                    break;
                };
                #[allow(clippy::redundant_closure_call)]
                let n: Ordering = ($cmp)(va, vb);
                if n == Ordering::Less {
                    other_covers = false;
                }
                if n == Ordering::Greater {
                    i_cover = false;
                }
                if n != Ordering::Greater {
                    a.$next();
                }
                if n != Ordering::Less {
                    b.$next();
                }
            }
        };
    }

    sweep!(utxo_in, next_utxo_in, |x: &Input, y: &Input| x.cmp(y));
    sweep!(utxo_out, next_utxo_out, |x: &Output, y: &Output| x
        .cmp_canonical(y));
    sweep!(kernel, next_kernel, |x: &Kernel, y: &Kernel| x
        .cmp_order(y, rules));

    (i_cover, other_covers)
}
