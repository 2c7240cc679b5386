// Copyright (c) 2024 The Umbra Project Developers

//! Whole-transaction validation scenarios.

use curve25519_dalek::traits::Identity;
use rand::{rngs::StdRng, SeedableRng};
use umbra_transaction_core::{
    add_value, generators::GEN_G, AssetId, FeeSettings, HKdf, Hash, HeightRange, Input, Kernel,
    KernelAssetEmit, KernelShieldedInput, KernelVariant, KeyIdValue, KeyKind, Output,
    RistrettoPoint, Rules, Scalar, SpendProof, Transaction, TransactionValidationError, TxReader,
    TxStats, MAX_HEIGHT,
};

fn rng() -> StdRng {
    SeedableRng::from_seed([21u8; 32])
}

fn coin_kdf() -> HKdf {
    HKdf::from_seed(b"validation scenario coin keys")
}

fn tag_kdf() -> HKdf {
    HKdf::from_seed(b"validation scenario tag keys")
}

fn rules() -> Rules {
    let mut r = Rules::default();
    r.forks[1].height = 10;
    r.forks[2].height = 20;
    r.ca.deposit = false;
    r.update_checksum().unwrap();
    r
}

/// An output generated from the wallet KDFs, with its blinding scalar.
fn make_output(rules: &Rules, value: u64, idx: u64, asset_id: AssetId) -> (Output, Scalar) {
    let kidv = KeyIdValue::new(value, idx, KeyKind::REGULAR, 0);
    let mut output = Output {
        asset_id,
        ..Default::default()
    };
    let sk = output
        .generate(
            25,
            rules,
            &coin_kdf(),
            &tag_kdf().public(),
            &kidv,
            false,
            &mut rng(),
        )
        .unwrap();
    (output, sk)
}

#[test]
fn wallet_transfer_balances() {
    let rules = rules();

    // The sender spends a 1000 output into a 600 payment, a 300 change
    // output and a 100 fee.
    let sk_in = Scalar::from(4242u64);
    let mut in_comm = *GEN_G * sk_in;
    add_value(&mut in_comm, None, 1000);

    let (pay, sk_pay) = make_output(&rules, 600, 1, AssetId::NATIVE);
    let (change, sk_change) = make_output(&rules, 300, 2, AssetId::NATIVE);

    let sk_kernel = Scalar::from(777u64);
    let mut kernel = Kernel::new_std(100, HeightRange::new(25, MAX_HEIGHT));
    kernel.sign(&sk_kernel);

    let mut tx = Transaction {
        inputs: vec![Input::new(in_comm.compress())],
        outputs: vec![pay, change],
        kernels: vec![kernel],
        offset: sk_pay + sk_change - sk_in + sk_kernel,
    };
    tx.normalize(&rules);

    tx.is_valid(&rules, HeightRange::default()).unwrap();

    // Any imbalance is caught.
    tx.offset += Scalar::ONE;
    assert_eq!(
        tx.is_valid(&rules, HeightRange::default()),
        Err(TransactionValidationError::ImbalancedTransaction)
    );
}

#[test]
fn wrong_fee_imbalances() {
    let rules = rules();
    let (out, sk_out) = make_output(&rules, 500, 1, AssetId::NATIVE);

    let sk_in = Scalar::from(9u64);
    let mut in_comm = *GEN_G * sk_in;
    add_value(&mut in_comm, None, 600); // pays 100 of fee

    let sk_kernel = Scalar::from(11u64);
    let mut kernel = Kernel::new_std(50, HeightRange::new(25, MAX_HEIGHT));
    kernel.sign(&sk_kernel);

    let mut tx = Transaction {
        inputs: vec![Input::new(in_comm.compress())],
        outputs: vec![out],
        kernels: vec![kernel],
        offset: sk_out - sk_in + sk_kernel,
    };
    tx.normalize(&rules);

    // The kernel declares 50 but the value deficit is 100.
    assert_eq!(
        tx.is_valid(&rules, HeightRange::default()),
        Err(TransactionValidationError::ImbalancedTransaction)
    );
}

#[test]
fn merge_and_cut_through() {
    let rules = rules();

    // Transaction A creates O1 and O2.
    let (o1, _sk1) = make_output(&rules, 100, 1, AssetId::NATIVE);
    let (o2, _sk2) = make_output(&rules, 200, 2, AssetId::NATIVE);
    let mut a = Transaction::default();
    a.outputs = vec![o1.clone(), o2.clone()];

    // Transaction B spends O1 into O3.
    let (o3, _sk3) = make_output(&rules, 100, 3, AssetId::NATIVE);
    let mut b = Transaction::default();
    b.inputs = vec![Input::new(o1.commitment)];
    b.outputs = vec![o3.clone()];

    a.merge(b);
    let removed = a.normalize(&rules);

    assert_eq!(removed, 1);
    assert!(a.inputs.is_empty());
    assert_eq!(a.outputs.len(), 2);
    assert!(a.outputs.contains(&o2));
    assert!(a.outputs.contains(&o3));
}

#[test]
fn unnormalized_pair_is_rejected() {
    let rules = rules();
    let (o1, sk1) = make_output(&rules, 100, 1, AssetId::NATIVE);

    // The same commitment as input and output, no cut-through.
    let mut tx = Transaction::default();
    tx.inputs = vec![Input::new(o1.commitment)];
    tx.outputs = vec![o1];
    tx.offset = Scalar::ZERO;
    let _ = sk1;

    assert_eq!(
        tx.is_valid(&rules, HeightRange::default()),
        Err(TransactionValidationError::CutThroughRequired)
    );
}

#[test]
fn asset_mint_balances() {
    let rules = rules();

    let sk_asset = Scalar::from(31337u64);
    let asset_id = AssetId(Hash((*GEN_G * sk_asset).compress().to_bytes()));

    let value = 500u64;
    let (out, sk_out) = make_output(&rules, value, 1, asset_id);

    let sk_kernel = Scalar::from(55u64);
    let mut kernel = Kernel::from_variant(
        KernelVariant::AssetEmit(KernelAssetEmit {
            asset_id,
            value: value as i64,
            ..Default::default()
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );
    kernel.sign_asset_emit(&sk_kernel, &sk_asset);

    let mut tx = Transaction {
        inputs: vec![],
        outputs: vec![out],
        kernels: vec![kernel],
        offset: sk_out + sk_kernel,
    };
    tx.normalize(&rules);

    tx.is_valid(&rules, HeightRange::default()).unwrap();
}

#[test]
fn asset_burn_balances() {
    let rules = rules();

    let sk_asset = Scalar::from(31337u64);
    let asset_id = AssetId(Hash((*GEN_G * sk_asset).compress().to_bytes()));
    let h_asset = umbra_transaction_core::asset_generator(&asset_id).unwrap();

    // An input holding 200 of the asset gets burned.
    let value = 200u64;
    let sk_in = Scalar::from(17u64);
    let mut in_comm = *GEN_G * sk_in;
    add_value(&mut in_comm, Some(&h_asset), value);

    let sk_kernel = Scalar::from(23u64);
    let mut kernel = Kernel::from_variant(
        KernelVariant::AssetEmit(KernelAssetEmit {
            asset_id,
            value: -(value as i64),
            ..Default::default()
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );
    kernel.sign_asset_emit(&sk_kernel, &sk_asset);

    let mut tx = Transaction {
        inputs: vec![Input::new(in_comm.compress())],
        outputs: vec![],
        kernels: vec![kernel],
        offset: sk_kernel - sk_in,
    };
    tx.normalize(&rules);

    tx.is_valid(&rules, HeightRange::default()).unwrap();
}

#[test]
fn asset_emit_requires_fork2_and_feature() {
    let mut rules = rules();
    rules.forks[2].height = MAX_HEIGHT;
    rules.update_checksum().unwrap();

    let sk_asset = Scalar::from(31337u64);
    let asset_id = AssetId(Hash((*GEN_G * sk_asset).compress().to_bytes()));

    let mut kernel = Kernel::from_variant(
        KernelVariant::AssetEmit(KernelAssetEmit {
            asset_id,
            value: 10,
            ..Default::default()
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );
    kernel.sign_asset_emit(&Scalar::from(55u64), &sk_asset);

    let mut exc = RistrettoPoint::identity();
    assert_eq!(
        kernel.is_valid(25, &rules, &mut exc, None),
        Err(TransactionValidationError::UnsupportedAtHeight)
    );
}

#[test]
fn asset_emit_rejects_zero_value_and_zero_id() {
    let rules = rules();

    let sk_asset = Scalar::from(31337u64);
    let asset_id = AssetId(Hash((*GEN_G * sk_asset).compress().to_bytes()));

    for (id, value) in [(asset_id, 0i64), (AssetId::NATIVE, 10i64)] {
        let mut kernel = Kernel::from_variant(
            KernelVariant::AssetEmit(KernelAssetEmit {
                asset_id: id,
                value,
                ..Default::default()
            }),
            0,
            HeightRange::new(25, MAX_HEIGHT),
        );
        kernel.sign_asset_emit(&Scalar::from(55u64), &sk_asset);

        let mut exc = RistrettoPoint::identity();
        assert_eq!(
            kernel.is_valid(25, &rules, &mut exc, None),
            Err(TransactionValidationError::InvalidAssetEmission)
        );
    }
}

#[test]
fn asset_deposit_locks_native_value() {
    let mut rules = rules();
    rules.ca.deposit = true;
    rules.update_checksum().unwrap();

    let sk_asset = Scalar::from(31337u64);
    let asset_id = AssetId(Hash((*GEN_G * sk_asset).compress().to_bytes()));
    let h_asset = umbra_transaction_core::asset_generator(&asset_id).unwrap();

    let sk_kernel = Scalar::from(55u64);
    let value = 40u64;
    let mut kernel = Kernel::from_variant(
        KernelVariant::AssetEmit(KernelAssetEmit {
            asset_id,
            value: value as i64,
            ..Default::default()
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );
    kernel.sign_asset_emit(&sk_kernel, &sk_asset);

    let mut exc = RistrettoPoint::identity();
    kernel.is_valid(25, &rules, &mut exc, None).unwrap();

    // Minting the asset subtracts asset value and locks native value.
    let mut expected = *GEN_G * sk_kernel;
    let gen = -h_asset + *umbra_transaction_core::generators::GEN_H;
    add_value(&mut expected, Some(&gen), value);
    assert_eq!(exc, expected);
}

#[test]
fn shielded_input_negates_commitment() {
    let rules = rules();

    let value = 700u64;
    let sk_pool = Scalar::from(4040u64);
    let mut pool_comm = *GEN_G * sk_pool;
    add_value(&mut pool_comm, None, value);

    let kernel = Kernel::from_variant(
        KernelVariant::ShieldedInput(KernelShieldedInput {
            window_end: 12,
            spend_proof: SpendProof {
                commitment: pool_comm.compress(),
                ..Default::default()
            },
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );

    // The commitment enters the excess negated.
    let mut exc = RistrettoPoint::identity();
    kernel.is_valid(25, &rules, &mut exc, None).unwrap();
    assert_eq!(exc, -pool_comm);

    // And a matching transparent output balances the withdrawal.
    let (out, sk_out) = make_output(&rules, value, 1, AssetId::NATIVE);
    let mut tx = Transaction {
        inputs: vec![],
        outputs: vec![out],
        kernels: vec![kernel],
        offset: sk_out - sk_pool,
    };
    tx.normalize(&rules);
    tx.is_valid(&rules, HeightRange::default()).unwrap();
}

#[test]
fn shielded_output_roundtrip() {
    use umbra_transaction_core::{
        CreatorParams, KernelShieldedOutput, Oracle, RangeProofConfidential, ShieldedSerial,
        ShieldedTxo,
    };

    let rules = rules();

    let value = 250u64;
    let sk_txo = Scalar::from(808080u64);
    let mut comm = *GEN_G * sk_txo;
    add_value(&mut comm, None, value);

    let serial = ShieldedSerial::create(&Scalar::from(121212u64));
    let kidv = KeyIdValue::new(value, 1, KeyKind::REGULAR, 0);
    let seed = Hash([5u8; 32]);
    let cp = CreatorParams { kidv, seed };

    // The message covers the commitment and serial but not the range
    // proof, so the proof can be built against the final message after a
    // provisional one fills the slot.
    let provisional = RangeProofConfidential::create(
        &sk_txo,
        &cp,
        &mut Oracle::new(),
        None,
        &mut rng(),
    )
    .unwrap();

    let mut kernel = Kernel::from_variant(
        KernelVariant::ShieldedOutput(KernelShieldedOutput {
            txo: ShieldedTxo {
                commitment: comm.compress(),
                serial,
                range_proof: provisional,
            },
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );

    let msg = kernel.compute_msg();
    let proof = RangeProofConfidential::create(
        &sk_txo,
        &cp,
        &mut Oracle::new().chain(&msg),
        None,
        &mut rng(),
    )
    .unwrap();
    if let KernelVariant::ShieldedOutput(v) = &mut kernel.variant {
        v.txo.range_proof = proof;
    }
    kernel.update_id();

    let mut exc = RistrettoPoint::identity();
    kernel.is_valid(25, &rules, &mut exc, None).unwrap();
    assert_eq!(exc, comm);

    // A tampered serial is rejected before the proof is consulted.
    let mut bad = kernel.clone();
    if let KernelVariant::ShieldedOutput(v) = &mut bad.variant {
        v.txo.serial.serial_pub = (*GEN_G * Scalar::from(99u64)).compress();
    }
    let mut exc = RistrettoPoint::identity();
    assert_eq!(
        bad.is_valid(25, &rules, &mut exc, None),
        Err(TransactionValidationError::InvalidSerial)
    );
}

#[test]
fn shielded_gating_follows_feature_flag() {
    let mut rules = rules();
    rules.shielded.enabled = false;
    rules.update_checksum().unwrap();

    let kernel = Kernel::from_variant(
        KernelVariant::ShieldedInput(KernelShieldedInput {
            window_end: 0,
            spend_proof: SpendProof {
                commitment: (*GEN_G * Scalar::from(5u64)).compress(),
                ..Default::default()
            },
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );

    let mut exc = RistrettoPoint::identity();
    assert_eq!(
        kernel.is_valid(25, &rules, &mut exc, None),
        Err(TransactionValidationError::UnsupportedAtHeight)
    );
}

#[test]
fn fee_schedule_prices_a_transaction() {
    let rules = rules();
    let fees = FeeSettings::default();

    let (out, _sk) = make_output(&rules, 100, 1, AssetId::NATIVE);
    let mut kernel = Kernel::new_std(0, HeightRange::new(25, MAX_HEIGHT));
    kernel.sign(&Scalar::from(3u64));

    let shielded = Kernel::from_variant(
        KernelVariant::ShieldedInput(KernelShieldedInput {
            window_end: 0,
            spend_proof: SpendProof::default(),
        }),
        0,
        HeightRange::new(25, MAX_HEIGHT),
    );

    let mut tx = Transaction::default();
    tx.outputs = vec![out];
    tx.kernels = vec![kernel, shielded];
    tx.normalize(&rules);

    // One output, two kernels, one shielded input.
    assert_eq!(fees.calculate_for(&mut tx.reader()), 10 + 2 * 10 + 1000);

    let mut stats = TxStats::default();
    tx.reader().add_stats(&mut stats);
    assert_eq!(stats.inputs_shielded, 1);
    assert_eq!(stats.kernels, 2);
}

#[test]
fn normalization_orders_kernels_across_fork2() {
    let rules = rules();

    let mut pre = Kernel::new_std(0, HeightRange::new(5, MAX_HEIGHT));
    pre.sign(&Scalar::from(1u64));
    let mut post_a = Kernel::new_std(0, HeightRange::new(25, MAX_HEIGHT));
    post_a.sign(&Scalar::from(2u64));
    let mut post_b = Kernel::new_std(0, HeightRange::new(25, MAX_HEIGHT));
    post_b.sign(&Scalar::from(3u64));

    let mut tx = Transaction::default();
    tx.kernels = vec![post_a, pre, post_b];
    tx.normalize(&rules);

    // The pre-fork2 kernel sorts first; the rest order by ID.
    assert_eq!(tx.kernels[0].height.min, 5);
    assert!(tx.kernels[1].id() <= tx.kernels[2].id());
}
