// Copyright (c) 2024 The Umbra Project Developers

//! Protocol parameters: emission, maturity, forks and the chain checksum.
//!
//! A [`Rules`] value is an immutable snapshot passed by reference into
//! every validation path. Mutation happens before any validation begins,
//! and [`Rules::update_checksum`] must run before the snapshot is consulted:
//! the fork hashes it computes are embedded into post-fork block hashes.

use alloc::string::String;
use core::fmt;
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{
    generators::{GEN_H, GEN_J},
    Absorb, Hash, Oracle, Sink,
};

use crate::{
    amount::{Amount, AmountBig},
    height::{Height, HeightRange, MAX_HEIGHT},
};

/// First block height; height 0 is the prehistoric (pre-chain) state.
pub const HEIGHT_GENESIS: Height = 1;

/// Smallest units per coin.
pub const COIN: Amount = 100_000_000;

/// Equihash parameter K.
pub const POW_K: u32 = 5;
/// Equihash parameter N.
pub const POW_N: u32 = 150;
/// Size of a packed Equihash solution in bytes.
pub const POW_SOLUTION_BYTES: usize = 104;
/// Size of the PoW nonce in bytes.
pub const POW_NONCE_BYTES: usize = 8;

/// Bumped whenever consensus behavior changes outside any listed parameter.
const PROTOCOL_VERSION: u32 = 3;

/// The emission curve: a flat head, then stepped decay.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EmissionSchedule {
    /// Per-block reward before the first drop.
    pub value0: Amount,
    /// Blocks until the first drop.
    pub drop0: Height,
    /// Length of each subsequent drop cycle.
    pub drop1: Height,
}

/// Spendability delays by output class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MaturitySettings {
    /// Blocks a coinbase output stays unspendable.
    pub coinbase: Height,
    /// Blocks a regular output stays unspendable.
    pub std: Height,
}

/// Difficulty-adjustment parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DaSettings {
    /// Target seconds per block.
    pub target_s: u32,
    /// Maximum tolerated timestamp lead, seconds.
    pub max_ahead_s: u32,
    /// Work-averaging window, blocks.
    pub window_work: u32,
    /// Outer timestamp-median window.
    pub window_median0: u32,
    /// Inner timestamp-median window.
    pub window_median1: u32,
    /// Packed initial difficulty.
    pub difficulty0_packed: u32,
    /// Damping numerator.
    pub damp_m: u32,
    /// Damping denominator.
    pub damp_n: u32,
}

/// Confidential-asset feature switches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CaSettings {
    /// Whether asset emission kernels validate at all.
    pub enabled: bool,
    /// Whether emission locks the native asset alongside.
    pub deposit: bool,
}

/// Shielded-pool feature switches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShieldedSettings {
    /// Whether shielded kernels validate at all.
    pub enabled: bool,
    /// Smallest allowed anonymity set.
    pub n_min: u32,
    /// Largest allowed anonymity set.
    pub n_max: u32,
    /// How far behind the pool head a spend window may start.
    pub max_window_backlog: u32,
}

/// A fork: the height it activates at and its parameter hash.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HeightHash {
    /// Activation height; `MAX_HEIGHT` marks an unscheduled fork.
    pub height: Height,
    /// Parameter checksum at this fork.
    pub hash: Hash,
}

impl fmt::Display for HeightHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.hash)
    }
}

impl Absorb for HeightHash {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.height.absorb_to(sink);
        self.hash.absorb_to(sink);
    }
}

/// Fatal rule-set misconfiguration.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum RulesError {
    /// Fork heights are not monotonically non-decreasing
    InconsistentForks,
}

/// The protocol parameter snapshot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    /// Emission curve.
    pub emission: EmissionSchedule,
    /// Maturity delays.
    pub maturity: MaturitySettings,
    /// Difficulty adjustment.
    pub da: DaSettings,
    /// Confidential assets.
    pub ca: CaSettings,
    /// Shielded pool.
    pub shielded: ShieldedSettings,
    /// Maximum serialized block body size.
    pub max_body_size: u32,
    /// Deepest permitted reorg.
    pub max_rollback: u32,
    /// Widest permitted kernel height range, in blocks.
    pub max_kernel_validity_dh: Height,
    /// Whether non-coinbase outputs may carry public proofs.
    pub allow_public_utxos: bool,
    /// Test mode: accept any proof of work.
    pub fake_pow: bool,
    /// Hash standing in for the nonexistent pre-genesis block.
    pub prehistoric: Hash,
    /// Checksum of the treasury plan.
    pub treasury_checksum: Hash,
    /// Fork table. `forks[0]` is the chain launch configuration.
    pub forks: [HeightHash; 3],
}

impl Default for Rules {
    fn default() -> Self {
        let mut forks = [HeightHash::default(); 3];
        forks[0].height = HEIGHT_GENESIS - 1;
        forks[1].height = 248_600;
        // Unscheduled until a later release pins it.
        forks[2].height = MAX_HEIGHT;

        Self {
            emission: EmissionSchedule {
                value0: COIN * 80,
                drop0: 525_600,
                drop1: 2_102_400,
            },
            maturity: MaturitySettings {
                coinbase: 240,
                std: 0,
            },
            da: DaSettings {
                target_s: 60,
                max_ahead_s: 7200,
                window_work: 120,
                window_median0: 25,
                window_median1: 7,
                difficulty0_packed: 22 << 24,
                damp_m: 1,
                damp_n: 3,
            },
            ca: CaSettings {
                enabled: true,
                deposit: true,
            },
            shielded: ShieldedSettings {
                enabled: true,
                n_min: 256,
                n_max: 65_536,
                max_window_backlog: 65_536,
            },
            max_body_size: 0x10_0000,
            max_rollback: 1440,
            max_kernel_validity_dh: 1440 * 30,
            allow_public_utxos: false,
            fake_pow: false,
            prehistoric: Hash([
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x6f, 0x41, 0x0c, 0x8b, 0x5d,
                0x9e, 0x2a, 0x77, 0x13, 0xd0, 0x4e, 0xbc, 0x38, 0x91, 0xa5, 0xe6, 0x72, 0x0f,
                0xc4, 0x59, 0x8d, 0x26, 0xb1, 0x44,
            ]),
            treasury_checksum: Hash([
                0x8a, 0x13, 0xf7, 0x25, 0x60, 0xd9, 0x4e, 0x01, 0xc2, 0x7f, 0x3b, 0x98, 0xa4,
                0x55, 0xee, 0x10, 0x09, 0x6d, 0x82, 0x47, 0xcb, 0x3e, 0xf1, 0x5a, 0x28, 0xd3,
                0x66, 0x0b, 0x94, 0xe7, 0x1c, 0xa9,
            ]),
            forks,
        }
    }
}

impl Rules {
    /// One step of the emission curve at height `h` starting from `base`:
    /// the per-block reward and the height at which it next changes.
    ///
    /// The strategy: full reward until `drop0`, then 1/2; from the second
    /// cycle an extra 1/4 of the base joins before the shift, producing the
    /// 5/8 kink; every further `drop1` cycle halves again.
    fn emission_step(&self, h: Height, base: Amount) -> (Amount, Height) {
        // Heights below genesis wrap to huge offsets and fall off the end
        // of the curve, which is the intended answer for them.
        let d = h.wrapping_sub(HEIGHT_GENESIS);

        if d < self.emission.drop0 {
            return (base, HEIGHT_GENESIS + self.emission.drop0);
        }

        let n = 1 + (d - self.emission.drop0) / self.emission.drop1;

        let bits_max = Amount::BITS as u64;
        if n >= bits_max {
            return (0, MAX_HEIGHT);
        }

        let h_end = HEIGHT_GENESIS
            .saturating_add(self.emission.drop0)
            .saturating_add(n.saturating_mul(self.emission.drop1));

        let mut base = base;
        if n >= 2 {
            base += base >> 2;
        }
        (base >> n, h_end)
    }

    /// Per-block reward at height `h`.
    pub fn emission_at(&self, h: Height) -> Amount {
        self.emission_step(h, self.emission.value0).0
    }

    /// Total emission over a height range, in wide arithmetic.
    pub fn emission_range(&self, hr: &HeightRange) -> AmountBig {
        let mut res: AmountBig = 0;
        if hr.is_empty() {
            return res;
        }

        let mut pos = hr.min;
        loop {
            let (current, h_end) = self.emission_step(pos, self.emission.value0);
            if current == 0 {
                break;
            }

            if hr.max < h_end {
                res += current as AmountBig * (hr.max - pos + 1) as AmountBig;
                break;
            }
            res += current as AmountBig * (h_end - pos) as AmountBig;
            pos = h_end;
        }
        res
    }

    /// Whether the fork table is well-formed.
    pub fn is_fork_heights_consistent(&self) -> bool {
        if self.forks[0].height != HEIGHT_GENESIS - 1 {
            return false;
        }
        self.forks.windows(2).all(|w| w[0].height <= w[1].height)
    }

    /// Recompute every fork hash from the full parameter set.
    ///
    /// Any parameter change, including future-fork parameters that later
    /// activate, alters the chain signature. Must be called before the
    /// rules are consulted in any validation; a non-monotonic fork table is
    /// a startup-fatal error.
    pub fn update_checksum(&mut self) -> Result<(), RulesError> {
        if !self.is_fork_heights_consistent() {
            return Err(RulesError::InconsistentForks);
        }

        // All parameters, constants included, in a frozen order. The
        // generator set stands in for the curve context.
        let mut oracle = Oracle::new()
            .chain(&*GEN_H)
            .chain(&*GEN_J)
            .chain(&self.prehistoric)
            .chain(&self.treasury_checksum)
            .chain(&HEIGHT_GENESIS)
            .chain(&COIN)
            .chain(&self.emission.value0)
            .chain(&self.emission.drop0)
            .chain(&self.emission.drop1)
            .chain(&self.maturity.coinbase)
            .chain(&self.maturity.std)
            .chain(&self.max_body_size)
            .chain(&self.fake_pow)
            .chain(&self.allow_public_utxos)
            .chain(&self.da.target_s)
            .chain(&self.da.max_ahead_s)
            .chain(&self.da.window_work)
            .chain(&self.da.window_median0)
            .chain(&self.da.window_median1)
            .chain(&self.da.difficulty0_packed)
            .chain(&self.max_rollback)
            .chain(&POW_K)
            .chain(&POW_N)
            .chain(&(POW_SOLUTION_BYTES as u32))
            .chain(&(POW_NONCE_BYTES as u32))
            .chain(&PROTOCOL_VERSION)
            .chain("umbra-mainnet");
        self.forks[0].hash = oracle.squeeze();

        oracle.absorb("fork1");
        oracle.absorb(&self.forks[1].height);
        oracle.absorb(&self.da.damp_m);
        oracle.absorb(&self.da.damp_n);
        self.forks[1].hash = oracle.squeeze();

        oracle.absorb("fork2");
        oracle.absorb(&self.forks[2].height);
        oracle.absorb(&self.max_kernel_validity_dh);
        oracle.absorb(&self.shielded.enabled);
        oracle.absorb(&self.shielded.n_min);
        oracle.absorb(&self.shielded.n_max);
        oracle.absorb(&self.shielded.max_window_backlog);
        oracle.absorb(&self.ca.enabled);
        oracle.absorb(&self.ca.deposit);
        self.forks[2].hash = oracle.squeeze();

        Ok(())
    }

    /// The index of the fork active at height `h`.
    pub fn fork_at(&self, h: Height) -> usize {
        for i in (0..self.forks.len()).rev() {
            if h >= self.forks[i].height {
                return i;
            }
        }
        0
    }

    /// Look a fork up by its parameter hash; unscheduled forks never match.
    pub fn find_fork_by_hash(&self, hv: &Hash) -> Option<&HeightHash> {
        self.forks
            .iter()
            .rev()
            .find(|f| f.height != MAX_HEIGHT && &f.hash == hv)
    }

    /// The last scheduled fork.
    pub fn last_fork(&self) -> &HeightHash {
        for f in self.forks.iter().rev() {
            if f.height != MAX_HEIGHT {
                return f;
            }
        }
        &self.forks[0]
    }

    /// Human-readable chain signature: the scheduled forks.
    pub fn signature_str(&self) -> String {
        use core::fmt::Write;
        let mut out = String::new();
        for f in self.forks.iter() {
            if f.height == MAX_HEIGHT {
                break;
            }
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "{f}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_rules() -> Rules {
        let mut r = Rules::default();
        r.emission = EmissionSchedule {
            value0: 1000,
            drop0: 10,
            drop1: 20,
        };
        r.forks[1].height = 100;
        r.forks[2].height = 200;
        r.update_checksum().unwrap();
        r
    }

    #[test]
    fn emission_head_is_flat() {
        let r = small_rules();
        assert_eq!(r.emission_at(HEIGHT_GENESIS), 1000);
        assert_eq!(r.emission_at(HEIGHT_GENESIS + 9), 1000);
        assert_eq!(r.emission_at(HEIGHT_GENESIS + 10), 500);
    }

    #[test]
    fn second_cycle_has_the_five_eighths_kink() {
        let r = small_rules();
        // n == 2: (1000 + 250) >> 2 == 312, i.e. 5/8 of the previous 500.
        assert_eq!(r.emission_at(HEIGHT_GENESIS + 10 + 20), 312);
    }

    #[test]
    fn emission_reaches_zero() {
        let r = small_rules();
        let far = HEIGHT_GENESIS + 10 + 64 * 20;
        assert_eq!(r.emission_at(far), 0);
        assert_eq!(r.emission_at(MAX_HEIGHT), 0);
    }

    #[test]
    fn pre_genesis_emission_is_zero() {
        let r = small_rules();
        assert_eq!(r.emission_at(0), 0);
    }

    #[test]
    fn range_emission_matches_pointwise_sum() {
        let r = small_rules();
        for (lo, hi) in [(1u64, 9), (1, 10), (5, 75), (1, 2000), (31, 31)] {
            let range = r.emission_range(&HeightRange::new(lo, hi));
            let pointwise: u128 = (lo..=hi).map(|h| r.emission_at(h) as u128).sum();
            assert_eq!(range, pointwise, "range [{lo}, {hi}]");
        }
    }

    #[test]
    fn empty_range_emits_nothing() {
        let r = small_rules();
        assert_eq!(r.emission_range(&HeightRange::new(10, 9)), 0);
    }

    #[test]
    fn checksum_is_deterministic() {
        let mut a = Rules::default();
        let mut b = Rules::default();
        a.update_checksum().unwrap();
        b.update_checksum().unwrap();
        assert_eq!(a.forks, b.forks);
    }

    #[test]
    fn checksum_sees_every_parameter() {
        let mut base = Rules::default();
        base.update_checksum().unwrap();

        let mut changed = Rules::default();
        changed.emission.value0 += 1;
        changed.update_checksum().unwrap();
        assert_ne!(base.forks[0].hash, changed.forks[0].hash);

        let mut changed = Rules::default();
        changed.fake_pow = true;
        changed.update_checksum().unwrap();
        assert_ne!(base.forks[0].hash, changed.forks[0].hash);

        // Fork2 parameters only move the fork2 hash.
        let mut changed = Rules::default();
        changed.shielded.n_min += 1;
        changed.update_checksum().unwrap();
        assert_eq!(base.forks[0].hash, changed.forks[0].hash);
        assert_eq!(base.forks[1].hash, changed.forks[1].hash);
        assert_ne!(base.forks[2].hash, changed.forks[2].hash);
    }

    #[test]
    fn non_monotonic_forks_are_fatal() {
        let mut r = Rules::default();
        r.forks[1].height = 100;
        r.forks[2].height = 50;
        assert_eq!(r.update_checksum(), Err(RulesError::InconsistentForks));
    }

    #[test]
    fn fork_zero_must_precede_genesis() {
        let mut r = Rules::default();
        r.forks[0].height = HEIGHT_GENESIS;
        assert_eq!(r.update_checksum(), Err(RulesError::InconsistentForks));
    }

    #[test]
    fn fork_lookup() {
        let r = small_rules();
        assert_eq!(r.fork_at(1), 0);
        assert_eq!(r.fork_at(100), 1);
        assert_eq!(r.fork_at(5000), 2);

        assert_eq!(r.find_fork_by_hash(&r.forks[2].hash).unwrap().height, 200);
        assert!(r.find_fork_by_hash(&Hash([9u8; 32])).is_none());
        assert_eq!(r.last_fork().height, 200);

        let r = Rules::default();
        // forks[2] is unscheduled in the default table.
        assert_eq!(r.last_fork().height, r.forks[1].height);
        assert!(r.find_fork_by_hash(&r.forks[2].hash).is_none());
    }

    #[test]
    fn signature_string_lists_scheduled_forks() {
        let r = small_rules();
        let s = r.signature_str();
        assert_eq!(s.matches(", ").count(), 2);
        assert!(s.starts_with("0-"));
    }

    proptest! {
        #[test]
        fn range_splits_add_up(mid in 1u64..500, hi in 500u64..3000) {
            let r = small_rules();
            let whole = r.emission_range(&HeightRange::new(1, hi));
            let left = r.emission_range(&HeightRange::new(1, mid));
            let right = r.emission_range(&HeightRange::new(mid + 1, hi));
            prop_assert_eq!(whole, left + right);
        }
    }
}
