// Copyright (c) 2024 The Umbra Project Developers

//! Amount arithmetic and asset identifiers.

use core::fmt;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::{generators::GEN_H, Absorb, Hash, Sink};

/// A 64-bit amount in the smallest representable units.
pub type Amount = u64;

/// Wide arithmetic for emission totals and statistics.
pub type AmountBig = u128;

/// Fold `value * gen` into a running point sum. `None` selects the default
/// value generator `H`.
pub fn add_value(res: &mut RistrettoPoint, gen: Option<&RistrettoPoint>, value: Amount) {
    if value != 0 {
        *res += gen.unwrap_or(&GEN_H) * Scalar::from(value);
    }
}

/// Wide variant of [`add_value`]; the group order comfortably exceeds
/// `2^128`, so a single scalar multiply suffices.
pub fn add_value_wide(res: &mut RistrettoPoint, gen: Option<&RistrettoPoint>, value: AmountBig) {
    if value != 0 {
        *res += gen.unwrap_or(&GEN_H) * Scalar::from(value);
    }
}

/// A 32-byte asset identifier; zero denotes the native asset.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct AssetId(pub umbra_crypto_keys::Hash);

impl AssetId {
    /// The native-asset identifier.
    pub const NATIVE: AssetId = AssetId(Hash::ZERO);

    /// Whether this is the native asset.
    pub fn is_native(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Hash> for AssetId {
    fn from(src: Hash) -> Self {
        Self(src)
    }
}

impl Absorb for AssetId {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.0.absorb_to(sink);
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.0)
    }
}
