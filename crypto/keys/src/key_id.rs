// Copyright (c) 2024 The Umbra Project Developers

//! Key identifiers: the (index, kind, sub-index, value) tuple a wallet uses
//! to deterministically re-derive an output's blinding factor.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::hash::{Absorb, Hash, Hasher, Sink};

/// Legacy identifier layout: the committed value does not enter the hash.
pub const SCHEME_V0: u32 = 0;
/// The V0 layout with the subkey coerced to the master (compatibility).
pub const SCHEME_BB21: u32 = 1;
/// Current layout: the value is bound into the identifier hash.
pub const SCHEME_V1: u32 = 2;

const SCHEME_SHIFT: u32 = 24;
const SUB_KEY_MASK: u32 = (1 << SCHEME_SHIFT) - 1;

/// What a derived key is used for, as a four-character code.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct KeyKind(pub u32);

const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

impl KeyKind {
    /// Coinbase reward output.
    pub const COINBASE: KeyKind = KeyKind(fourcc(b"cbse"));
    /// Collected-fees output.
    pub const COMMISSION: KeyKind = KeyKind(fourcc(b"fees"));
    /// Kernel excess key.
    pub const KERNEL: KeyKind = KeyKind(fourcc(b"kern"));
    /// Ordinary wallet output.
    pub const REGULAR: KeyKind = KeyKind(fourcc(b"regl"));
    /// Change output.
    pub const CHANGE: KeyKind = KeyKind(fourcc(b"chng"));
    /// Treasury output.
    pub const TREASURY: KeyKind = KeyKind(fourcc(b"trsr"));
}

impl Absorb for KeyKind {
    fn absorb_to(&self, sink: &mut dyn Sink) {
        self.0.absorb_to(sink);
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.to_le_bytes() {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

/// A key identifier without a committed value.
///
/// The top byte of `sub_idx` carries the derivation scheme; the low 24 bits
/// select the child subkey.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct KeyId {
    /// Per-kind index, typically a height or a sequence number.
    pub idx: u64,
    /// Key usage kind.
    pub kind: KeyKind,
    /// Scheme byte plus 24-bit subkey.
    pub sub_idx: u32,
}

impl KeyId {
    /// Build an identifier under the current scheme.
    pub fn new(idx: u64, kind: KeyKind, sub_key: u32) -> Self {
        let mut id = Self {
            idx,
            kind,
            sub_idx: 0,
        };
        id.set_sub_key(sub_key, SCHEME_V1);
        id
    }

    /// The 24-bit subkey selector.
    pub fn sub_key(&self) -> u32 {
        self.sub_idx & SUB_KEY_MASK
    }

    /// The derivation scheme byte.
    pub fn scheme(&self) -> u32 {
        self.sub_idx >> SCHEME_SHIFT
    }

    /// Overwrite subkey and scheme.
    pub fn set_sub_key(&mut self, sub_key: u32, scheme: u32) {
        self.sub_idx = (sub_key & SUB_KEY_MASK) | (scheme << SCHEME_SHIFT);
    }

    /// Identifier hash, legacy (value-free) layout.
    pub fn hash(&self) -> Hash {
        Hasher::new()
            .chain("kid")
            .chain(&self.idx)
            .chain(&self.kind)
            .chain(&self.sub_idx)
            .finalize()
    }
}

/// A key identifier together with the committed value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct KeyIdValue {
    /// The identifier.
    pub id: KeyId,
    /// The committed value.
    pub value: u64,
}

impl KeyIdValue {
    /// Build an identifier under the current scheme.
    pub fn new(value: u64, idx: u64, kind: KeyKind, sub_key: u32) -> Self {
        Self {
            id: KeyId::new(idx, kind, sub_key),
            value,
        }
    }

    /// Identifier hash, dispatched on the scheme byte.
    ///
    /// V1 binds the value, making it infeasible to claim a different amount
    /// without knowing the blinding factor. V0 and BB21 keep the historical
    /// layouts for outputs created before the switch.
    pub fn hash(&self) -> Hash {
        match self.id.scheme() {
            SCHEME_V0 => self.id.hash(),
            SCHEME_BB21 => {
                let mut id = self.id;
                id.set_sub_key(self.id.sub_key(), SCHEME_V0);
                id.hash()
            }
            _ => Hasher::new()
                .chain("kidv-1")
                .chain(&self.id.idx)
                .chain(&self.id.kind)
                .chain(&self.id.sub_idx)
                .chain(&self.value)
                .finalize(),
        }
    }
}
