// Copyright (c) 2024 The Umbra Project Developers

//! Curve wrappers, transcript hashing, key derivation and Schnorr-style
//! signatures for the Umbra ledger.
//!
//! Everything in this crate is pure computation over Ristretto: no I/O, no
//! global state. Consensus code in `umbra-transaction-core` and
//! `umbra-blockchain-types` builds on the [`Absorb`] encoding defined here;
//! the byte sequence fed to a [`Hasher`] or [`Oracle`] is part of the chain
//! identity and must not change.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod error;
mod hash;
mod kdf;
mod key_id;
mod oracle;
mod signature;

pub mod generators;

pub use crate::{
    error::KeyError,
    hash::{Absorb, Hash, Hasher, Sink},
    kdf::{HKdf, HKdfPub, Kdf, PublicKdf},
    key_id::{KeyId, KeyIdValue, KeyKind, SCHEME_BB21, SCHEME_V0, SCHEME_V1},
    oracle::Oracle,
    signature::{DualSignature, Signature},
};

// The curve library is an external collaborator; consumers name its types
// through this crate so the binding lives in one place.
pub use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};

/// Import a compressed point, rejecting the identity ("import non-zero").
pub fn import_nnz(c: &CompressedRistretto) -> Result<RistrettoPoint, KeyError> {
    use curve25519_dalek::traits::IsIdentity;
    let pt = c.decompress().ok_or(KeyError::InvalidPoint)?;
    if pt.is_identity() {
        return Err(KeyError::InvalidPoint);
    }
    Ok(pt)
}

/// Import a compressed point, identity allowed.
pub fn import(c: &CompressedRistretto) -> Result<RistrettoPoint, KeyError> {
    c.decompress().ok_or(KeyError::InvalidPoint)
}
