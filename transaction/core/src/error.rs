// Copyright (c) 2024 The Umbra Project Developers

use displaydoc::Display;
use serde::{Deserialize, Serialize};
use umbra_crypto_keys::KeyError;

/// Type alias for transaction validation results.
pub type TransactionValidationResult<T> = Result<T, TransactionValidationError>;

/// Reasons why a transaction element, transaction or block body may fail to
/// be valid.
#[derive(Clone, Debug, Display, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum TransactionValidationError {
    /// Element is not supported at the queried scheme height
    UnsupportedAtHeight,

    /// A curve point failed to import
    PointImport,

    /// A signature did not verify
    InvalidSignature,

    /// A range proof was rejected
    InvalidRangeProof,

    /// A shielded serial failed its internal validity check
    InvalidSerial,

    /// A nested kernel's height range escapes its parent's
    NestedRangeEscape,

    /// A kernel appears nested without its embed flag
    EmbedFlagMissing,

    /// Elements are out of canonical order
    Unsorted,

    /// An input and an output share a commitment (cut-through not performed)
    CutThroughRequired,

    /// A coinbase output must carry a public proof
    CoinbaseNotPublic,

    /// A public proof is present without permission
    PublicUtxoNotAllowed,

    /// An output must carry exactly one range proof
    ProofShapeInvalid,

    /// Asset emission with a zero asset id or zero value
    InvalidAssetEmission,

    /// The combined kernel height range is empty or below genesis
    InvalidHeightRange,

    /// The excess sum does not balance against the fee
    ImbalancedTransaction,

    /// The excess sum does not balance against the coinbase subsidy
    ImbalancedBlock,

    /// The coinbase subsidy exceeds the allowed emission
    ExcessCoinbase,
}

impl From<KeyError> for TransactionValidationError {
    fn from(src: KeyError) -> Self {
        match src {
            KeyError::InvalidSignature => Self::InvalidSignature,
            _ => Self::PointImport,
        }
    }
}
