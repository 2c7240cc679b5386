// Copyright (c) 2024 The Umbra Project Developers

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error which can occur when handling curve material.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum KeyError {
    /// Point decompression failed or the point is the identity
    InvalidPoint,
    /// Signature verification failed
    InvalidSignature,
    /// Input length does not match the expected representation
    LengthMismatch,
}
