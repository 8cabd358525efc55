// Copyright 2021-2022 CipherSwap Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Construction of RingCT style privacy transactions: stealth outputs, key images, CLSAG and
//! MLSAG ring signatures, Pedersen commitments and range proofs, and the [`TransferBuilder`] that
//! assembles them into a balanced transfer.
//!
//! Amounts are hidden in commitments `C = x·G + a·H` where `H` is [`crypto::H`]. The sum of the
//! pseudo output commitments of the inputs must equal the sum of the output commitments plus
//! `fee·H`.
//!
//! [`crypto::H`]: struct@crate::crypto::H

use std::error;

use thiserror::Error;

use crate::consensus;
use crate::crypto;

pub mod commitment;
pub mod range;
pub mod ring;
pub mod stealth;
pub mod transfer;

pub use commitment::{
    create_pedersen_commitment, verify_commitment_balance, Commitment, PedersenCommitment,
};
pub use range::{generate_range_proof, verify_range_proof, RangeProof};
pub use ring::{
    create_ring_signature, generate_key_image, select_ring, verify_ring_signature, KeyImage,
    RealInput, RingMember, RingSignature, RingSignatureKind,
};
pub use stealth::{
    derive_one_time_secret, generate_stealth_address, scan_output, StealthAddress, ViewKeys,
};
pub use transfer::{Destination, OutputSet, OwnedInput, Transfer, TransferBuilder, TransferOutput};

/// Number of decoys mixed with the real input when nothing else is configured.
pub const DEFAULT_MIXIN: usize = 16;
/// Smallest number of decoys accepted when signing, rings are at least `MIN_MIXIN + 1` wide.
pub const MIN_MIXIN: usize = 10;

/// Errors raised while building or verifying privacy transactions.
#[derive(Error, Debug)]
pub enum Error {
    /// Not enough distinct decoys to fill the ring.
    #[error("Not enough decoys: {required} required, {available} available")]
    InsufficientDecoys {
        /// Decoys needed.
        required: usize,
        /// Decoys found in the candidate pool.
        available: usize,
    },
    /// The input and output commitments do not balance.
    #[error("Commitments do not balance")]
    CommitmentImbalance,
    /// The real index is out of the ring or the signing key does not match the ring member.
    #[error("Invalid real index {0}")]
    InvalidRealIndex(usize),
    /// The key image is not the image of the signing key.
    #[error("The key image does not match the signing key")]
    InvalidKeyImage,
    /// The same key image is spent twice.
    #[error("Duplicate key image")]
    DuplicateKeyImage,
    /// The ring signature does not verify.
    #[error("The ring signature does not verify")]
    InvalidRingSignature,
    /// The range proof does not verify.
    #[error("The range proof does not verify")]
    InvalidRangeProof,
    /// The amount is outside of the range to prove.
    #[error("Amount {amount} outside of [{min}, {max}]")]
    AmountOutOfRange {
        /// Committed amount.
        amount: u64,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },
    /// The transfer has no inputs or no outputs.
    #[error("Transfer needs at least one input and one output")]
    EmptyTransfer,
    /// A curve element could not be decoded.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::Error),
    /// An encoding error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus::Error),
    /// Any privacy error not part of this list.
    #[error("Privacy error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new privacy error of type [`Self::Other`] with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }

    /// Consumes the `Error`, returning its inner error (if any).
    ///
    /// If this [`enum@Error`] was constructed via [`new`] then this function will return [`Some`],
    /// otherwise it will return [`None`].
    ///
    /// [`new`]: Error::new
    pub fn into_inner(self) -> Option<Box<dyn error::Error + Send + Sync>> {
        match self {
            Self::Other(error) => Some(error),
            _ => None,
        }
    }
}
