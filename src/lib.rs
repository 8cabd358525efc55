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

//! CipherSwap core library, coordination of cross-chain atomic swaps with hash time-locked
//! contracts and construction of Monero privacy transactions.
//!
//! - [`crypto`]: Ed25519 primitives, hashing to scalars and points, hash-lock secrets.
//! - [`privacy`]: stealth addresses, key images, CLSAG and MLSAG ring signatures, Pedersen
//!   commitments, range proofs and balanced confidential transfers.
//! - [`htlc`]: lock, claim and refund on EVM chains and on Monero.
//! - [`swap`]: the session state machine and the coordinator driving both legs.
//!
//! Supporting modules: [`consensus`] strict binary encoding, [`blockchain`] chains, assets and
//! timelocks, [`rpc`] chain boundaries with retries and rate limiting, [`events`] lifecycle
//! events and [`config`] the coordinator configuration.

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;

use thiserror::Error;

#[macro_use]
pub mod consensus;

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod events;
pub mod htlc;
pub mod privacy;
pub mod rpc;
pub mod swap;

/// A list of possible errors when performing a swap or building a privacy transaction.
#[derive(Error, Debug)]
pub enum Error {
    /// A consensus error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus::Error),
    /// A cryptographic error.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::Error),
    /// A privacy transaction error.
    #[error("Privacy error: {0}")]
    Privacy(#[from] privacy::Error),
    /// A contract adapter error.
    #[error("HTLC error: {0}")]
    Htlc(#[from] htlc::Error),
    /// A chain RPC error.
    #[error("RPC error: {0}")]
    Rpc(#[from] rpc::Error),
    /// A swap error.
    #[error("Swap error: {0}")]
    Swap(#[from] swap::Error),
    /// A swap that ended failed.
    #[error("Swap failure: {0}")]
    Failure(#[from] Box<swap::SwapFailure>),
    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
}

/// Result type of the crate.
pub type Res<T> = Result<T, Error>;
