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

//! One-time output keys derived from a recipient's public view and spend keys.
//!
//! The sender picks a transaction key `r` and publishes `R = r·G`. With the derivation
//! `D = 8·r·V` the output key is `P = Hs(D || varint(i))·G + S`. The recipient recomputes
//! `D = 8·v·R` with its private view key to detect the output and spends it with
//! `x = Hs(D || varint(i)) + s`.

use std::io;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use tracing::trace;

use crate::consensus::{self, Decodable, Encodable};
use crate::crypto::{self, hash_to_scalar, keccak256, random_scalar, scalar_multiply_base};
use crate::privacy::Error;

/// Public keys of a recipient wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewKeys {
    /// Public view key `V`.
    pub view: EdwardsPoint,
    /// Public spend key `S`.
    pub spend: EdwardsPoint,
}

impl ViewKeys {
    /// Extract the public view and spend keys of a Monero address.
    pub fn from_address(address: &monero::Address) -> Result<Self, Error> {
        Ok(Self {
            view: crypto::point_from_bytes(address.public_view.as_bytes())?,
            spend: crypto::point_from_bytes(address.public_spend.as_bytes())?,
        })
    }
}

/// A one-time destination, never reused across outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthAddress {
    /// One-time output key `P`.
    pub one_time_key: EdwardsPoint,
    /// Transaction public key `R = r·G`.
    pub tx_public_key: EdwardsPoint,
    /// Position of the output in the transaction.
    pub output_index: u64,
    /// First byte of the view tag hash, lets scanners skip most foreign outputs.
    pub view_tag: u8,
}

impl StealthAddress {
    /// Derive the output of index `output_index` paying `keys` under transaction key `tx_secret`.
    /// Returns the address and the shared scalar `Hs(D || varint(i))` used to derive the amount
    /// mask and the amount encryption key.
    pub fn derive(tx_secret: &Scalar, keys: &ViewKeys, output_index: u64) -> (Self, Scalar) {
        let derivation = (tx_secret * keys.view).mul_by_cofactor();
        let shared = derivation_to_scalar(&derivation, output_index);
        let address = Self {
            one_time_key: scalar_multiply_base(&shared) + keys.spend,
            tx_public_key: scalar_multiply_base(tx_secret),
            output_index,
            view_tag: view_tag(&derivation, output_index),
        };
        (address, shared)
    }
}

impl Encodable for StealthAddress {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.one_time_key.consensus_encode(s)?;
        len += self.tx_public_key.consensus_encode(s)?;
        len += self.output_index.consensus_encode(s)?;
        Ok(len + self.view_tag.consensus_encode(s)?)
    }
}

impl Decodable for StealthAddress {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            one_time_key: Decodable::consensus_decode(d)?,
            tx_public_key: Decodable::consensus_decode(d)?,
            output_index: Decodable::consensus_decode(d)?,
            view_tag: Decodable::consensus_decode(d)?,
        })
    }
}

/// Monero style varint: 7 bits per byte, high bit set on every byte but the last.
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn derivation_to_scalar(derivation: &EdwardsPoint, output_index: u64) -> Scalar {
    let mut buf = derivation.compress().to_bytes().to_vec();
    write_varint(output_index, &mut buf);
    hash_to_scalar(&buf)
}

fn view_tag(derivation: &EdwardsPoint, output_index: u64) -> u8 {
    let mut index = Vec::with_capacity(10);
    write_varint(output_index, &mut index);
    keccak256(&[b"view_tag", derivation.compress().as_bytes(), &index])[0]
}

/// Generate a fresh stealth address paying the wallet with public `view_key` and `spend_key`.
/// A new transaction key is drawn for every call.
pub fn generate_stealth_address(
    view_key: &EdwardsPoint,
    spend_key: &EdwardsPoint,
    output_index: u64,
) -> StealthAddress {
    let keys = ViewKeys {
        view: *view_key,
        spend: *spend_key,
    };
    let (address, _) = StealthAddress::derive(&random_scalar(), &keys, output_index);
    trace!(output_index, "derived stealth address");
    address
}

/// Check with the private view key whether `address` pays the wallet owning `spend_public`.
/// Returns the shared scalar when it does.
pub fn scan_output(
    view_secret: &Scalar,
    spend_public: &EdwardsPoint,
    address: &StealthAddress,
) -> Option<Scalar> {
    let derivation = (view_secret * address.tx_public_key).mul_by_cofactor();
    if view_tag(&derivation, address.output_index) != address.view_tag {
        return None;
    }
    let shared = derivation_to_scalar(&derivation, address.output_index);
    if scalar_multiply_base(&shared) + spend_public == address.one_time_key {
        Some(shared)
    } else {
        None
    }
}

/// Recover the private key `x` of a one-time output such that `x·G == P`.
pub fn derive_one_time_secret(
    view_secret: &Scalar,
    spend_secret: &Scalar,
    address: &StealthAddress,
) -> Result<Scalar, Error> {
    let spend_public = scalar_multiply_base(spend_secret);
    let shared = scan_output(view_secret, &spend_public, address)
        .ok_or_else(|| Error::new("output does not belong to this wallet"))?;
    Ok(shared + spend_secret)
}
