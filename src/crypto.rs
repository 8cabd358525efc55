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

//! Ed25519 primitives used by the privacy transaction model and the hash-lock secrets used by the
//! swap contracts.
//!
//! All curve arithmetic is delegated to `curve25519-dalek`. Hashing onto the scalar field and
//! onto the curve uses Keccak-256 with a domain tag so that the values produced here never
//! collide with any other use of the same hash function.

use std::convert::TryInto;
use std::error;
use std::fmt;
use std::io;

use curve25519_dalek::constants::{ED25519_BASEPOINT_POINT, ED25519_BASEPOINT_TABLE};
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroize;

use crate::consensus::{self, CanonicalBytes, Decodable, Encodable};

/// Domain tag prepended to every [`hash_to_scalar`] input.
pub const HASH_TO_SCALAR_DOMAIN: &[u8] = b"CipherSwap_HashToScalar";
/// Domain tag prepended to every [`hash_to_point`] input.
pub const HASH_TO_POINT_DOMAIN: &[u8] = b"CipherSwap_HashToPoint";

lazy_static! {
    /// Second generator with no known discrete logarithm relative to `G`, obtained by hashing
    /// the compressed encoding of the base point onto the curve.
    pub static ref H: EdwardsPoint = hash_to_point(ED25519_BASEPOINT_POINT.compress().as_bytes());
}

/// The Ed25519 base point.
pub const G: EdwardsPoint = ED25519_BASEPOINT_POINT;

/// List of cryptographic errors that can be encountered when decoding curve elements or
/// manipulating hash-lock secrets.
#[derive(Error, Debug)]
pub enum Error {
    /// The bytes are not a canonical encoding of a scalar or a point of the prime order subgroup.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(&'static str),
    /// The secret does not hash to the expected value.
    #[error("The secret does not match the secret hash")]
    SecretMismatch,
    /// Any cryptographic error not part of this list.
    #[error("Cryptographic error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new cryptographic error of type [`Self::Other`] with an arbitrary payload.
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

/// Keccak-256 over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut keccak = Keccak::v256();
    for part in parts {
        keccak.update(part);
    }
    keccak.finalize(&mut out);
    out
}

/// Draw a scalar uniformly from the scalar field using the OS random number generator. 64 bytes
/// are reduced so the result carries no modulo bias.
pub fn random_scalar() -> Scalar {
    let mut wide = [0u8; 64];
    OsRng.fill_bytes(&mut wide);
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    scalar
}

/// Hash arbitrary bytes to a scalar, `Keccak256(domain || bytes) mod l`.
pub fn hash_to_scalar(bytes: &[u8]) -> Scalar {
    hash_to_scalar_tagged(HASH_TO_SCALAR_DOMAIN, &[bytes])
}

/// Hash a list of byte strings under a caller chosen tag to a scalar. Used to build Fiat-Shamir
/// challenges where every round hashes several curve elements.
pub fn hash_to_scalar_tagged(tag: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut keccak = Keccak::v256();
    keccak.update(tag);
    for part in parts {
        keccak.update(part);
    }
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    Scalar::from_bytes_mod_order(out)
}

/// Hash arbitrary bytes onto the prime order subgroup.
///
/// Try-and-increment: `Keccak256(domain || bytes || counter)` is interpreted as a compressed
/// point until one decompresses, the cofactor is then cleared. Roughly half of all candidates
/// decompress so the loop ends after a couple of rounds.
pub fn hash_to_point(bytes: &[u8]) -> EdwardsPoint {
    let mut counter: u32 = 0;
    loop {
        let candidate = keccak256(&[HASH_TO_POINT_DOMAIN, bytes, &counter.to_le_bytes()]);
        if let Some(point) = CompressedEdwardsY(candidate).decompress() {
            let point = point.mul_by_cofactor();
            if !point.is_identity() {
                return point;
            }
        }
        counter = counter.wrapping_add(1);
    }
}

/// `s·P`
pub fn scalar_multiply(point: &EdwardsPoint, scalar: &Scalar) -> EdwardsPoint {
    point * scalar
}

/// `s·G` using the precomputed base point table.
pub fn scalar_multiply_base(scalar: &Scalar) -> EdwardsPoint {
    &ED25519_BASEPOINT_TABLE * scalar
}

/// `P + Q`
pub fn point_add(lhs: &EdwardsPoint, rhs: &EdwardsPoint) -> EdwardsPoint {
    lhs + rhs
}

/// Decode a compressed point, rejecting non-decompressible encodings and points of small order.
pub fn point_from_bytes(bytes: &[u8]) -> Result<EdwardsPoint, Error> {
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidEncoding("point must be 32 bytes"))?;
    let point = CompressedEdwardsY(bytes)
        .decompress()
        .ok_or(Error::InvalidEncoding("point does not decompress"))?;
    if point.is_small_order() {
        return Err(Error::InvalidEncoding("point of small order"));
    }
    Ok(point)
}

/// Decode a scalar, rejecting non-canonical (unreduced) encodings.
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar, Error> {
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidEncoding("scalar must be 32 bytes"))?;
    Scalar::from_canonical_bytes(bytes).ok_or(Error::InvalidEncoding("non-canonical scalar"))
}

impl CanonicalBytes for EdwardsPoint {
    fn as_canonical_bytes(&self) -> Vec<u8> {
        self.compress().as_bytes().to_vec()
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, consensus::Error>
    where
        Self: Sized,
    {
        point_from_bytes(bytes).map_err(consensus::Error::new)
    }
}

impl CanonicalBytes for Scalar {
    fn as_canonical_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, consensus::Error>
    where
        Self: Sized,
    {
        scalar_from_bytes(bytes).map_err(consensus::Error::new)
    }
}

impl_canonical_encoding!(EdwardsPoint);
impl_canonical_encoding!(Scalar);

/// A secret scalar and its public point `x·G`.
#[derive(Clone)]
pub struct KeyPair {
    /// The private scalar.
    pub secret: Scalar,
    /// The public point.
    pub public: EdwardsPoint,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn random() -> Self {
        Self::from_secret(random_scalar())
    }

    /// Build the key pair of a known secret scalar.
    pub fn from_secret(secret: Scalar) -> Self {
        let public = secret_to_public(&secret);
        Self { secret, public }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.compress())
            .finish_non_exhaustive()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Derive the public point of a secret scalar.
pub fn secret_to_public(secret: &Scalar) -> EdwardsPoint {
    scalar_multiply_base(secret)
}

/// Hash-lock preimage: 32 random bytes, zeroed when dropped. The secret is revealed on chain when
/// a contract is claimed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; 32]);

impl Secret {
    /// Draw a fresh secret from the OS random number generator.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap secret bytes observed on chain.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a secret from a slice, must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidEncoding("secret must be 32 bytes"))?;
        Ok(Self(bytes))
    }

    /// The raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// SHA-256 of the secret, the value locked in the contracts.
    pub fn hash(&self) -> SecretHash {
        let digest = Sha256::digest(&self.0);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        SecretHash(out)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Encodable for Secret {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(writer)
    }
}

impl Decodable for Secret {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

fixed_hash::construct_fixed_hash!(
    /// SHA-256 digest of a [`Secret`], shared by both contracts of a swap.
    #[derive(Serialize, Deserialize)]
    pub struct SecretHash(32);
);

impl SecretHash {
    /// Returns true when `secret` is the preimage of this hash.
    pub fn verify(&self, secret: &Secret) -> bool {
        secret.hash() == *self
    }

    /// Check the preimage, failing with [`Error::SecretMismatch`].
    pub fn ensure(&self, secret: &Secret) -> Result<(), Error> {
        if self.verify(secret) {
            Ok(())
        } else {
            Err(Error::SecretMismatch)
        }
    }
}

impl Encodable for SecretHash {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(writer)
    }
}

impl Decodable for SecretHash {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

impl_strict_encoding!(SecretHash);
