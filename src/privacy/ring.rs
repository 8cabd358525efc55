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

//! Linkable ring signatures over `(output key, amount commitment)` pairs.
//!
//! Two constructions are provided:
//!
//! - **CLSAG**: one response per ring member, the spend key and the commitment key are
//!   aggregated with the coefficients `μ_P` and `μ_C`.
//! - **MLSAG**: a two column matrix signature, one response per column and per ring member.
//!
//! In both the signer proves knowledge of `x` such that `P_l = x·G` and of `z` such that
//! `C_l − C_pseudo = z·G` for the same, hidden, index `l`. The key image `I = x·Hp(P_l)` links two
//! signatures spending the same output.

use std::collections::HashSet;
use std::io;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::consensus::{self, CanonicalBytes, Decodable, Encodable};
use crate::crypto::{
    hash_to_point, hash_to_scalar_tagged, random_scalar, scalar_multiply_base, G,
};
use crate::privacy::{Error, MIN_MIXIN};

const CLSAG_AGG_P: &[u8] = b"CSW_CLSAG_agg_0";
const CLSAG_AGG_C: &[u8] = b"CSW_CLSAG_agg_1";
const CLSAG_ROUND: &[u8] = b"CSW_CLSAG_round";
const MLSAG_ROUND: &[u8] = b"CSW_MLSAG_round";

/// The ring signature construction.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum RingSignatureKind {
    /// Concise linkable spontaneous anonymous group signature.
    Clsag,
    /// Multilayered linkable spontaneous anonymous group signature, two layers.
    Mlsag,
}

impl RingSignatureKind {
    /// Number of response scalars per ring member.
    pub fn width(&self) -> usize {
        match self {
            RingSignatureKind::Clsag => 1,
            RingSignatureKind::Mlsag => 2,
        }
    }
}

impl Encodable for RingSignatureKind {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            RingSignatureKind::Clsag => 0x01u8.consensus_encode(writer),
            RingSignatureKind::Mlsag => 0x02u8.consensus_encode(writer),
        }
    }
}

impl Decodable for RingSignatureKind {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(RingSignatureKind::Clsag),
            0x02u8 => Ok(RingSignatureKind::Mlsag),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

/// An output appearing in a ring: its one-time key and its amount commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingMember {
    /// One-time output key `P`.
    pub public_key: EdwardsPoint,
    /// Amount commitment `C`.
    pub commitment: EdwardsPoint,
}

impl Encodable for RingMember {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        Ok(self.public_key.consensus_encode(s)? + self.commitment.consensus_encode(s)?)
    }
}

impl Decodable for RingMember {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            public_key: Decodable::consensus_decode(d)?,
            commitment: Decodable::consensus_decode(d)?,
        })
    }
}

/// `I = x·Hp(P)`, identical for every signature spending the output `P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyImage(pub EdwardsPoint);

impl KeyImage {
    /// Compressed bytes of the image, used as the double spend index by the chain.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }
}

impl CanonicalBytes for KeyImage {
    fn as_canonical_bytes(&self) -> Vec<u8> {
        self.0.as_canonical_bytes()
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, consensus::Error>
    where
        Self: Sized,
    {
        Ok(Self(EdwardsPoint::from_canonical_bytes(bytes)?))
    }
}

impl_canonical_encoding!(KeyImage);

/// Compute the key image of the output `output_public_key` owned by `private_key`.
pub fn generate_key_image(output_public_key: &EdwardsPoint, private_key: &Scalar) -> KeyImage {
    KeyImage(private_key * hash_to_point(output_public_key.compress().as_bytes()))
}

/// Signer side knowledge about the real ring member.
#[derive(Clone)]
pub struct RealInput {
    /// Position of the real member in the ring.
    pub index: usize,
    /// One-time private key `x`, `P_l = x·G`.
    pub secret_key: Scalar,
    /// Commitment key `z`, `C_l − C_pseudo = z·G`: input mask minus pseudo output mask.
    pub commitment_key: Scalar,
}

/// A ring signature over a 32-byte message, usually a transfer prefix hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSignature {
    /// Construction used.
    pub kind: RingSignatureKind,
    /// Ring members, real input hidden among decoys.
    pub ring: Vec<RingMember>,
    /// Key image of the spent output.
    pub key_image: KeyImage,
    /// Pseudo output commitment, same amount as the spent output, fresh mask.
    pub pseudo_out: EdwardsPoint,
    /// Challenge at ring index 0.
    pub challenge: Scalar,
    /// Responses, one vector of [`RingSignatureKind::width`] scalars per ring member.
    pub responses: Vec<Vec<Scalar>>,
    /// CLSAG commitment key image `D = z·Hp(P_l)`.
    pub commitment_image: Option<EdwardsPoint>,
}

impl Encodable for RingSignature {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.kind.consensus_encode(s)?;
        len += self.ring.consensus_encode(s)?;
        len += self.key_image.consensus_encode(s)?;
        len += self.pseudo_out.consensus_encode(s)?;
        len += self.challenge.consensus_encode(s)?;
        len += self.responses.consensus_encode(s)?;
        Ok(len + self.commitment_image.consensus_encode(s)?)
    }
}

impl Decodable for RingSignature {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            kind: Decodable::consensus_decode(d)?,
            ring: Decodable::consensus_decode(d)?,
            key_image: Decodable::consensus_decode(d)?,
            pseudo_out: Decodable::consensus_decode(d)?,
            challenge: Decodable::consensus_decode(d)?,
            responses: Decodable::consensus_decode(d)?,
            commitment_image: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(RingSignature);

/// Pick `mixin` decoys uniformly from `candidates`, add the real member and shuffle. Returns the
/// ring and the position of the real member, which is uniform and independent of the order of
/// `candidates`.
pub fn select_ring<R: Rng + ?Sized>(
    real: RingMember,
    candidates: &[RingMember],
    mixin: usize,
    rng: &mut R,
) -> Result<(Vec<RingMember>, usize), Error> {
    let mut seen = HashSet::new();
    seen.insert(real.public_key.compress().to_bytes());
    let pool: Vec<RingMember> = candidates
        .iter()
        .filter(|c| seen.insert(c.public_key.compress().to_bytes()))
        .copied()
        .collect();
    if pool.len() < mixin {
        return Err(Error::InsufficientDecoys {
            required: mixin,
            available: pool.len(),
        });
    }

    let mut ring: Vec<RingMember> = pool.choose_multiple(rng, mixin).copied().collect();
    ring.push(real);
    ring.shuffle(rng);
    let index = ring
        .iter()
        .position(|m| m.public_key == real.public_key)
        .ok_or(Error::InvalidRealIndex(ring.len()))?;
    Ok((ring, index))
}

/// Sign `message` with the real member of `ring`.
///
/// Fails with [`Error::InsufficientDecoys`] when the ring has less than `MIN_MIXIN + 1` members,
/// [`Error::InvalidRealIndex`] when the index is out of the ring or the secret key does not open
/// the member, [`Error::InvalidKeyImage`] when `key_image` is not `x·Hp(P)` and
/// [`Error::CommitmentImbalance`] when the commitment key does not open `C_l − C_pseudo`.
pub fn create_ring_signature(
    kind: RingSignatureKind,
    message: &[u8; 32],
    ring: &[RingMember],
    real: &RealInput,
    key_image: &KeyImage,
    pseudo_out: &EdwardsPoint,
) -> Result<RingSignature, Error> {
    if ring.len() < MIN_MIXIN + 1 {
        return Err(Error::InsufficientDecoys {
            required: MIN_MIXIN,
            available: ring.len().saturating_sub(1),
        });
    }
    let member = ring
        .get(real.index)
        .ok_or(Error::InvalidRealIndex(real.index))?;
    if scalar_multiply_base(&real.secret_key) != member.public_key {
        return Err(Error::InvalidRealIndex(real.index));
    }
    if generate_key_image(&member.public_key, &real.secret_key) != *key_image {
        return Err(Error::InvalidKeyImage);
    }
    if member.commitment - pseudo_out != scalar_multiply_base(&real.commitment_key) {
        return Err(Error::CommitmentImbalance);
    }

    let ctx = RingContext::new(message, ring, pseudo_out);
    let signature = match kind {
        RingSignatureKind::Clsag => ctx.sign_clsag(real, key_image),
        RingSignatureKind::Mlsag => ctx.sign_mlsag(real, key_image),
    };
    Ok(signature)
}

/// Verify a ring signature against `message`.
pub fn verify_ring_signature(signature: &RingSignature, message: &[u8; 32]) -> Result<(), Error> {
    let n = signature.ring.len();
    let width = signature.kind.width();
    if n == 0
        || signature.responses.len() != n
        || signature.responses.iter().any(|r| r.len() != width)
    {
        return Err(Error::InvalidRingSignature);
    }
    if !signature.key_image.0.is_torsion_free() {
        return Err(Error::InvalidKeyImage);
    }

    let ctx = RingContext::new(message, &signature.ring, &signature.pseudo_out);
    let recomputed = match (signature.kind, signature.commitment_image) {
        (RingSignatureKind::Clsag, Some(d)) if d.is_torsion_free() => {
            ctx.verify_clsag(signature, &d)
        }
        (RingSignatureKind::Mlsag, None) => ctx.verify_mlsag(signature),
        _ => return Err(Error::InvalidRingSignature),
    };
    if recomputed == signature.challenge {
        Ok(())
    } else {
        Err(Error::InvalidRingSignature)
    }
}

/// Values shared by signing and verification of one ring.
struct RingContext<'a> {
    message: &'a [u8; 32],
    ring: &'a [RingMember],
    pseudo_out: &'a EdwardsPoint,
    hashed_keys: Vec<EdwardsPoint>,
    commitment_offsets: Vec<EdwardsPoint>,
    ring_bytes: Vec<u8>,
}

impl<'a> RingContext<'a> {
    fn new(message: &'a [u8; 32], ring: &'a [RingMember], pseudo_out: &'a EdwardsPoint) -> Self {
        let hashed_keys = ring
            .iter()
            .map(|m| hash_to_point(m.public_key.compress().as_bytes()))
            .collect();
        let commitment_offsets = ring.iter().map(|m| m.commitment - pseudo_out).collect();
        let mut ring_bytes = Vec::with_capacity(ring.len() * 64);
        for member in ring {
            ring_bytes.extend_from_slice(member.public_key.compress().as_bytes());
        }
        for member in ring {
            ring_bytes.extend_from_slice(member.commitment.compress().as_bytes());
        }
        Self {
            message,
            ring,
            pseudo_out,
            hashed_keys,
            commitment_offsets,
            ring_bytes,
        }
    }

    fn len(&self) -> usize {
        self.ring.len()
    }

    fn aggregation(&self, key_image: &KeyImage, d: &EdwardsPoint) -> (Scalar, Scalar) {
        let image = key_image.0.compress();
        let d = d.compress();
        let pseudo = self.pseudo_out.compress();
        let parts: [&[u8]; 4] = [
            &self.ring_bytes,
            image.as_bytes(),
            d.as_bytes(),
            pseudo.as_bytes(),
        ];
        (
            hash_to_scalar_tagged(CLSAG_AGG_P, &parts),
            hash_to_scalar_tagged(CLSAG_AGG_C, &parts),
        )
    }

    fn clsag_round(&self, l: &EdwardsPoint, r: &EdwardsPoint) -> Scalar {
        hash_to_scalar_tagged(
            CLSAG_ROUND,
            &[
                &self.ring_bytes,
                self.pseudo_out.compress().as_bytes(),
                self.message,
                l.compress().as_bytes(),
                r.compress().as_bytes(),
            ],
        )
    }

    fn mlsag_round(&self, i: usize, l0: &EdwardsPoint, r0: &EdwardsPoint, l1: &EdwardsPoint) -> Scalar {
        hash_to_scalar_tagged(
            MLSAG_ROUND,
            &[
                self.message,
                self.pseudo_out.compress().as_bytes(),
                self.ring[i].public_key.compress().as_bytes(),
                l0.compress().as_bytes(),
                r0.compress().as_bytes(),
                self.commitment_offsets[i].compress().as_bytes(),
                l1.compress().as_bytes(),
            ],
        )
    }

    /// Walk the ring from `start` back to `stop`, calling `step` for every index with the current
    /// challenge. Returns the challenge reaching `stop` and the challenge seen at index 0.
    fn walk<F>(&self, start: usize, stop: usize, mut c: Scalar, mut step: F) -> (Scalar, Scalar)
    where
        F: FnMut(usize, &Scalar) -> Scalar,
    {
        let n = self.len();
        let mut c0 = if start == 0 { c } else { Scalar::zero() };
        let mut i = start;
        loop {
            c = step(i, &c);
            i = (i + 1) % n;
            if i == 0 {
                c0 = c;
            }
            if i == stop {
                return (c, c0);
            }
        }
    }

    fn clsag_terms(
        &self,
        i: usize,
        s: &Scalar,
        c: &Scalar,
        mu: (Scalar, Scalar),
        key_image: &EdwardsPoint,
        d: &EdwardsPoint,
    ) -> Scalar {
        let (mu_p, mu_c) = mu;
        let l = scalar_multiply_base(s)
            + c * (mu_p * self.ring[i].public_key + mu_c * self.commitment_offsets[i]);
        let r = s * self.hashed_keys[i] + c * (mu_p * key_image + mu_c * d);
        self.clsag_round(&l, &r)
    }

    fn sign_clsag(&self, real: &RealInput, key_image: &KeyImage) -> RingSignature {
        let n = self.len();
        let l = real.index;
        let d = real.commitment_key * self.hashed_keys[l];
        let mu = self.aggregation(key_image, &d);

        let alpha = random_scalar();
        let first = self.clsag_round(&scalar_multiply_base(&alpha), &(alpha * self.hashed_keys[l]));
        let mut responses = vec![vec![Scalar::zero()]; n];
        let next = (l + 1) % n;

        let (c_l, c0) = if next == l {
            (first, first)
        } else {
            self.walk(next, l, first, |i, c| {
                let s = random_scalar();
                responses[i][0] = s;
                self.clsag_terms(i, &s, c, mu, &key_image.0, &d)
            })
        };
        let c0 = if next == 0 { first } else { c0 };
        responses[l][0] = alpha - c_l * (mu.0 * real.secret_key + mu.1 * real.commitment_key);

        RingSignature {
            kind: RingSignatureKind::Clsag,
            ring: self.ring.to_vec(),
            key_image: *key_image,
            pseudo_out: *self.pseudo_out,
            challenge: c0,
            responses,
            commitment_image: Some(d),
        }
    }

    fn verify_clsag(&self, signature: &RingSignature, d: &EdwardsPoint) -> Scalar {
        let mu = self.aggregation(&signature.key_image, d);
        let (c, _) = self.walk(0, 0, signature.challenge, |i, c| {
            self.clsag_terms(i, &signature.responses[i][0], c, mu, &signature.key_image.0, d)
        });
        c
    }

    fn mlsag_terms(&self, i: usize, s: &[Scalar], c: &Scalar, key_image: &EdwardsPoint) -> Scalar {
        let l0 = scalar_multiply_base(&s[0]) + c * self.ring[i].public_key;
        let r0 = s[0] * self.hashed_keys[i] + c * key_image;
        let l1 = scalar_multiply_base(&s[1]) + c * self.commitment_offsets[i];
        self.mlsag_round(i, &l0, &r0, &l1)
    }

    fn sign_mlsag(&self, real: &RealInput, key_image: &KeyImage) -> RingSignature {
        let n = self.len();
        let l = real.index;
        let alpha0 = random_scalar();
        let alpha1 = random_scalar();
        let first = self.mlsag_round(
            l,
            &scalar_multiply_base(&alpha0),
            &(alpha0 * self.hashed_keys[l]),
            &(alpha1 * G),
        );
        let mut responses = vec![vec![Scalar::zero(); 2]; n];
        let next = (l + 1) % n;

        let (c_l, c0) = if next == l {
            (first, first)
        } else {
            self.walk(next, l, first, |i, c| {
                let s = [random_scalar(), random_scalar()];
                responses[i] = s.to_vec();
                self.mlsag_terms(i, &s, c, &key_image.0)
            })
        };
        let c0 = if next == 0 { first } else { c0 };
        responses[l] = vec![
            alpha0 - c_l * real.secret_key,
            alpha1 - c_l * real.commitment_key,
        ];

        RingSignature {
            kind: RingSignatureKind::Mlsag,
            ring: self.ring.to_vec(),
            key_image: *key_image,
            pseudo_out: *self.pseudo_out,
            challenge: c0,
            responses,
            commitment_image: None,
        }
    }

    fn verify_mlsag(&self, signature: &RingSignature) -> Scalar {
        let (c, _) = self.walk(0, 0, signature.challenge, |i, c| {
            self.mlsag_terms(i, &signature.responses[i], c, &signature.key_image.0)
        });
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};
    use crate::crypto::{keccak256, KeyPair};
    use crate::privacy::commitment::commit;

    struct Fixture {
        ring: Vec<RingMember>,
        real: RealInput,
        key_image: KeyImage,
        pseudo_out: EdwardsPoint,
    }

    fn decoy() -> RingMember {
        RingMember {
            public_key: KeyPair::random().public,
            commitment: commit(rand::random::<u32>() as u64, &random_scalar()),
        }
    }

    fn fixture(size: usize, real_index: usize) -> Fixture {
        let key = KeyPair::random();
        let mask = random_scalar();
        let pseudo_mask = random_scalar();
        let amount = 5_000;
        let mut ring: Vec<RingMember> = (0..size).map(|_| decoy()).collect();
        ring[real_index] = RingMember {
            public_key: key.public,
            commitment: commit(amount, &mask),
        };
        Fixture {
            key_image: generate_key_image(&key.public, &key.secret),
            real: RealInput {
                index: real_index,
                secret_key: key.secret,
                commitment_key: mask - pseudo_mask,
            },
            pseudo_out: commit(amount, &pseudo_mask),
            ring,
        }
    }

    fn sign(kind: RingSignatureKind, f: &Fixture, message: &[u8; 32]) -> RingSignature {
        create_ring_signature(kind, message, &f.ring, &f.real, &f.key_image, &f.pseudo_out).unwrap()
    }

    #[test]
    fn key_image_is_deterministic() {
        let key = KeyPair::random();
        let a = generate_key_image(&key.public, &key.secret);
        let b = generate_key_image(&key.public, &key.secret);
        assert_eq!(a, b);
        let other = KeyPair::random();
        assert_ne!(a, generate_key_image(&other.public, &other.secret));
    }

    #[test]
    fn clsag_sign_and_verify() {
        let message = keccak256(&[b"transfer prefix"]);
        for index in [0, 5, 16] {
            let f = fixture(17, index);
            let sig = sign(RingSignatureKind::Clsag, &f, &message);
            assert_eq!(sig.responses.len(), sig.ring.len());
            assert!(sig.responses.iter().all(|r| r.len() == 1));
            verify_ring_signature(&sig, &message).unwrap();
            let other = keccak256(&[b"another prefix"]);
            assert!(matches!(
                verify_ring_signature(&sig, &other),
                Err(Error::InvalidRingSignature)
            ));
        }
    }

    #[test]
    fn mlsag_sign_and_verify() {
        let message = keccak256(&[b"transfer prefix"]);
        for index in [0, 7, 10] {
            let f = fixture(11, index);
            let sig = sign(RingSignatureKind::Mlsag, &f, &message);
            assert!(sig.responses.iter().all(|r| r.len() == 2));
            verify_ring_signature(&sig, &message).unwrap();
        }
    }

    #[test]
    fn tampered_signatures_are_rejected() {
        let message = [7u8; 32];
        let f = fixture(12, 3);
        let sig = sign(RingSignatureKind::Clsag, &f, &message);

        let mut swapped = sig.clone();
        swapped.ring[4] = decoy();
        assert!(verify_ring_signature(&swapped, &message).is_err());

        let mut truncated = sig.clone();
        truncated.responses.pop();
        assert!(matches!(
            verify_ring_signature(&truncated, &message),
            Err(Error::InvalidRingSignature)
        ));

        let mut wrong_image = sig;
        wrong_image.key_image = generate_key_image(&KeyPair::random().public, &random_scalar());
        assert!(verify_ring_signature(&wrong_image, &message).is_err());
    }

    #[test]
    fn reject_invalid_signing_inputs() {
        let message = [1u8; 32];
        let small = fixture(MIN_MIXIN, 0);
        assert!(matches!(
            create_ring_signature(
                RingSignatureKind::Clsag,
                &message,
                &small.ring,
                &small.real,
                &small.key_image,
                &small.pseudo_out
            ),
            Err(Error::InsufficientDecoys { .. })
        ));

        let f = fixture(11, 2);
        let mut real = f.real.clone();
        real.index = 3;
        assert!(matches!(
            create_ring_signature(
                RingSignatureKind::Clsag,
                &message,
                &f.ring,
                &real,
                &f.key_image,
                &f.pseudo_out
            ),
            Err(Error::InvalidRealIndex(3))
        ));
        real.index = 11;
        assert!(matches!(
            create_ring_signature(
                RingSignatureKind::Mlsag,
                &message,
                &f.ring,
                &real,
                &f.key_image,
                &f.pseudo_out
            ),
            Err(Error::InvalidRealIndex(11))
        ));

        let bad_image = KeyImage(KeyPair::random().public);
        assert!(matches!(
            create_ring_signature(
                RingSignatureKind::Clsag,
                &message,
                &f.ring,
                &f.real,
                &bad_image,
                &f.pseudo_out
            ),
            Err(Error::InvalidKeyImage)
        ));

        let bad_pseudo = commit(4_999, &random_scalar());
        assert!(matches!(
            create_ring_signature(
                RingSignatureKind::Clsag,
                &message,
                &f.ring,
                &f.real,
                &f.key_image,
                &bad_pseudo
            ),
            Err(Error::CommitmentImbalance)
        ));
    }

    #[test]
    fn ring_selection_hides_real_position() {
        let real = decoy();
        let pool: Vec<RingMember> = (0..40).map(|_| decoy()).collect();
        let mut rng = rand::thread_rng();
        let mut positions = HashSet::new();
        for _ in 0..64 {
            let (ring, index) = select_ring(real, &pool, 16, &mut rng).unwrap();
            assert_eq!(ring.len(), 17);
            assert_eq!(ring[index], real);
            let unique: HashSet<_> = ring.iter().map(|m| m.public_key.compress().to_bytes()).collect();
            assert_eq!(unique.len(), 17);
            positions.insert(index);
        }
        // 64 uniform draws over 17 slots
        assert!(positions.len() > 4);
    }

    #[test]
    fn ring_selection_needs_enough_decoys() {
        let real = decoy();
        let mut pool: Vec<RingMember> = (0..9).map(|_| decoy()).collect();
        // the real output and duplicates are not decoys
        pool.push(real);
        pool.push(pool[0]);
        let mut rng = rand::thread_rng();
        assert!(matches!(
            select_ring(real, &pool, 10, &mut rng),
            Err(Error::InsufficientDecoys {
                required: 10,
                available: 9
            })
        ));
    }

    #[test]
    fn signature_encoding_round_trip() {
        let message = [9u8; 32];
        let f = fixture(11, 1);
        let sig = sign(RingSignatureKind::Mlsag, &f, &message);
        let decoded: RingSignature = deserialize(&serialize(&sig)).unwrap();
        assert_eq!(decoded, sig);
        verify_ring_signature(&decoded, &message).unwrap();
    }
}
