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

//! Non-interactive range proofs on Pedersen commitments.
//!
//! To show `min <= a <= max` the prover decomposes both `a - min` and `max - a` in `n` bits where
//! `n` is the bit length of `max - min`. Every bit `b_i` gets a commitment
//! `C_i = r_i·G + b_i·2^i·H` with `Σ r_i` equal to the blinding of the bound commitment, and a
//! two member ring signature over `{C_i, C_i - 2^i·H}` proving the commitment hides either 0 or
//! `2^i`. Challenges are derived with Fiat-Shamir from a transcript binding the bounds, the bound
//! commitment and the bit index.

use std::io;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;

use crate::consensus::{self, serialize, Decodable, Encodable};
use crate::crypto::{hash_to_scalar_tagged, random_scalar, scalar_multiply_base, H};
use crate::privacy::{Error, PedersenCommitment};

const RANGE_BIT: &[u8] = b"CSW_range_bit";

/// Commitment to a single bit and the proof that it hides `0` or `2^i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitProof {
    /// Bit commitment `C_i`.
    pub commitment: EdwardsPoint,
    /// Challenge for the first ring member.
    pub challenge: Scalar,
    /// One response per ring member.
    pub responses: [Scalar; 2],
}

impl Encodable for BitProof {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.commitment.consensus_encode(s)?;
        len += self.challenge.consensus_encode(s)?;
        len += self.responses[0].consensus_encode(s)?;
        Ok(len + self.responses[1].consensus_encode(s)?)
    }
}

impl Decodable for BitProof {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            commitment: Decodable::consensus_decode(d)?,
            challenge: Decodable::consensus_decode(d)?,
            responses: [
                Decodable::consensus_decode(d)?,
                Decodable::consensus_decode(d)?,
            ],
        })
    }
}

/// Proof that a commitment hides an amount in `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    /// Inclusive lower bound.
    pub min: u64,
    /// Inclusive upper bound.
    pub max: u64,
    /// Bits of `a - min`.
    pub lower: Vec<BitProof>,
    /// Bits of `max - a`.
    pub upper: Vec<BitProof>,
}

impl RangeProof {
    /// Number of bits proven per bound.
    pub fn bit_length(min: u64, max: u64) -> usize {
        (64 - (max - min).leading_zeros() as usize).max(1)
    }
}

impl Encodable for RangeProof {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.min.consensus_encode(s)?;
        len += self.max.consensus_encode(s)?;
        len += self.lower.consensus_encode(s)?;
        Ok(len + self.upper.consensus_encode(s)?)
    }
}

impl Decodable for RangeProof {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            min: Decodable::consensus_decode(d)?,
            max: Decodable::consensus_decode(d)?,
            lower: Decodable::consensus_decode(d)?,
            upper: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(RangeProof);

/// Prove that `commitment` hides an amount within `[min, max]`.
pub fn generate_range_proof(
    commitment: &PedersenCommitment,
    min: u64,
    max: u64,
) -> Result<RangeProof, Error> {
    let amount = commitment.amount;
    if min > max || amount < min || amount > max {
        return Err(Error::AmountOutOfRange { amount, min, max });
    }
    let bits = RangeProof::bit_length(min, max);
    let (lower_point, upper_point) = bound_commitments(&commitment.commitment, min, max);
    let tag = transcript_tag(min, max);

    Ok(RangeProof {
        min,
        max,
        lower: prove_bound(&tag, &lower_point, amount - min, &commitment.blinding, bits),
        upper: prove_bound(&tag, &upper_point, max - amount, &-commitment.blinding, bits),
    })
}

/// Verify a range proof against the published commitment point.
pub fn verify_range_proof(commitment: &EdwardsPoint, proof: &RangeProof) -> Result<(), Error> {
    if proof.min > proof.max {
        return Err(Error::InvalidRangeProof);
    }
    let bits = RangeProof::bit_length(proof.min, proof.max);
    let (lower_point, upper_point) = bound_commitments(commitment, proof.min, proof.max);
    let tag = transcript_tag(proof.min, proof.max);

    if verify_bound(&tag, &lower_point, &proof.lower, bits)
        && verify_bound(&tag, &upper_point, &proof.upper, bits)
    {
        Ok(())
    } else {
        Err(Error::InvalidRangeProof)
    }
}

/// `C - min·H` hides `a - min` under `x`, `max·H - C` hides `max - a` under `-x`.
fn bound_commitments(c: &EdwardsPoint, min: u64, max: u64) -> (EdwardsPoint, EdwardsPoint) {
    (
        c - *H * Scalar::from(min),
        *H * Scalar::from(max) - c,
    )
}

fn transcript_tag(min: u64, max: u64) -> Vec<u8> {
    let mut tag = RANGE_BIT.to_vec();
    tag.extend(serialize(&min));
    tag.extend(serialize(&max));
    tag
}

fn bit_challenge(tag: &[u8], bound: &EdwardsPoint, index: usize, bit: &EdwardsPoint, l: &EdwardsPoint) -> Scalar {
    hash_to_scalar_tagged(
        tag,
        &[
            bound.compress().as_bytes(),
            &(index as u64).to_le_bytes(),
            bit.compress().as_bytes(),
            l.compress().as_bytes(),
        ],
    )
}

fn power_of_two(index: usize) -> Scalar {
    Scalar::from(1u64 << index)
}

fn prove_bound(
    tag: &[u8],
    bound: &EdwardsPoint,
    value: u64,
    blinding: &Scalar,
    bits: usize,
) -> Vec<BitProof> {
    let mut masks: Vec<Scalar> = (0..bits.saturating_sub(1)).map(|_| random_scalar()).collect();
    let partial = masks.iter().fold(Scalar::zero(), |acc, m| acc + m);
    masks.push(blinding - partial);

    masks
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let bit = ((value >> i) & 1) as usize;
            let pow_h = *H * power_of_two(i);
            let commitment = if bit == 1 {
                scalar_multiply_base(r) + pow_h
            } else {
                scalar_multiply_base(r)
            };
            let keys = [commitment, commitment - pow_h];

            // the real member is the bit value, the other one is simulated
            let alpha = random_scalar();
            let fake = 1 - bit;
            let mut challenges = [Scalar::zero(); 2];
            let mut responses = [Scalar::zero(); 2];
            challenges[fake] =
                bit_challenge(tag, bound, i, &commitment, &scalar_multiply_base(&alpha));
            responses[fake] = random_scalar();
            let l_fake = scalar_multiply_base(&responses[fake]) + challenges[fake] * keys[fake];
            challenges[bit] = bit_challenge(tag, bound, i, &commitment, &l_fake);
            responses[bit] = alpha - challenges[bit] * r;

            BitProof {
                commitment,
                challenge: challenges[0],
                responses,
            }
        })
        .collect()
}

fn verify_bound(tag: &[u8], bound: &EdwardsPoint, proofs: &[BitProof], bits: usize) -> bool {
    if proofs.len() != bits {
        return false;
    }
    let sum = proofs
        .iter()
        .fold(EdwardsPoint::identity(), |acc, p| acc + p.commitment);
    if sum != *bound {
        return false;
    }
    proofs.iter().enumerate().all(|(i, proof)| {
        let keys = [proof.commitment, proof.commitment - *H * power_of_two(i)];
        let l0 = scalar_multiply_base(&proof.responses[0]) + proof.challenge * keys[0];
        let c1 = bit_challenge(tag, bound, i, &proof.commitment, &l0);
        let l1 = scalar_multiply_base(&proof.responses[1]) + c1 * keys[1];
        bit_challenge(tag, bound, i, &proof.commitment, &l1) == proof.challenge
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::deserialize;
    use crate::privacy::create_pedersen_commitment;

    #[test]
    fn prove_amount_in_range() {
        let c = create_pedersen_commitment(1_234, None);
        let proof = generate_range_proof(&c, 1_000, 2_000).unwrap();
        assert_eq!(proof.lower.len(), RangeProof::bit_length(1_000, 2_000));
        verify_range_proof(&c.commitment, &proof).unwrap();
    }

    #[test]
    fn bounds_are_inclusive() {
        for amount in [10, 20] {
            let c = create_pedersen_commitment(amount, None);
            let proof = generate_range_proof(&c, 10, 20).unwrap();
            verify_range_proof(&c.commitment, &proof).unwrap();
        }
        let c = create_pedersen_commitment(5, None);
        let proof = generate_range_proof(&c, 5, 5).unwrap();
        verify_range_proof(&c.commitment, &proof).unwrap();
    }

    #[test]
    fn full_u64_range() {
        let c = create_pedersen_commitment(u64::MAX - 3, None);
        let proof = generate_range_proof(&c, 0, u64::MAX).unwrap();
        assert_eq!(proof.upper.len(), 64);
        verify_range_proof(&c.commitment, &proof).unwrap();
    }

    #[test]
    fn out_of_range_amount_is_rejected() {
        let c = create_pedersen_commitment(21, None);
        assert!(matches!(
            generate_range_proof(&c, 10, 20),
            Err(Error::AmountOutOfRange {
                amount: 21,
                min: 10,
                max: 20
            })
        ));
        assert!(generate_range_proof(&c, 30, 20).is_err());
    }

    #[test]
    fn proof_does_not_transfer_to_other_commitment() {
        let c = create_pedersen_commitment(15, None);
        let other = create_pedersen_commitment(15, None);
        let proof = generate_range_proof(&c, 10, 20).unwrap();
        assert!(matches!(
            verify_range_proof(&other.commitment, &proof),
            Err(Error::InvalidRangeProof)
        ));

        let mut widened = proof.clone();
        widened.max = 30;
        assert!(verify_range_proof(&c.commitment, &widened).is_err());

        let mut forged = proof;
        forged.lower[0].responses.swap(0, 1);
        assert!(verify_range_proof(&c.commitment, &forged).is_err());
    }

    #[test]
    fn proof_encoding_round_trip() {
        let c = create_pedersen_commitment(3, None);
        let proof = generate_range_proof(&c, 0, 7).unwrap();
        let decoded: RangeProof = deserialize(&serialize(&proof)).unwrap();
        verify_range_proof(&c.commitment, &decoded).unwrap();
    }
}
