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

//! Balanced confidential transfers.
//!
//! [`TransferBuilder`] turns owned outputs and destinations into a [`Transfer`]: one stealth output
//! per destination with a deterministic amount mask, an encrypted amount and a range proof, one
//! pseudo output per input whose masks sum to the output masks, and one ring signature per input
//! over the prefix hash.

use std::collections::HashSet;
use std::io;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use tracing::debug;

use crate::consensus::{self, serialize, Decodable, Encodable};
use crate::crypto::{hash_to_scalar_tagged, keccak256, random_scalar};
use crate::privacy::commitment::commit;
use crate::privacy::stealth::ViewKeys;
use crate::privacy::{
    create_ring_signature, generate_key_image, generate_range_proof, select_ring,
    verify_commitment_balance, verify_range_proof, verify_ring_signature, Error, PedersenCommitment,
    RangeProof, RealInput, RingMember, RingSignature, RingSignatureKind, StealthAddress,
    DEFAULT_MIXIN, MIN_MIXIN,
};

const AMOUNT_KEY: &[u8] = b"amount";
const COMMITMENT_MASK: &[u8] = b"commitment_mask";

/// An output owned by the sender, spent as the real member of a ring.
#[derive(Clone)]
pub struct OwnedInput {
    /// The output as it appears on chain.
    pub member: RingMember,
    /// One-time private key of the output.
    pub secret_key: Scalar,
    /// Amount mask of the output commitment.
    pub mask: Scalar,
    /// Amount of the output.
    pub amount: u64,
    /// Candidate decoys, usually fetched from the chain's output distribution.
    pub decoys: Vec<RingMember>,
}

/// A recipient and the amount it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// Public keys of the recipient.
    pub keys: ViewKeys,
    /// Amount paid.
    pub amount: u64,
}

/// A confidential output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutput {
    /// One-time destination.
    pub stealth: StealthAddress,
    /// Amount commitment.
    pub commitment: EdwardsPoint,
    /// Amount XOR a key only sender and recipient can derive.
    pub encrypted_amount: [u8; 8],
    /// Proof that the amount fits in 64 bits.
    pub range_proof: RangeProof,
}

impl TransferOutput {
    /// Decrypt the amount with the shared scalar recovered by scanning the output, and check it
    /// opens the commitment.
    pub fn open(&self, shared: &Scalar) -> Option<u64> {
        let amount = xor_amount(self.encrypted_amount, shared);
        let amount = u64::from_le_bytes(amount);
        (commit(amount, &output_mask(shared)) == self.commitment).then(|| amount)
    }
}

impl Encodable for TransferOutput {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.stealth.consensus_encode(s)?;
        len += self.commitment.consensus_encode(s)?;
        len += self.encrypted_amount.consensus_encode(s)?;
        Ok(len + self.range_proof.consensus_encode(s)?)
    }
}

impl Decodable for TransferOutput {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            stealth: Decodable::consensus_decode(d)?,
            commitment: Decodable::consensus_decode(d)?,
            encrypted_amount: Decodable::consensus_decode(d)?,
            range_proof: Decodable::consensus_decode(d)?,
        })
    }
}

/// Outputs of a transfer before any input is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSet {
    /// Transaction public key shared by all outputs.
    pub tx_public_key: EdwardsPoint,
    /// The outputs, in destination order.
    pub outputs: Vec<TransferOutput>,
    /// Amount masks of the outputs, needed by whoever balances the inputs.
    pub masks: Vec<Scalar>,
}

impl OutputSet {
    /// Sum of the output masks.
    pub fn mask_sum(&self) -> Scalar {
        self.masks.iter().fold(Scalar::zero(), |acc, m| acc + m)
    }

    /// Output commitment points.
    pub fn commitments(&self) -> Vec<EdwardsPoint> {
        self.outputs.iter().map(|o| o.commitment).collect()
    }
}

impl Encodable for OutputSet {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.tx_public_key.consensus_encode(s)?;
        len += self.outputs.consensus_encode(s)?;
        Ok(len + self.masks.consensus_encode(s)?)
    }
}

impl Decodable for OutputSet {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            tx_public_key: Decodable::consensus_decode(d)?,
            outputs: Decodable::consensus_decode(d)?,
            masks: Decodable::consensus_decode(d)?,
        })
    }
}

/// A signed confidential transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Transaction public key.
    pub tx_public_key: EdwardsPoint,
    /// One ring signature per input, carrying the key image and the pseudo output.
    pub inputs: Vec<RingSignature>,
    /// Outputs.
    pub outputs: Vec<TransferOutput>,
    /// Fee paid in clear.
    pub fee: u64,
    /// Arbitrary extra data, e.g. a lock script.
    pub extra: Vec<u8>,
}

impl Transfer {
    /// Hash of everything but the ring signature responses, the message signed by every input.
    pub fn prefix_hash(&self) -> [u8; 32] {
        let images: Vec<EdwardsPoint> = self.inputs.iter().map(|i| i.key_image.0).collect();
        let pseudo: Vec<EdwardsPoint> = self.inputs.iter().map(|i| i.pseudo_out).collect();
        prefix_hash(
            &self.tx_public_key,
            &images,
            &pseudo,
            &self.outputs,
            self.fee,
            &self.extra,
        )
    }

    /// Check every ring signature, range proof, key image uniqueness and the commitment balance.
    pub fn verify(&self) -> Result<(), Error> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(Error::EmptyTransfer);
        }
        let mut images = HashSet::new();
        if !self.inputs.iter().all(|i| images.insert(i.key_image.to_bytes())) {
            return Err(Error::DuplicateKeyImage);
        }
        let message = self.prefix_hash();
        for input in &self.inputs {
            verify_ring_signature(input, &message)?;
        }
        for output in &self.outputs {
            verify_range_proof(&output.commitment, &output.range_proof)?;
        }
        let pseudo: Vec<EdwardsPoint> = self.inputs.iter().map(|i| i.pseudo_out).collect();
        let outputs: Vec<EdwardsPoint> = self.outputs.iter().map(|o| o.commitment).collect();
        verify_commitment_balance(&pseudo, &outputs, self.fee)
    }
}

impl Encodable for Transfer {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.tx_public_key.consensus_encode(s)?;
        len += self.inputs.consensus_encode(s)?;
        len += self.outputs.consensus_encode(s)?;
        len += self.fee.consensus_encode(s)?;
        Ok(len + self.extra.consensus_encode(s)?)
    }
}

impl Decodable for Transfer {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            tx_public_key: Decodable::consensus_decode(d)?,
            inputs: Decodable::consensus_decode(d)?,
            outputs: Decodable::consensus_decode(d)?,
            fee: Decodable::consensus_decode(d)?,
            extra: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Transfer);

fn prefix_hash(
    tx_public_key: &EdwardsPoint,
    key_images: &[EdwardsPoint],
    pseudo_outs: &[EdwardsPoint],
    outputs: &[TransferOutput],
    fee: u64,
    extra: &[u8],
) -> [u8; 32] {
    let mut prefix = serialize(tx_public_key);
    prefix.extend(serialize(&key_images.to_vec()));
    prefix.extend(serialize(&pseudo_outs.to_vec()));
    for output in outputs {
        prefix.extend(serialize(&output.stealth));
        prefix.extend(serialize(&output.commitment));
        prefix.extend(output.encrypted_amount);
    }
    prefix.extend(serialize(&fee));
    prefix.extend(serialize(&extra.to_vec()));
    keccak256(&[&prefix])
}

fn output_mask(shared: &Scalar) -> Scalar {
    hash_to_scalar_tagged(COMMITMENT_MASK, &[shared.as_bytes()])
}

fn xor_amount(bytes: [u8; 8], shared: &Scalar) -> [u8; 8] {
    let key = keccak256(&[AMOUNT_KEY, shared.as_bytes()]);
    let mut out = bytes;
    for (b, k) in out.iter_mut().zip(key.iter()) {
        *b ^= k;
    }
    out
}

/// Builder of a [`Transfer`].
#[derive(Clone)]
pub struct TransferBuilder {
    kind: RingSignatureKind,
    mixin: usize,
    inputs: Vec<OwnedInput>,
    destinations: Vec<Destination>,
    fee: u64,
    extra: Vec<u8>,
}

impl Default for TransferBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MIXIN)
    }
}

impl TransferBuilder {
    /// Create a builder signing with CLSAG rings of `mixin + 1` members.
    pub fn new(mixin: usize) -> Self {
        Self {
            kind: RingSignatureKind::Clsag,
            mixin,
            inputs: vec![],
            destinations: vec![],
            fee: 0,
            extra: vec![],
        }
    }

    /// Select the ring signature construction.
    pub fn ring_kind(mut self, kind: RingSignatureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Spend an owned output.
    pub fn add_input(mut self, input: OwnedInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Pay a destination.
    pub fn add_destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }

    /// Set the fee.
    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Attach extra data to the transfer.
    pub fn extra(mut self, extra: Vec<u8>) -> Self {
        self.extra = extra;
        self
    }

    /// Build the outputs paying `destinations` under a fresh transaction key: stealth address,
    /// mask derived from the shared secret, commitment, encrypted amount and range proof.
    pub fn outputs_only(destinations: &[Destination]) -> Result<OutputSet, Error> {
        if destinations.is_empty() {
            return Err(Error::EmptyTransfer);
        }
        let tx_secret = random_scalar();
        let mut outputs = Vec::with_capacity(destinations.len());
        let mut masks = Vec::with_capacity(destinations.len());
        let mut tx_public_key = None;
        for (index, destination) in destinations.iter().enumerate() {
            let (stealth, shared) = StealthAddress::derive(&tx_secret, &destination.keys, index as u64);
            tx_public_key.get_or_insert(stealth.tx_public_key);
            let mask = output_mask(&shared);
            let opening = PedersenCommitment {
                commitment: commit(destination.amount, &mask),
                blinding: mask,
                amount: destination.amount,
            };
            outputs.push(TransferOutput {
                stealth,
                commitment: opening.commitment,
                encrypted_amount: xor_amount(destination.amount.to_le_bytes(), &shared),
                range_proof: generate_range_proof(&opening, 0, u64::MAX)?,
            });
            masks.push(mask);
        }
        Ok(OutputSet {
            tx_public_key: tx_public_key.ok_or(Error::EmptyTransfer)?,
            outputs,
            masks,
        })
    }

    /// Build and sign the transfer. Fails with [`Error::CommitmentImbalance`] before any signature
    /// is produced when inputs do not cover outputs plus fee exactly.
    pub fn build(&self) -> Result<Transfer, Error> {
        if self.inputs.is_empty() || self.destinations.is_empty() {
            return Err(Error::EmptyTransfer);
        }
        if self.mixin < MIN_MIXIN {
            return Err(Error::InsufficientDecoys {
                required: MIN_MIXIN,
                available: self.mixin,
            });
        }
        let total_in: u128 = self.inputs.iter().map(|i| i.amount as u128).sum();
        let total_out: u128 = self.destinations.iter().map(|d| d.amount as u128).sum();
        if total_in != total_out + self.fee as u128 {
            return Err(Error::CommitmentImbalance);
        }

        let output_set = Self::outputs_only(&self.destinations)?;

        // pseudo output masks sum to the output masks
        let mut pseudo_masks: Vec<Scalar> = (1..self.inputs.len()).map(|_| random_scalar()).collect();
        let partial = pseudo_masks.iter().fold(Scalar::zero(), |acc, m| acc + m);
        pseudo_masks.push(output_set.mask_sum() - partial);
        let pseudo_outs: Vec<EdwardsPoint> = self
            .inputs
            .iter()
            .zip(&pseudo_masks)
            .map(|(input, mask)| commit(input.amount, mask))
            .collect();
        verify_commitment_balance(&pseudo_outs, &output_set.commitments(), self.fee)?;

        let key_images: Vec<_> = self
            .inputs
            .iter()
            .map(|i| generate_key_image(&i.member.public_key, &i.secret_key))
            .collect();
        let mut seen = HashSet::new();
        if !key_images.iter().all(|k| seen.insert(k.to_bytes())) {
            return Err(Error::DuplicateKeyImage);
        }

        let images: Vec<EdwardsPoint> = key_images.iter().map(|k| k.0).collect();
        let message = prefix_hash(
            &output_set.tx_public_key,
            &images,
            &pseudo_outs,
            &output_set.outputs,
            self.fee,
            &self.extra,
        );

        let mut rng = rand::thread_rng();
        let mut signatures = Vec::with_capacity(self.inputs.len());
        for (i, input) in self.inputs.iter().enumerate() {
            let (ring, index) = select_ring(input.member, &input.decoys, self.mixin, &mut rng)?;
            let real = RealInput {
                index,
                secret_key: input.secret_key,
                commitment_key: input.mask - pseudo_masks[i],
            };
            signatures.push(create_ring_signature(
                self.kind,
                &message,
                &ring,
                &real,
                &key_images[i],
                &pseudo_outs[i],
            )?);
        }
        debug!(
            inputs = signatures.len(),
            outputs = output_set.outputs.len(),
            fee = self.fee,
            kind = %self.kind,
            "built confidential transfer"
        );

        Ok(Transfer {
            tx_public_key: output_set.tx_public_key,
            inputs: signatures,
            outputs: output_set.outputs,
            fee: self.fee,
            extra: self.extra.clone(),
        })
    }
}
