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

//! Pedersen commitments to amounts, `C = x·G + a·H`.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;

use crate::crypto::{random_scalar, scalar_multiply_base, H};
use crate::privacy::Error;

/// A published commitment point.
pub type Commitment = EdwardsPoint;

/// Opening of a commitment held by its creator. Only [`PedersenCommitment::commitment`] is ever
/// published.
#[derive(Clone, PartialEq, Eq)]
pub struct PedersenCommitment {
    /// The commitment point.
    pub commitment: Commitment,
    /// Blinding factor `x`.
    pub blinding: Scalar,
    /// Committed amount `a`.
    pub amount: u64,
}

impl std::fmt::Debug for PedersenCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PedersenCommitment")
            .field("commitment", &self.commitment.compress())
            .finish_non_exhaustive()
    }
}

/// `x·G + a·H`
pub fn commit(amount: u64, blinding: &Scalar) -> Commitment {
    scalar_multiply_base(blinding) + *H * Scalar::from(amount)
}

/// Commit to `amount`, drawing a random blinding factor when none is given.
pub fn create_pedersen_commitment(amount: u64, blinding: Option<Scalar>) -> PedersenCommitment {
    let blinding = blinding.unwrap_or_else(random_scalar);
    PedersenCommitment {
        commitment: commit(amount, &blinding),
        blinding,
        amount,
    }
}

/// Check that `Σ inputs == Σ outputs + fee·H`.
pub fn verify_commitment_balance(
    inputs: &[Commitment],
    outputs: &[Commitment],
    fee: u64,
) -> Result<(), Error> {
    let sum = |points: &[Commitment]| {
        points
            .iter()
            .fold(EdwardsPoint::identity(), |acc, p| acc + p)
    };
    if sum(inputs) == sum(outputs) + *H * Scalar::from(fee) {
        Ok(())
    } else {
        Err(Error::CommitmentImbalance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitments_are_hiding_and_binding() {
        let a = create_pedersen_commitment(1_000, None);
        let b = create_pedersen_commitment(1_000, None);
        assert_ne!(a.commitment, b.commitment);
        assert_eq!(commit(a.amount, &a.blinding), a.commitment);
        assert_ne!(commit(1_001, &a.blinding), a.commitment);
    }

    #[test]
    fn balanced_commitments_verify() {
        // 10 + 5 = 12 + 2 + fee 1
        let x1 = random_scalar();
        let x2 = random_scalar();
        let y1 = random_scalar();
        let y2 = x1 + x2 - y1;
        let inputs = [commit(10, &x1), commit(5, &x2)];
        let outputs = [commit(12, &y1), commit(2, &y2)];
        assert!(verify_commitment_balance(&inputs, &outputs, 1).is_ok());
        assert!(matches!(
            verify_commitment_balance(&inputs, &outputs, 0),
            Err(Error::CommitmentImbalance)
        ));
        assert!(matches!(
            verify_commitment_balance(&inputs, &[commit(13, &y1), commit(2, &y2)], 1),
            Err(Error::CommitmentImbalance)
        ));
    }

    #[test]
    fn explicit_blinding_is_kept() {
        let x = random_scalar();
        let c = create_pedersen_commitment(7, Some(x));
        assert_eq!(c.blinding, x);
        assert_eq!(c.amount, 7);
    }
}
