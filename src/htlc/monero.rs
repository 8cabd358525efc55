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

//! Script-like locks on Monero. Monero has no contracts: the lock pays a confidential output to an
//! escrow wallet and commits a [`MoneroLockScript`] in the transaction extra. The escrow releases
//! the output to the recipient against the preimage, or to the refund address once the chain is
//! past the timelock height.
//!
//! The signer funds the lock from the maker's wallet, signing each input over a ring of
//! `mixin + 1` members where `mixin` is carried by the [`LockTransaction`].

use std::convert::TryFrom;
use std::io;
use std::str::FromStr;

use curve25519_dalek::edwards::EdwardsPoint;

use crate::blockchain::{Asset, Chain, Timelock};
use crate::consensus::{self, serialize, Decodable, Encodable};
use crate::crypto::{keccak256, Secret, SecretHash};
use crate::htlc::{ContractId, Error, Htlc, HtlcAction, HtlcScript, LockParams};
use crate::privacy::{
    self, Destination, TransferBuilder, TransferOutput, ViewKeys, DEFAULT_MIXIN, MIN_MIXIN,
};
use crate::rpc::TxPayload;

/// Lock adapter for Monero.
pub type MoneroHtlc = Htlc<MoneroScript>;

/// Lock conditions committed in the transaction extra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneroLockScript {
    /// Hash of the swap secret.
    pub secret_hash: SecretHash,
    /// Address paid against the secret.
    pub recipient: String,
    /// Address paid after the timelock.
    pub refund: String,
    /// Refund allowed once the chain is strictly above this height.
    pub timelock: u64,
    /// Locked amount in piconero.
    pub amount: u64,
}

impl MoneroLockScript {
    /// Contract identifier, the keccak of the encoded script.
    pub fn contract_id(&self) -> ContractId {
        ContractId::from(keccak256(&[&serialize(self)]))
    }
}

impl Encodable for MoneroLockScript {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.secret_hash.consensus_encode(s)?;
        len += self.recipient.consensus_encode(s)?;
        len += self.refund.consensus_encode(s)?;
        len += self.timelock.consensus_encode(s)?;
        Ok(len + self.amount.consensus_encode(s)?)
    }
}

impl Decodable for MoneroLockScript {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            secret_hash: Decodable::consensus_decode(d)?,
            recipient: Decodable::consensus_decode(d)?,
            refund: Decodable::consensus_decode(d)?,
            timelock: Decodable::consensus_decode(d)?,
            amount: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(MoneroLockScript);

/// Body of a lock transaction: the script in the extra and the escrow output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTransaction {
    /// Encoded [`MoneroLockScript`].
    pub extra: Vec<u8>,
    /// Transaction public key `R`.
    pub tx_public_key: EdwardsPoint,
    /// The escrow output.
    pub outputs: Vec<TransferOutput>,
    /// Decoys per ring of the funding inputs.
    pub mixin: u64,
}

impl LockTransaction {
    /// Decode the lock script carried in the extra.
    pub fn script(&self) -> Result<MoneroLockScript, consensus::Error> {
        consensus::deserialize(&self.extra)
    }
}

impl Encodable for LockTransaction {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.extra.consensus_encode(s)?;
        len += self.tx_public_key.consensus_encode(s)?;
        len += self.outputs.consensus_encode(s)?;
        Ok(len + self.mixin.consensus_encode(s)?)
    }
}

impl Decodable for LockTransaction {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            extra: Decodable::consensus_decode(d)?,
            tx_public_key: Decodable::consensus_decode(d)?,
            outputs: Decodable::consensus_decode(d)?,
            mixin: Decodable::consensus_decode(d)?,
        })
    }
}

/// Builds Monero lock, claim and refund payloads paying through `escrow`.
#[derive(Debug, Clone)]
pub struct MoneroScript {
    escrow: monero::Address,
    keys: ViewKeys,
    mixin: usize,
}

impl MoneroScript {
    /// Locks pay a stealth output owned by `escrow`.
    pub fn new(escrow: monero::Address) -> Result<Self, Error> {
        let keys = ViewKeys::from_address(&escrow)?;
        Ok(Self {
            escrow,
            keys,
            mixin: DEFAULT_MIXIN,
        })
    }

    /// Fund locks with rings of `mixin + 1` members, at least `MIN_MIXIN + 1`.
    pub fn with_mixin(mut self, mixin: usize) -> Result<Self, Error> {
        if mixin < MIN_MIXIN {
            return Err(privacy::Error::InsufficientDecoys {
                required: MIN_MIXIN,
                available: mixin,
            }
            .into());
        }
        self.mixin = mixin;
        Ok(self)
    }

    /// Decoys per ring of the funding inputs.
    pub fn mixin(&self) -> usize {
        self.mixin
    }

    /// The escrow wallet address.
    pub fn escrow(&self) -> &monero::Address {
        &self.escrow
    }

    /// Validate `params` and build the lock script they describe.
    pub fn lock_script(&self, params: &LockParams) -> Result<MoneroLockScript, Error> {
        if params.asset != Asset::Xmr {
            return Err(Error::UnsupportedAsset(params.asset));
        }
        for address in [&params.recipient, &params.refund] {
            monero::Address::from_str(address)
                .map_err(|_| Error::InvalidAddress(address.clone()))?;
        }
        let timelock = match params.timelock {
            Timelock::Height(height) => height,
            other => return Err(Error::InvalidTimelock(other)),
        };
        let amount =
            u64::try_from(params.amount).map_err(|_| Error::InvalidAmount(params.amount))?;
        Ok(MoneroLockScript {
            secret_hash: params.secret_hash,
            recipient: params.recipient.clone(),
            refund: params.refund.clone(),
            timelock,
            amount,
        })
    }
}

fn contract_call(contract: &ContractId, secret: Option<&Secret>) -> Vec<u8> {
    let mut data = serialize(contract);
    if let Some(secret) = secret {
        data.extend(serialize(secret));
    }
    data
}

impl HtlcScript for MoneroScript {
    fn chain(&self) -> Chain {
        Chain::Monero
    }

    fn contract_id(&self, params: &LockParams) -> Result<ContractId, Error> {
        Ok(self.lock_script(params)?.contract_id())
    }

    fn lock_payload(&self, contract: ContractId, params: &LockParams) -> Result<TxPayload, Error> {
        let script = self.lock_script(params)?;
        let output_set = TransferBuilder::outputs_only(&[Destination {
            keys: self.keys,
            amount: script.amount,
        }])?;
        let tx = LockTransaction {
            extra: serialize(&script),
            tx_public_key: output_set.tx_public_key,
            outputs: output_set.outputs,
            mixin: self.mixin as u64,
        };
        Ok(TxPayload {
            chain: Chain::Monero,
            action: HtlcAction::Lock {
                contract,
                params: params.clone(),
            },
            value: params.amount,
            data: serialize(&tx),
        })
    }

    fn claim_payload(&self, contract: &ContractId, secret: &Secret) -> Result<TxPayload, Error> {
        Ok(TxPayload {
            chain: Chain::Monero,
            action: HtlcAction::Claim {
                contract: *contract,
                secret: secret.clone(),
            },
            value: 0,
            data: contract_call(contract, Some(secret)),
        })
    }

    fn refund_payload(&self, contract: &ContractId) -> Result<TxPayload, Error> {
        Ok(TxPayload {
            chain: Chain::Monero,
            action: HtlcAction::Refund {
                contract: *contract,
            },
            value: 0,
            data: contract_call(contract, None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::privacy::{scan_output, verify_range_proof};

    fn wallet() -> (KeyPair, KeyPair, monero::Address) {
        let view = KeyPair::random();
        let spend = KeyPair::random();
        let address = monero::Address::standard(
            monero::Network::Mainnet,
            monero::PublicKey::from_slice(spend.public.compress().as_bytes()).unwrap(),
            monero::PublicKey::from_slice(view.public.compress().as_bytes()).unwrap(),
        );
        (view, spend, address)
    }

    fn params(timelock: Timelock, amount: u128) -> LockParams {
        LockParams {
            asset: Asset::Xmr,
            secret_hash: Secret::from_bytes([1; 32]).hash(),
            recipient: wallet().2.to_string(),
            refund: wallet().2.to_string(),
            amount,
            timelock,
        }
    }

    #[test]
    fn lock_pays_the_escrow() {
        let (view, spend, escrow) = wallet();
        let script = MoneroScript::new(escrow).unwrap();
        let params = params(Timelock::Height(3_000_000), 1_000_000_000_000);
        let contract = script.contract_id(&params).unwrap();
        let payload = script.lock_payload(contract, &params).unwrap();

        let tx: LockTransaction = consensus::deserialize(&payload.data).unwrap();
        let lock = tx.script().unwrap();
        assert_eq!(lock.timelock, 3_000_000);
        assert_eq!(lock.secret_hash, params.secret_hash);
        assert_eq!(lock.contract_id(), contract);
        assert_eq!(tx.mixin, 16);

        let output = &tx.outputs[0];
        verify_range_proof(&output.commitment, &output.range_proof).unwrap();
        let shared = scan_output(&view.secret, &spend.public, &output.stealth).unwrap();
        assert_eq!(output.open(&shared), Some(1_000_000_000_000));
    }

    #[test]
    fn contract_id_is_stable() {
        let script = MoneroScript::new(wallet().2).unwrap();
        let params = params(Timelock::Height(10), 5);
        assert_eq!(
            script.contract_id(&params).unwrap(),
            script.contract_id(&params).unwrap()
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let script = MoneroScript::new(wallet().2).unwrap();
        assert!(matches!(
            script.contract_id(&params(Timelock::Timestamp(10), 5)),
            Err(Error::InvalidTimelock(_))
        ));
        assert!(matches!(
            script.contract_id(&params(Timelock::Height(10), u64::MAX as u128 + 1)),
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(
            script.contract_id(&LockParams {
                asset: Asset::Eth,
                ..params(Timelock::Height(10), 5)
            }),
            Err(Error::UnsupportedAsset(Asset::Eth))
        ));
        let mut bad = params(Timelock::Height(10), 5);
        bad.recipient = "0x00000000000000000000000000000000000000a1".into();
        assert!(matches!(
            script.contract_id(&bad),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn lock_carries_the_configured_mixin() {
        let script = MoneroScript::new(wallet().2).unwrap().with_mixin(11).unwrap();
        let params = params(Timelock::Height(10), 5);
        let contract = script.contract_id(&params).unwrap();
        let payload = script.lock_payload(contract, &params).unwrap();
        let tx: LockTransaction = consensus::deserialize(&payload.data).unwrap();
        assert_eq!(tx.mixin, 11);
        assert!(matches!(
            MoneroScript::new(wallet().2).unwrap().with_mixin(MIN_MIXIN - 1),
            Err(Error::Privacy(privacy::Error::InsufficientDecoys { .. }))
        ));
    }

    #[test]
    fn claim_carries_the_secret() {
        let script = MoneroScript::new(wallet().2).unwrap();
        let contract = ContractId::repeat_byte(2);
        let secret = Secret::from_bytes([4; 32]);
        let payload = script.claim_payload(&contract, &secret).unwrap();
        assert_eq!(&payload.data[..32], contract.as_bytes());
        assert_eq!(&payload.data[32..], secret.as_bytes());
        assert_eq!(script.refund_payload(&contract).unwrap().data.len(), 32);
    }
}
