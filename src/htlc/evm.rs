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

//! HTLC contract calls on EVM chains. The deployed contract exposes
//! `newContract(address,bytes32,uint256)` for the native asset,
//! `newContract(address,bytes32,uint256,address,uint256)` for ERC-20 tokens,
//! `withdraw(bytes32,bytes32)` and `refund(bytes32)`. Arguments are ABI encoded as 32 bytes words.
//!
//! A token lock is preceded by an `approve(address,uint256)` call on the token letting the HTLC pull
//! the locked amount. Withdraw and refund pay out whatever asset the contract holds.

use crate::blockchain::{Asset, Chain, Timelock};
use crate::crypto::{keccak256, Secret};
use crate::htlc::{ContractId, Error, Htlc, HtlcAction, HtlcScript, LockParams};
use crate::rpc::TxPayload;

/// Contract adapter for EVM chains.
pub type EvmHtlc = Htlc<EvmScript>;

const NEW_CONTRACT: &str = "newContract(address,bytes32,uint256)";
const NEW_TOKEN_CONTRACT: &str = "newContract(address,bytes32,uint256,address,uint256)";
const APPROVE: &str = "approve(address,uint256)";
const WITHDRAW: &str = "withdraw(bytes32,bytes32)";
const REFUND: &str = "refund(bytes32)";

/// First four bytes of the keccak of the function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(&[signature.as_bytes()]);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Parse a `0x` prefixed 20 bytes hex address.
pub fn parse_address(address: &str) -> Result<[u8; 20], Error> {
    let hex_part = address
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;
    let bytes = hex::decode(hex_part).map_err(|_| Error::InvalidAddress(address.to_string()))?;
    let mut out = [0u8; 20];
    if bytes.len() != out.len() {
        return Err(Error::InvalidAddress(address.to_string()));
    }
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn address_word(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encodes calls to the HTLC contract deployed at `contract` on an EVM chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmScript {
    chain: Chain,
    contract: [u8; 20],
}

impl EvmScript {
    /// Calls to the HTLC deployed at `contract`, fails on non EVM chains or malformed addresses.
    pub fn new(chain: Chain, contract: &str) -> Result<Self, Error> {
        if !chain.is_evm() {
            return Err(Error::new(format!("{} is not an EVM chain", chain)));
        }
        Ok(Self {
            chain,
            contract: parse_address(contract)?,
        })
    }

    /// Address of the HTLC contract.
    pub fn contract_address(&self) -> &[u8; 20] {
        &self.contract
    }

    fn timestamp(params: &LockParams) -> Result<u64, Error> {
        match params.timelock {
            Timelock::Timestamp(t) => Ok(t),
            other => Err(Error::InvalidTimelock(other)),
        }
    }

    /// Token contract of the locked asset, `None` for the native asset. Fails for assets living
    /// on another chain.
    fn token(&self, asset: Asset) -> Result<Option<[u8; 20]>, Error> {
        if asset.chain() != self.chain {
            return Err(Error::UnsupportedAsset(asset));
        }
        asset.token_contract().map(parse_address).transpose()
    }

    fn call(&self, action: HtlcAction, value: u128, selector: [u8; 4], args: &[[u8; 32]]) -> TxPayload {
        let mut data = Vec::with_capacity(4 + 32 * args.len());
        data.extend_from_slice(&selector);
        args.iter().for_each(|word| data.extend_from_slice(word));
        TxPayload {
            chain: self.chain,
            action,
            value,
            data,
        }
    }
}

impl HtlcScript for EvmScript {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn contract_id(&self, params: &LockParams) -> Result<ContractId, Error> {
        let recipient = address_word(&parse_address(&params.recipient)?);
        let refund = address_word(&parse_address(&params.refund)?);
        let timelock = uint_word(Self::timestamp(params)? as u128);
        let amount = uint_word(params.amount);
        let token = address_word(&self.token(params.asset)?.unwrap_or_default());
        let chain_id = uint_word(self.chain.evm_chain_id().unwrap_or_default() as u128);
        Ok(ContractId::from(keccak256(&[
            &chain_id,
            &self.contract,
            &token,
            &refund,
            &recipient,
            params.secret_hash.as_bytes(),
            &amount,
            &timelock,
        ])))
    }

    fn approve_payload(
        &self,
        contract: ContractId,
        params: &LockParams,
    ) -> Result<Option<TxPayload>, Error> {
        if self.token(params.asset)?.is_none() {
            return Ok(None);
        }
        let args = [address_word(&self.contract), uint_word(params.amount)];
        Ok(Some(self.call(
            HtlcAction::Approve {
                contract,
                token: params.asset,
                amount: params.amount,
            },
            0,
            selector(APPROVE),
            &args,
        )))
    }

    fn lock_payload(&self, contract: ContractId, params: &LockParams) -> Result<TxPayload, Error> {
        let recipient = address_word(&parse_address(&params.recipient)?);
        let timelock = uint_word(Self::timestamp(params)? as u128);
        let action = HtlcAction::Lock {
            contract,
            params: params.clone(),
        };
        let payload = match self.token(params.asset)? {
            None => {
                let args = [recipient, params.secret_hash.to_fixed_bytes(), timelock];
                self.call(action, params.amount, selector(NEW_CONTRACT), &args)
            }
            Some(token) => {
                let args = [
                    recipient,
                    params.secret_hash.to_fixed_bytes(),
                    timelock,
                    address_word(&token),
                    uint_word(params.amount),
                ];
                self.call(action, 0, selector(NEW_TOKEN_CONTRACT), &args)
            }
        };
        Ok(payload)
    }

    fn claim_payload(&self, contract: &ContractId, secret: &Secret) -> Result<TxPayload, Error> {
        let args = [contract.to_fixed_bytes(), *secret.as_bytes()];
        Ok(self.call(
            HtlcAction::Claim {
                contract: *contract,
                secret: secret.clone(),
            },
            0,
            selector(WITHDRAW),
            &args,
        ))
    }

    fn refund_payload(&self, contract: &ContractId) -> Result<TxPayload, Error> {
        Ok(self.call(
            HtlcAction::Refund {
                contract: *contract,
            },
            0,
            selector(REFUND),
            &[contract.to_fixed_bytes()],
        ))
    }
}
