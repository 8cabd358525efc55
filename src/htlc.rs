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

//! Hash time-locked contracts. A contract locks funds that the recipient claims by revealing the
//! preimage of the secret hash, or that the refund address recovers once the timelock is strictly
//! past.
//!
//! [`HtlcAdapter`] is the asynchronous interface used by the swap coordinator. [`Htlc`] implements
//! it for any [`HtlcScript`], the chain specific part producing the transaction payloads. Every
//! precondition is checked against the chain state before anything is signed: a failing check
//! never reaches the chain.

use std::error;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::blockchain::{Amount, Asset, Chain, ChainTime, Timelock, TxId};
use crate::config::SwapConfig;
use crate::consensus::{self, Decodable, Encodable};
use crate::crypto::{Secret, SecretHash};
use crate::privacy;
use crate::rpc::{self, retry, ChainRpc, RetryPolicy, Signer, TxPayload};

pub mod evm;
pub mod monero;

pub use self::evm::{EvmHtlc, EvmScript};
pub use self::monero::{MoneroHtlc, MoneroLockScript, MoneroScript};

/// Errors raised by contract adapters.
#[derive(Error, Debug)]
pub enum Error {
    /// The secret does not hash to the contract's secret hash.
    #[error("Secret does not match the contract secret hash")]
    InvalidSecret,
    /// The contract was already claimed.
    #[error("Contract already claimed")]
    AlreadyClaimed,
    /// The contract was already refunded.
    #[error("Contract already refunded")]
    AlreadyRefunded,
    /// The lock transaction is not deep enough yet.
    #[error("Lock has {confirmations} confirmations, {required} required")]
    NotYetConfirmed {
        /// Current depth.
        confirmations: u32,
        /// Required depth.
        required: u32,
    },
    /// The timelock is not strictly past yet.
    #[error("Timelock {timelock} not expired at {now}")]
    TimelockNotExpired {
        /// Contract timelock.
        timelock: Timelock,
        /// Chain time when the refund was attempted.
        now: ChainTime,
    },
    /// The timelock is past, the contract can only be refunded.
    #[error("Timelock {timelock} expired at {now}")]
    TimelockExpired {
        /// Contract timelock.
        timelock: Timelock,
        /// Chain time when the claim was attempted.
        now: ChainTime,
    },
    /// The timelock flavour does not match the chain.
    #[error("Invalid timelock {0} for this chain")]
    InvalidTimelock(Timelock),
    /// No such contract on chain.
    #[error("Unknown contract {0:x}")]
    UnknownContract(ContractId),
    /// An address could not be parsed for the chain.
    #[error("Invalid address {0}")]
    InvalidAddress(String),
    /// The asset cannot be locked by this adapter.
    #[error("Asset {0} not supported")]
    UnsupportedAsset(Asset),
    /// The amount does not fit the chain's amount type.
    #[error("Amount {0} not supported")]
    InvalidAmount(Amount),
    /// Chain or signer failure.
    #[error("RPC error: {0}")]
    Rpc(#[from] rpc::Error),
    /// Privacy transaction construction failed.
    #[error("Privacy error: {0}")]
    Privacy(#[from] privacy::Error),
    /// Encoding error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus::Error),
    /// Any adapter error not part of this list.
    #[error("HTLC error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new HTLC error of type [`Self::Other`] with an arbitrary payload.
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

fixed_hash::construct_fixed_hash!(
    /// Identifier of a contract: the EVM contract id or the hash of a Monero lock script.
    #[derive(Serialize, Deserialize)]
    pub struct ContractId(32);
);

impl Encodable for ContractId {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(writer)
    }
}

impl Decodable for ContractId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

impl_strict_encoding!(ContractId);

/// Parameters of a new contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockParams {
    /// Locked asset, native or a token of the adapter's chain.
    pub asset: Asset,
    /// Hash of the swap secret.
    pub secret_hash: SecretHash,
    /// Address paid by a claim.
    pub recipient: String,
    /// Address paid by a refund.
    pub refund: String,
    /// Locked amount.
    pub amount: Amount,
    /// Absolute timelock after which the refund is allowed.
    pub timelock: Timelock,
}

/// Result of a successful lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockReceipt {
    pub contract: ContractId,
    pub lock_tx: TxId,
}

/// Contract state as observed on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractState {
    /// Funds are locked.
    Locked {
        lock_tx: TxId,
        secret_hash: SecretHash,
        recipient: String,
        refund: String,
        amount: Amount,
        timelock: Timelock,
    },
    /// Claimed, the secret is public.
    Claimed { secret: Secret, claim_tx: TxId },
    /// Refunded to the refund address.
    Refunded { refund_tx: TxId },
}

/// Contract operation carried by a [`TxPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtlcAction {
    /// Allow the HTLC to pull `amount` of a token before locking it.
    Approve {
        contract: ContractId,
        token: Asset,
        amount: Amount,
    },
    Lock {
        contract: ContractId,
        params: LockParams,
    },
    Claim {
        contract: ContractId,
        secret: Secret,
    },
    Refund {
        contract: ContractId,
    },
}

impl HtlcAction {
    /// The contract targeted by the action.
    pub fn contract(&self) -> ContractId {
        match self {
            HtlcAction::Approve { contract, .. }
            | HtlcAction::Lock { contract, .. }
            | HtlcAction::Claim { contract, .. }
            | HtlcAction::Refund { contract } => *contract,
        }
    }
}

/// Lock, claim and refund on one chain.
#[async_trait]
pub trait HtlcAdapter: Send + Sync {
    /// The chain this adapter operates on.
    fn chain(&self) -> Chain;

    /// Confirmations required before the lock can be claimed.
    fn required_confirmations(&self) -> u32;

    /// Create and fund a new contract.
    async fn lock(&self, params: LockParams) -> Result<LockReceipt, Error>;

    /// Claim a contract by revealing its secret.
    async fn claim(&self, contract: &ContractId, secret: &Secret) -> Result<TxId, Error>;

    /// Recover the funds of an expired contract.
    async fn refund(&self, contract: &ContractId) -> Result<TxId, Error>;

    /// Depth of a transaction.
    async fn confirmations(&self, tx: &TxId) -> Result<u32, Error>;

    /// Current chain clock.
    async fn chain_time(&self) -> Result<ChainTime, Error>;

    /// On chain state of a contract.
    async fn contract_state(&self, contract: &ContractId) -> Result<ContractState, Error>;

    /// The secret published by a claim, if the contract has been claimed.
    async fn observe_claim(&self, contract: &ContractId) -> Result<Option<Secret>, Error> {
        match self.contract_state(contract).await? {
            ContractState::Claimed { secret, .. } => Ok(Some(secret)),
            _ => Ok(None),
        }
    }
}

/// Chain specific encoding of the contract operations.
pub trait HtlcScript: Send + Sync {
    /// Target chain.
    fn chain(&self) -> Chain;

    /// Deterministic identifier of the contract created by `params`.
    fn contract_id(&self, params: &LockParams) -> Result<ContractId, Error>;

    /// Transaction allowing the HTLC to pull a token, `None` for native assets.
    fn approve_payload(
        &self,
        _contract: ContractId,
        _params: &LockParams,
    ) -> Result<Option<TxPayload>, Error> {
        Ok(None)
    }

    /// Transaction creating and funding the contract.
    fn lock_payload(&self, contract: ContractId, params: &LockParams) -> Result<TxPayload, Error>;

    /// Transaction claiming the contract with `secret`.
    fn claim_payload(&self, contract: &ContractId, secret: &Secret) -> Result<TxPayload, Error>;

    /// Transaction refunding the contract.
    fn refund_payload(&self, contract: &ContractId) -> Result<TxPayload, Error>;
}

/// Generic contract adapter, signs the payloads of `S` and submits them through the shared RPC.
pub struct Htlc<S> {
    script: S,
    rpc: Arc<dyn ChainRpc>,
    signer: Arc<dyn Signer>,
    required_confirmations: u32,
    retry: RetryPolicy,
}

impl<S: HtlcScript> Htlc<S> {
    /// Create an adapter with the chain's default confirmation depth and retry policy.
    pub fn new(script: S, rpc: Arc<dyn ChainRpc>, signer: Arc<dyn Signer>) -> Self {
        let required_confirmations = script.chain().default_confirmations();
        Self {
            script,
            rpc,
            signer,
            required_confirmations,
            retry: RetryPolicy::default(),
        }
    }

    /// Create an adapter with the confirmation depth and retry policy of `config`.
    pub fn from_config(
        script: S,
        rpc: Arc<dyn ChainRpc>,
        signer: Arc<dyn Signer>,
        config: &SwapConfig,
    ) -> Self {
        let confirmations = config.confirmations_for(script.chain());
        Self::new(script, rpc, signer)
            .with_confirmations(confirmations)
            .with_retry(config.retry.clone())
    }

    /// Override the confirmation depth.
    pub fn with_confirmations(mut self, confirmations: u32) -> Self {
        self.required_confirmations = confirmations;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The script encoder.
    pub fn script(&self) -> &S {
        &self.script
    }

    async fn submit(&self, payload: TxPayload) -> Result<TxId, Error> {
        let signed = self.signer.sign(payload).await?;
        let rpc = &self.rpc;
        Ok(retry("submit", &self.retry, move || rpc.submit(signed.clone())).await?)
    }

    async fn locked_state(&self, contract: &ContractId) -> Result<ContractState, Error> {
        match self.contract_state(contract).await? {
            state @ ContractState::Locked { .. } => Ok(state),
            ContractState::Claimed { .. } => Err(Error::AlreadyClaimed),
            ContractState::Refunded { .. } => Err(Error::AlreadyRefunded),
        }
    }
}

#[async_trait]
impl<S: HtlcScript> HtlcAdapter for Htlc<S> {
    fn chain(&self) -> Chain {
        self.script.chain()
    }

    fn required_confirmations(&self) -> u32 {
        self.required_confirmations
    }

    async fn lock(&self, params: LockParams) -> Result<LockReceipt, Error> {
        let chain = self.chain();
        if params.timelock.kind() != chain.timelock_kind() {
            return Err(Error::InvalidTimelock(params.timelock));
        }
        let contract = self.script.contract_id(&params)?;
        let payload = self.script.lock_payload(contract, &params)?;
        if let Some(approve) = self.script.approve_payload(contract, &params)? {
            let approve_tx = self.submit(approve).await?;
            debug!(%chain, asset = %params.asset, tx = %format!("{:x}", approve_tx), "token allowance granted");
        }
        let lock_tx = self.submit(payload).await?;
        info!(%chain, contract = %format!("{:x}", contract), timelock = %params.timelock, "contract locked");
        Ok(LockReceipt { contract, lock_tx })
    }

    async fn claim(&self, contract: &ContractId, secret: &Secret) -> Result<TxId, Error> {
        let (lock_tx, secret_hash, timelock) = match self.locked_state(contract).await? {
            ContractState::Locked {
                lock_tx,
                secret_hash,
                timelock,
                ..
            } => (lock_tx, secret_hash, timelock),
            _ => return Err(Error::UnknownContract(*contract)),
        };
        if !secret_hash.verify(secret) {
            return Err(Error::InvalidSecret);
        }
        let confirmations = self.confirmations(&lock_tx).await?;
        if confirmations < self.required_confirmations {
            return Err(Error::NotYetConfirmed {
                confirmations,
                required: self.required_confirmations,
            });
        }
        let now = self.chain_time().await?;
        if timelock.is_expired(now) {
            return Err(Error::TimelockExpired { timelock, now });
        }
        let payload = self.script.claim_payload(contract, secret)?;
        let tx = self.submit(payload).await?;
        info!(chain = %self.chain(), contract = %format!("{:x}", contract), "contract claimed");
        Ok(tx)
    }

    async fn refund(&self, contract: &ContractId) -> Result<TxId, Error> {
        let timelock = match self.locked_state(contract).await? {
            ContractState::Locked { timelock, .. } => timelock,
            _ => return Err(Error::UnknownContract(*contract)),
        };
        let now = self.chain_time().await?;
        if !timelock.is_expired(now) {
            return Err(Error::TimelockNotExpired { timelock, now });
        }
        let payload = self.script.refund_payload(contract)?;
        let tx = self.submit(payload).await?;
        info!(chain = %self.chain(), contract = %format!("{:x}", contract), "contract refunded");
        Ok(tx)
    }

    async fn confirmations(&self, tx: &TxId) -> Result<u32, Error> {
        let (rpc, chain) = (&self.rpc, self.chain());
        let depth = retry("confirmations", &self.retry, move || rpc.confirmations(chain, tx)).await?;
        debug!(%chain, tx = %format!("{:x}", tx), depth, "polled confirmations");
        Ok(depth)
    }

    async fn chain_time(&self) -> Result<ChainTime, Error> {
        let (rpc, chain) = (&self.rpc, self.chain());
        Ok(retry("chain_time", &self.retry, move || rpc.chain_time(chain)).await?)
    }

    async fn contract_state(&self, contract: &ContractId) -> Result<ContractState, Error> {
        let (rpc, chain) = (&self.rpc, self.chain());
        retry("contract_state", &self.retry, move || {
            rpc.contract_state(chain, contract)
        })
        .await?
        .ok_or(Error::UnknownContract(*contract))
    }
}
