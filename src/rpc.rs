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

//! Boundaries towards the chains: the node RPC, the transaction signer and the contract event
//! observer, plus the retry policy and rate limiter wrapped around every chain call.
//!
//! A single [`ChainRpc`] is shared by every session, [`RateLimitedRpc`] bounds the number of
//! requests in flight and spaces them by a minimum interval.

use std::error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::blockchain::{Amount, Chain, ChainTime, TxId};
use crate::config::millis;
use crate::crypto::Secret;
use crate::htlc::{ContractId, ContractState, HtlcAction};

/// Errors raised by chain calls.
#[derive(Error, Debug)]
pub enum Error {
    /// The node could not be reached or answered garbage, worth retrying.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The node or the signer refused the request, retrying will not help.
    #[error("Rejected: {0}")]
    Rejected(String),
    /// The call did not answer in time.
    #[error("Timeout on {0}")]
    Timeout(String),
    /// Every attempt failed.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Label of the operation.
        operation: String,
        /// Attempts made.
        attempts: u32,
        /// Error of the last attempt.
        last: Box<Error>,
    },
    /// No node is configured for the chain.
    #[error("Unsupported chain {0}")]
    UnsupportedChain(Chain),
    /// Any RPC error not part of this list.
    #[error("RPC error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new RPC error of type [`Self::Other`] with an arbitrary payload.
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

    /// Transient errors are retried, rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }
}

/// An unsigned transaction: the contract action it performs and its chain specific encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPayload {
    /// Target chain.
    pub chain: Chain,
    /// What the transaction does to the contract.
    pub action: HtlcAction,
    /// Value transferred with the transaction.
    pub value: Amount,
    /// Chain specific body: EVM call data or a serialized Monero lock.
    pub data: Vec<u8>,
}

/// A transaction ready to be broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// The signed payload.
    pub payload: TxPayload,
    /// Signature or fully signed raw transaction.
    pub signature: Vec<u8>,
}

/// Holds the keys of a participant and signs the payloads produced by the adapters.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a payload.
    async fn sign(&self, payload: TxPayload) -> Result<SignedTx, Error>;
}

/// Read and write access to the nodes of every supported chain.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Broadcast a signed transaction, returns its id.
    async fn submit(&self, tx: SignedTx) -> Result<TxId, Error>;

    /// Number of confirmations of a transaction, `0` while in the mempool.
    async fn confirmations(&self, chain: Chain, tx: &TxId) -> Result<u32, Error>;

    /// Current chain clock.
    async fn chain_time(&self, chain: Chain) -> Result<ChainTime, Error>;

    /// On chain state of a contract, `None` if unknown to the chain.
    async fn contract_state(
        &self,
        chain: Chain,
        contract: &ContractId,
    ) -> Result<Option<ContractState>, Error>;
}

#[async_trait]
impl<T: ChainRpc + ?Sized> ChainRpc for Arc<T> {
    async fn submit(&self, tx: SignedTx) -> Result<TxId, Error> {
        (**self).submit(tx).await
    }

    async fn confirmations(&self, chain: Chain, tx: &TxId) -> Result<u32, Error> {
        (**self).confirmations(chain, tx).await
    }

    async fn chain_time(&self, chain: Chain) -> Result<ChainTime, Error> {
        (**self).chain_time(chain).await
    }

    async fn contract_state(
        &self,
        chain: Chain,
        contract: &ContractId,
    ) -> Result<Option<ContractState>, Error> {
        (**self).contract_state(chain, contract).await
    }
}

/// Kind of contract event a caller can subscribe to.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum ContractEventKind {
    Locked,
    Claimed,
    Refunded,
}

/// A contract event seen on chain.
#[derive(Debug, Clone)]
pub struct ContractEvent {
    pub chain: Chain,
    pub contract: ContractId,
    pub kind: ContractEventKind,
    pub tx: TxId,
    /// Preimage published by a claim.
    pub secret: Option<Secret>,
}

/// Callback invoked by a [`ChainObserver`].
pub type EventCallback = Box<dyn Fn(ContractEvent) + Send + Sync>;

/// Push notifications of contract events, an alternative to polling [`ChainRpc::contract_state`].
pub trait ChainObserver: Send + Sync {
    /// Register `callback` for events of `kind` on `contract`.
    fn on_contract_event(
        &self,
        chain: Chain,
        contract: ContractId,
        kind: ContractEventKind,
        callback: EventCallback,
    ) -> Result<(), Error>;
}

/// Bounded exponential backoff with jitter applied to chain calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled at every retry.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Upper bound of the backoff delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Maximum random delay added to every backoff.
    #[serde(with = "millis")]
    pub jitter: Duration,
    /// Timeout of a single attempt.
    #[serde(with = "millis")]
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_millis(250),
            call_timeout: Duration::from_secs(6),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(31)));
        backoff.min(self.max_delay)
    }
}

/// Run `action` until it succeeds, fails with a non retryable error or the attempts run out.
/// Every attempt is bounded by [`RetryPolicy::call_timeout`].
pub async fn retry<T, F, Fut>(label: &str, policy: &RetryPolicy, mut action: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let err = match timeout(policy.call_timeout, action()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_retryable() => return Err(err),
            Ok(Err(err)) => err,
            Err(_) => Error::Timeout(label.to_string()),
        };
        attempt += 1;
        if attempt >= attempts {
            warn!(attempts, %err, "{} exhausted its retries", label);
            return Err(Error::Exhausted {
                operation: label.to_string(),
                attempts,
                last: Box::new(err),
            });
        }
        warn!(attempt, %err, "{} failed, retrying", label);

        let jitter = if policy.jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = policy.jitter.as_millis() as u64;
            Duration::from_millis(rand::thread_rng().gen_range(0..=max))
        };
        sleep(policy.backoff(attempt - 1) + jitter).await;
    }
}

/// Limits applied to the shared RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    /// Requests allowed in flight at the same time.
    pub max_in_flight: usize,
    /// Minimum delay between two requests.
    #[serde(with = "millis")]
    pub min_interval: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        // 100 requests per minute
        Self {
            max_in_flight: 8,
            min_interval: Duration::from_millis(600),
        }
    }
}

/// A [`ChainRpc`] gated by a semaphore and a minimum request interval.
pub struct RateLimitedRpc<R> {
    inner: R,
    permits: Semaphore,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl<R> fmt::Debug for RateLimitedRpc<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedRpc")
            .field("available", &self.permits.available_permits())
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

impl<R: ChainRpc> RateLimitedRpc<R> {
    /// Wrap `inner` with `limit`.
    pub fn new(inner: R, limit: &RateLimit) -> Self {
        Self {
            inner,
            permits: Semaphore::new(limit.max_in_flight.max(1)),
            min_interval: limit.min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// The wrapped RPC.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn throttle(&self) -> Result<tokio::sync::SemaphorePermit<'_>, Error> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Transport("rate limiter closed".to_string()))?;
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(?wait, "rate limiting chain request");
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
        Ok(permit)
    }
}

#[async_trait]
impl<R: ChainRpc> ChainRpc for RateLimitedRpc<R> {
    async fn submit(&self, tx: SignedTx) -> Result<TxId, Error> {
        let _permit = self.throttle().await?;
        self.inner.submit(tx).await
    }

    async fn confirmations(&self, chain: Chain, tx: &TxId) -> Result<u32, Error> {
        let _permit = self.throttle().await?;
        self.inner.confirmations(chain, tx).await
    }

    async fn chain_time(&self, chain: Chain) -> Result<ChainTime, Error> {
        let _permit = self.throttle().await?;
        self.inner.chain_time(chain).await
    }

    async fn contract_state(
        &self,
        chain: Chain,
        contract: &ContractId,
    ) -> Result<Option<ContractState>, Error> {
        let _permit = self.throttle().await?;
        self.inner.contract_state(chain, contract).await
    }
}
