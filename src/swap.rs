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

//! Atomic swaps between two chains with hash time-locked contracts.
//!
//! The maker locks the `from` asset first with a long timelock, the taker then locks the `to`
//! asset under the same secret hash with a shorter timelock. The maker claims the `to` leg and
//! reveals the secret, the taker reads it from the chain and claims the `from` leg. When anything
//! goes wrong after a lock, every locked leg is refunded once its timelock is strictly past.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

use crate::blockchain::{Amount, Asset, Chain};
use crate::config::{self, PairLimits, SwapConfig};
use crate::consensus::{self, Decodable, Encodable};
use crate::htlc;
use crate::rpc;

pub mod coordinator;
pub mod negotiation;
pub mod session;
pub mod state;

pub use coordinator::{Coordinator, SwapHandle};
pub use negotiation::{Agreement, Counterparty, Quote, RateService, SwapOffer};
pub use session::{Leg, LegState, LegStatus, Legs, SwapSession};
pub use state::{SwapState, Transition};

/// The identifier of a swap session, a random [`Uuid`] (v4).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
#[display(inner)]
pub struct SwapId(pub Uuid);

impl SwapId {
    /// Draw a new random identifier.
    pub fn random() -> Self {
        SwapId(Uuid::new_v4())
    }
}

impl From<Uuid> for SwapId {
    fn from(u: Uuid) -> Self {
        SwapId(u)
    }
}

impl Encodable for SwapId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(s)
    }
}

impl Decodable for SwapId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

impl_strict_encoding!(SwapId);

/// A party of the swap and where it gets paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identity of the party.
    pub identity: String,
    /// Address receiving the asset bought by this party.
    pub receive_address: String,
    /// Address receiving the refund of the asset sold by this party.
    pub refund_address: String,
}

/// A request to swap `amount` of `from` against `to`. The maker sells `from`, the taker sells
/// `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapIntent {
    pub from: Asset,
    pub to: Asset,
    /// Amount of `from` in atomic units.
    pub amount: Amount,
    /// Quoted rate in units of `to` per unit of `from`.
    pub rate: f64,
    /// Tolerated drift of the rate in basis points, the configured default when unset.
    pub slippage_bps: Option<u32>,
    pub maker: Participant,
    /// Bound during negotiation when not known upfront.
    pub taker: Option<Participant>,
    /// Unix timestamp after which the quoted rate is stale.
    pub quote_expires_at: u64,
}

impl SwapIntent {
    /// Check the pair is supported, the amount within the pair limits and the rate usable.
    pub fn validate<'a>(&self, config: &'a SwapConfig) -> Result<&'a PairLimits, ValidationError> {
        let limits = config
            .pair(self.from, self.to)
            .ok_or(ValidationError::UnsupportedPair {
                from: self.from,
                to: self.to,
            })?;
        if !limits.contains(self.amount) {
            return Err(ValidationError::AmountOutOfRange {
                amount: self.amount,
                min: limits.min,
                max: limits.max,
            });
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(ValidationError::InvalidRate(self.rate));
        }
        if let Some(bps) = self.slippage_bps.filter(|bps| *bps > 10_000) {
            return Err(ValidationError::SlippageExceeded {
                drift_bps: bps,
                tolerance_bps: 10_000,
            });
        }
        Ok(limits)
    }

    /// Slippage tolerance in basis points.
    pub fn slippage_tolerance(&self, config: &SwapConfig) -> u32 {
        self.slippage_bps.unwrap_or(config.default_slippage_bps)
    }

    /// Amount of `to` bought at the intent rate.
    pub fn counter_amount(&self) -> Option<Amount> {
        self.from.convert(self.amount, self.to, self.rate)
    }

    /// Chain of the `from` leg.
    pub fn from_chain(&self) -> Chain {
        self.from.chain()
    }

    /// Chain of the `to` leg.
    pub fn to_chain(&self) -> Chain {
        self.to.chain()
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Rejected intents, the session does not leave [`SwapState::Idle`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported pair {from}/{to}")]
    UnsupportedPair { from: Asset, to: Asset },
    #[error("Amount {amount} outside of [{min}, {max}]")]
    AmountOutOfRange {
        amount: Amount,
        min: Amount,
        max: Amount,
    },
    #[error("Invalid rate {0}")]
    InvalidRate(f64),
    #[error("Quote expired at {expired_at}")]
    StaleQuote { expired_at: u64 },
    #[error("Rate drifted {drift_bps} bps, tolerance is {tolerance_bps} bps")]
    SlippageExceeded { drift_bps: u32, tolerance_bps: u32 },
}

/// Failed negotiations, the session goes back to [`SwapState::Idle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("Counterparty rejected the offer: {0}")]
    Rejected(String),
    #[error("Negotiation timed out")]
    Timeout,
    #[error("Rate service unavailable: {0}")]
    RateUnavailable(String),
    #[error("Counterparty unreachable: {0}")]
    Unreachable(String),
}

/// Swap errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),
    /// A chain call failed after its retries.
    #[error("Chain error: {0}")]
    Chain(rpc::Error),
    /// A timelock precondition does not hold, nothing was sent.
    #[error("Timelock violation: {0}")]
    TimelockViolation(String),
    /// A secret does not match the session hash lock, nothing was sent.
    #[error("Secret does not match the hash lock")]
    SecretMismatch,
    #[error("HTLC error: {0}")]
    Htlc(htlc::Error),
    #[error("Invalid transition {transition} from {from}")]
    InvalidTransition {
        from: SwapState,
        transition: Transition,
    },
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("No adapter registered for {0}")]
    MissingAdapter(Chain),
    /// The session has no legs, the counterparty never agreed.
    #[error("Swap {0} was not agreed")]
    NotAgreed(SwapId),
    #[error("The {0} leg is not locked")]
    LegNotLocked(Leg),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
}

impl From<htlc::Error> for Error {
    fn from(e: htlc::Error) -> Self {
        match e {
            htlc::Error::Rpc(e) => Error::Chain(e),
            htlc::Error::InvalidSecret => Error::SecretMismatch,
            htlc::Error::TimelockNotExpired { timelock, now } => {
                Error::TimelockViolation(format!("{} not expired at {}", timelock, now))
            }
            htlc::Error::TimelockExpired { timelock, now } => {
                Error::TimelockViolation(format!("{} expired at {}", timelock, now))
            }
            e => Error::Htlc(e),
        }
    }
}

impl From<rpc::Error> for Error {
    fn from(e: rpc::Error) -> Self {
        Error::Chain(e)
    }
}

/// A session that ended in [`SwapState::Failed`].
#[derive(Error, Debug)]
#[error("Swap {swap_id} failed after {last_confirmed_state}: {error}")]
pub struct SwapFailure {
    pub swap_id: SwapId,
    /// Last state reached before the failure.
    pub last_confirmed_state: SwapState,
    /// True when funds are still locked and can be refunded after the timelock.
    pub recoverable: bool,
    #[source]
    pub error: Error,
    /// The failed session, holding the contracts to refund.
    pub session: Box<SwapSession>,
}
