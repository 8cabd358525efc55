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

//! A swap session, the aggregate mutated by the coordinator through state transitions only.

use std::fmt;

use tracing::info;

use crate::blockchain::{Amount, Asset, Chain, Timelock, TxId};
use crate::crypto::{Secret, SecretHash};
use crate::htlc::ContractId;
use crate::swap::{unix_now, Error, Participant, SwapId, SwapIntent, SwapState, Transition};

/// One of the two legs of a swap.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum Leg {
    /// Sold by the maker, locked first.
    From,
    /// Sold by the taker, locked second.
    To,
}

/// Progress of a single leg.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum LegStatus {
    Pending,
    Locked,
    Claimed,
    Refunded,
}

/// Contract of one leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegState {
    pub chain: Chain,
    pub asset: Asset,
    pub amount: Amount,
    pub timelock: Timelock,
    /// Estimated unix time of the timelock expiry, comparable across chains.
    pub deadline: u64,
    pub recipient: String,
    pub refund: String,
    pub contract: Option<ContractId>,
    pub lock_tx: Option<TxId>,
    pub claim_tx: Option<TxId>,
    pub refund_tx: Option<TxId>,
    /// The lock reached the required depth.
    pub confirmed: bool,
    pub status: LegStatus,
}

impl LegState {
    /// A leg with nothing on chain yet.
    pub fn pending(
        asset: Asset,
        amount: Amount,
        timelock: Timelock,
        deadline: u64,
        recipient: String,
        refund: String,
    ) -> Self {
        Self {
            chain: asset.chain(),
            asset,
            amount,
            timelock,
            deadline,
            recipient,
            refund,
            contract: None,
            lock_tx: None,
            claim_tx: None,
            refund_tx: None,
            confirmed: false,
            status: LegStatus::Pending,
        }
    }

    /// Funds are locked and neither claimed nor refunded.
    pub fn is_locked(&self) -> bool {
        self.status == LegStatus::Locked
    }
}

/// Both legs, built when the counterparty agrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Legs {
    pub from: LegState,
    pub to: LegState,
}

impl Legs {
    pub fn get(&self, leg: Leg) -> &LegState {
        match leg {
            Leg::From => &self.from,
            Leg::To => &self.to,
        }
    }

    pub fn get_mut(&mut self, leg: Leg) -> &mut LegState {
        match leg {
            Leg::From => &mut self.from,
            Leg::To => &mut self.to,
        }
    }
}

/// Timestamps of the session milestones, unix seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created: u64,
    pub from_locked: Option<u64>,
    pub to_locked: Option<u64>,
    pub completed: Option<u64>,
}

/// A swap in progress.
pub struct SwapSession {
    id: SwapId,
    state: SwapState,
    last_confirmed_state: SwapState,
    intent: SwapIntent,
    taker: Option<Participant>,
    legs: Option<Legs>,
    secret: Option<Secret>,
    secret_hash: Option<SecretHash>,
    abandoned: bool,
    timestamps: Timestamps,
}

impl fmt::Debug for SwapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("last_confirmed_state", &self.last_confirmed_state)
            .field("intent", &self.intent)
            .field("legs", &self.legs)
            .field("secret_hash", &self.secret_hash)
            .field("abandoned", &self.abandoned)
            .finish_non_exhaustive()
    }
}

impl SwapSession {
    /// Start a session in [`SwapState::Idle`].
    pub fn new(intent: SwapIntent) -> Self {
        let taker = intent.taker.clone();
        Self {
            id: SwapId::random(),
            state: SwapState::Idle,
            last_confirmed_state: SwapState::Idle,
            intent,
            taker,
            legs: None,
            secret: None,
            secret_hash: None,
            abandoned: false,
            timestamps: Timestamps {
                created: unix_now(),
                ..Timestamps::default()
            },
        }
    }

    pub fn id(&self) -> SwapId {
        self.id
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    /// Last state reached before a failure, or the current state.
    pub fn last_confirmed_state(&self) -> SwapState {
        self.last_confirmed_state
    }

    pub fn intent(&self) -> &SwapIntent {
        &self.intent
    }

    /// The taker, once bound.
    pub fn taker(&self) -> Option<&Participant> {
        self.taker.as_ref()
    }

    pub fn legs(&self) -> Option<&Legs> {
        self.legs.as_ref()
    }

    pub fn leg(&self, leg: Leg) -> Option<&LegState> {
        self.legs.as_ref().map(|legs| legs.get(leg))
    }

    pub fn secret_hash(&self) -> Option<SecretHash> {
        self.secret_hash
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    /// True while a leg holds funds that a refund can recover.
    pub fn is_recoverable(&self) -> bool {
        self.legs
            .as_ref()
            .map(|legs| legs.from.is_locked() || legs.to.is_locked())
            .unwrap_or(false)
    }

    /// Apply `transition`, the only way the state changes.
    pub fn apply(&mut self, transition: Transition) -> Result<SwapState, Error> {
        let next = self.state.apply(transition)?;
        if transition == Transition::Abandon {
            self.abandoned = true;
        }
        if next == SwapState::Completed {
            self.timestamps.completed = Some(unix_now());
        }
        info!(
            swap_id = %self.id,
            from = %self.state,
            to = %next,
            %transition,
            "swap state transition"
        );
        if next != SwapState::Failed {
            self.last_confirmed_state = next;
        }
        self.state = next;
        Ok(next)
    }

    pub(crate) fn bind(&mut self, taker: Participant, secret: Secret, legs: Legs) {
        self.taker = Some(taker);
        self.secret_hash = Some(secret.hash());
        self.secret = Some(secret);
        self.legs = Some(legs);
    }

    /// Drop the secret material and legs when going back to idle.
    pub(crate) fn reset(&mut self) {
        self.taker = self.intent.taker.clone();
        self.secret = None;
        self.secret_hash = None;
        self.legs = None;
    }

    /// The swap secret, kept to claim by hand after a failure.
    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    pub(crate) fn legs_mut(&mut self) -> Option<&mut Legs> {
        self.legs.as_mut()
    }

    pub(crate) fn record_lock(&mut self, leg: Leg, contract: ContractId, lock_tx: TxId) {
        let now = unix_now();
        match leg {
            Leg::From => self.timestamps.from_locked = Some(now),
            Leg::To => self.timestamps.to_locked = Some(now),
        }
        if let Some(state) = self.legs.as_mut().map(|legs| legs.get_mut(leg)) {
            state.contract = Some(contract);
            state.lock_tx = Some(lock_tx);
            state.status = LegStatus::Locked;
        }
    }
}
