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

//! Drives swap sessions through their states. Each session runs on its own task, sessions share
//! the adapter registry, the chain RPC behind the adapters and the event bus.
//!
//! Claims happen only once a lock is confirmed, refunds only once a timelock is strictly past by
//! chain time. Every wait is bounded by [`Timeouts`], an expired wait leads to the refund path.
//!
//! [`Timeouts`]: crate::config::Timeouts

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::blockchain::{Amount, Chain, TxId};
use crate::config::SwapConfig;
use crate::crypto::Secret;
use crate::events::{EventBus, SwapEvent};
use crate::htlc::{self, ContractId, ContractState, HtlcAdapter, LockParams};
use crate::rpc::{ChainObserver, ContractEvent, ContractEventKind, EventCallback};
use crate::swap::negotiation::{check_quote, Counterparty, RateService, SwapOffer};
use crate::swap::session::{Leg, LegState, LegStatus, Legs, SwapSession};
use crate::swap::state::{SwapState, Transition};
use crate::swap::{
    unix_now, Error, NegotiationError, Participant, SwapFailure, SwapId, SwapIntent,
    ValidationError,
};

type Abandon = Option<watch::Receiver<bool>>;

enum Step {
    Continue,
    RefundPath,
}

enum Wait {
    Done,
    Abandoned,
    TimedOut,
}

fn abandon_requested(signal: &Abandon) -> bool {
    signal.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// A session running on its own task.
#[derive(Debug)]
pub struct SwapHandle {
    swap_id: SwapId,
    abandon: watch::Sender<bool>,
    task: JoinHandle<Result<SwapSession, SwapFailure>>,
}

impl SwapHandle {
    pub fn swap_id(&self) -> SwapId {
        self.swap_id
    }

    /// Stop driving the swap forward, locked legs are refunded once their timelock expires.
    pub fn abandon(&self) {
        if self.abandon.send(true).is_err() {
            debug!(swap_id = %self.swap_id, "abandon requested on a finished session");
        }
    }

    /// Wait for the session to reach a terminal state.
    pub async fn join(self) -> Result<Result<SwapSession, SwapFailure>, JoinError> {
        self.task.await
    }
}

/// Swap coordinator.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<SwapConfig>,
    adapters: HashMap<Chain, Arc<dyn HtlcAdapter>>,
    observer: Option<Arc<dyn ChainObserver>>,
    rates: Arc<dyn RateService>,
    events: EventBus,
}

impl Coordinator {
    /// Create a coordinator with a validated configuration.
    pub fn new(config: SwapConfig, rates: Arc<dyn RateService>) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            adapters: HashMap::new(),
            observer: None,
            rates,
            events: EventBus::default(),
        })
    }

    /// Register the adapter of a chain, replacing any previous one.
    pub fn with_adapter(mut self, adapter: Arc<dyn HtlcAdapter>) -> Self {
        self.adapters.insert(adapter.chain(), adapter);
        self
    }

    /// Receive contract events pushed by `observer` on top of polling.
    pub fn with_observer(mut self, observer: Arc<dyn ChainObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Publish on `events` instead of a private bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn adapter(&self, chain: Chain) -> Result<Arc<dyn HtlcAdapter>, Error> {
        self.adapters
            .get(&chain)
            .cloned()
            .ok_or(Error::MissingAdapter(chain))
    }

    /// Validate `intent` and open an idle session for it.
    pub fn open(&self, intent: SwapIntent) -> Result<SwapSession, Error> {
        intent.validate(&self.config)?;
        self.adapter(intent.from_chain())?;
        self.adapter(intent.to_chain())?;
        let session = SwapSession::new(intent);
        info!(swap_id = %session.id(), from = %session.intent().from, to = %session.intent().to, "swap session opened");
        self.events.emit(SwapEvent::SessionCreated {
            swap_id: session.id(),
            from: session.intent().from,
            to: session.intent().to,
        });
        Ok(session)
    }

    /// Check the quote, negotiate with `counterparty` and on agreement generate the hash lock and
    /// build both legs. A rejected or failed negotiation leaves the session idle.
    pub async fn negotiate(
        &self,
        session: &mut SwapSession,
        counterparty: &dyn Counterparty,
    ) -> Result<(), Error> {
        let intent = session.intent().clone();
        intent.validate(&self.config)?;
        let quote = self.rates.get_rate(intent.from, intent.to).await?;
        check_quote(
            &intent,
            &quote,
            intent.slippage_tolerance(&self.config),
            unix_now(),
        )?;
        let counter_amount = intent
            .counter_amount()
            .ok_or(ValidationError::InvalidRate(intent.rate))?;

        session.apply(Transition::Negotiate)?;
        let offer = SwapOffer {
            swap_id: session.id(),
            from: intent.from,
            to: intent.to,
            amount: intent.amount,
            counter_amount,
            rate: intent.rate,
            maker: intent.maker.clone(),
        };
        let agreement = match timeout(
            self.config.timeouts.negotiation,
            counterparty.negotiate(&offer),
        )
        .await
        {
            Ok(Ok(agreement)) => agreement,
            Ok(Err(err)) => return Err(self.reject(session, err)),
            Err(_) => return Err(self.reject(session, NegotiationError::Timeout)),
        };
        if let Some(expected) = &intent.taker {
            if expected.identity != agreement.taker.identity {
                let err = NegotiationError::Rejected(format!(
                    "expected taker {}, got {}",
                    expected.identity, agreement.taker.identity
                ));
                return Err(self.reject(session, err));
            }
        }

        session.apply(Transition::Agree)?;
        if let Err(err) = self.prepare(session, agreement.taker, counter_amount).await {
            warn!(swap_id = %session.id(), %err, "could not prepare the contracts");
            session.apply(Transition::Cancel)?;
            session.reset();
            return Err(err);
        }
        Ok(())
    }

    fn reject(&self, session: &mut SwapSession, err: NegotiationError) -> Error {
        warn!(swap_id = %session.id(), %err, "negotiation failed");
        if let Err(transition) = session.apply(Transition::Reject) {
            return transition;
        }
        err.into()
    }

    async fn prepare(
        &self,
        session: &mut SwapSession,
        taker: Participant,
        counter_amount: Amount,
    ) -> Result<(), Error> {
        let intent = session.intent().clone();
        let policy = &self.config.timelocks;
        let from_chain = intent.from_chain();
        let to_chain = intent.to_chain();

        let from_now = self.adapter(from_chain)?.chain_time().await?;
        let to_now = self.adapter(to_chain)?.chain_time().await?;
        let (from_lock, from_deadline) = from_chain.timelock_after(from_now, policy.first_leg);
        let (to_lock, to_deadline) = to_chain.timelock_after(to_now, policy.second_leg);
        if to_deadline.saturating_add(policy.safety_margin.as_secs()) > from_deadline {
            return Err(Error::TimelockViolation(format!(
                "second leg expires at {}, first leg at {}, margin {}s",
                to_deadline,
                from_deadline,
                policy.safety_margin.as_secs()
            )));
        }

        let legs = Legs {
            from: LegState::pending(
                intent.from,
                intent.amount,
                from_lock,
                from_deadline,
                taker.receive_address.clone(),
                intent.maker.refund_address.clone(),
            ),
            to: LegState::pending(
                intent.to,
                counter_amount,
                to_lock,
                to_deadline,
                intent.maker.receive_address.clone(),
                taker.refund_address.clone(),
            ),
        };
        info!(
            swap_id = %session.id(),
            from_timelock = %from_lock,
            to_timelock = %to_lock,
            "hash lock generated, legs built"
        );
        session.bind(taker, Secret::random(), legs);
        Ok(())
    }

    /// Give up before anything is locked.
    pub fn cancel(&self, session: &mut SwapSession) -> Result<(), Error> {
        session.apply(Transition::Cancel)?;
        session.reset();
        self.events.emit(SwapEvent::SessionCancelled {
            swap_id: session.id(),
        });
        Ok(())
    }

    /// Stop driving a session that already locked funds. The next [`execute`] goes straight to
    /// the refund path.
    ///
    /// [`execute`]: Coordinator::execute
    pub fn abandon(&self, session: &mut SwapSession) -> Result<(), Error> {
        session.apply(Transition::Abandon)?;
        warn!(swap_id = %session.id(), state = %session.state(), "swap abandoned");
        Ok(())
    }

    /// Run an agreed session on its own task.
    pub fn spawn(&self, session: SwapSession) -> SwapHandle {
        let (abandon, signal) = watch::channel(false);
        let swap_id = session.id();
        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.drive(session, Some(signal)).await });
        SwapHandle {
            swap_id,
            abandon,
            task,
        }
    }

    /// Drive an agreed session until it is completed, refunded or failed.
    pub async fn execute(&self, session: SwapSession) -> Result<SwapSession, SwapFailure> {
        self.drive(session, None).await
    }

    async fn drive(
        &self,
        mut session: SwapSession,
        signal: Abandon,
    ) -> Result<SwapSession, SwapFailure> {
        loop {
            if abandon_requested(&signal)
                && !session.is_abandoned()
                && session.state().has_locked_funds()
            {
                if let Err(err) = self.abandon(&mut session) {
                    return Err(self.fail(session, err));
                }
            }
            if session.state().is_terminal() {
                return Ok(session);
            }

            let step = if session.is_abandoned() {
                Ok(Step::RefundPath)
            } else {
                match session.state() {
                    SwapState::CreatingHtlc => self.lock_from(&mut session).await,
                    SwapState::LockingFrom => self.lock_to(&mut session, &signal).await,
                    SwapState::LockingTo => self.start_claiming(&mut session, &signal).await,
                    SwapState::Claiming => self.claim(&mut session).await,
                    _ => Err(Error::NotAgreed(session.id())),
                }
            };
            let result = match step {
                Ok(Step::Continue) => Ok(()),
                Ok(Step::RefundPath) => self.refund_path(&mut session).await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                return Err(self.fail(session, err));
            }
        }
    }

    fn fail(&self, mut session: SwapSession, error: Error) -> SwapFailure {
        let recoverable = session.is_recoverable();
        if let Err(err) = session.apply(Transition::Fail) {
            warn!(swap_id = %session.id(), %err, "session already terminal");
        }
        let last_confirmed_state = session.last_confirmed_state();
        error!(
            swap_id = %session.id(),
            state = %last_confirmed_state,
            recoverable,
            %error,
            "swap failed"
        );
        self.events.emit(SwapEvent::SessionFailed {
            swap_id: session.id(),
            last_confirmed_state,
            recoverable,
            reason: error.to_string(),
        });
        SwapFailure {
            swap_id: session.id(),
            last_confirmed_state,
            recoverable,
            error,
            session: Box::new(session),
        }
    }

    fn leg_state(session: &SwapSession, leg: Leg) -> Result<LegState, Error> {
        session
            .leg(leg)
            .cloned()
            .ok_or_else(|| Error::NotAgreed(session.id()))
    }

    fn locked_contract(session: &SwapSession, leg: Leg) -> Result<(Chain, ContractId), Error> {
        let state = Self::leg_state(session, leg)?;
        match (state.contract, state.lock_tx) {
            (Some(contract), Some(_)) => Ok((state.chain, contract)),
            _ => Err(Error::LegNotLocked(leg)),
        }
    }

    async fn lock_leg(&self, session: &mut SwapSession, leg: Leg) -> Result<(), Error> {
        let secret_hash = session
            .secret_hash()
            .ok_or_else(|| Error::NotAgreed(session.id()))?;
        let state = Self::leg_state(session, leg)?;
        let params = LockParams {
            asset: state.asset,
            secret_hash,
            recipient: state.recipient,
            refund: state.refund,
            amount: state.amount,
            timelock: state.timelock,
        };
        let receipt = self.adapter(state.chain)?.lock(params).await?;
        session.record_lock(leg, receipt.contract, receipt.lock_tx);
        info!(swap_id = %session.id(), %leg, chain = %state.chain, "leg locked");
        self.events.emit(SwapEvent::LegLocked {
            swap_id: session.id(),
            leg,
            chain: state.chain,
            contract: receipt.contract,
            tx: receipt.lock_tx,
        });
        Ok(())
    }

    fn record_claim(&self, session: &mut SwapSession, leg: Leg, tx: TxId) {
        let swap_id = session.id();
        if let Some(state) = session.legs_mut().map(|legs| legs.get_mut(leg)) {
            state.claim_tx = Some(tx);
            state.status = LegStatus::Claimed;
            info!(%swap_id, %leg, chain = %state.chain, "leg claimed");
            self.events.emit(SwapEvent::LegClaimed {
                swap_id,
                leg,
                chain: state.chain,
                tx,
            });
        }
    }

    fn record_refund(&self, session: &mut SwapSession, leg: Leg, tx: TxId) {
        let swap_id = session.id();
        if let Some(state) = session.legs_mut().map(|legs| legs.get_mut(leg)) {
            state.refund_tx = Some(tx);
            state.status = LegStatus::Refunded;
            warn!(%swap_id, %leg, chain = %state.chain, "leg refunded");
            self.events.emit(SwapEvent::LegRefunded {
                swap_id,
                leg,
                chain: state.chain,
                tx,
            });
        }
    }

    async fn lock_from(&self, session: &mut SwapSession) -> Result<Step, Error> {
        self.lock_leg(session, Leg::From).await?;
        session.apply(Transition::LockFrom)?;
        Ok(Step::Continue)
    }

    async fn lock_to(&self, session: &mut SwapSession, signal: &Abandon) -> Result<Step, Error> {
        match self.wait_confirmed(session, Leg::From, signal).await? {
            Wait::Done => {}
            Wait::Abandoned => return Ok(Step::Continue),
            Wait::TimedOut => return Ok(Step::RefundPath),
        }
        if let Err(err) = self.lock_leg(session, Leg::To).await {
            warn!(swap_id = %session.id(), %err, "to leg not locked");
            return Ok(Step::RefundPath);
        }
        session.apply(Transition::LockTo)?;
        Ok(Step::Continue)
    }

    async fn start_claiming(
        &self,
        session: &mut SwapSession,
        signal: &Abandon,
    ) -> Result<Step, Error> {
        match self.wait_confirmed(session, Leg::To, signal).await? {
            Wait::Done => {
                session.apply(Transition::Claim)?;
                Ok(Step::Continue)
            }
            Wait::Abandoned => Ok(Step::Continue),
            Wait::TimedOut => Ok(Step::RefundPath),
        }
    }

    async fn wait_confirmed(
        &self,
        session: &mut SwapSession,
        leg: Leg,
        signal: &Abandon,
    ) -> Result<Wait, Error> {
        let state = Self::leg_state(session, leg)?;
        let lock_tx = state.lock_tx.ok_or(Error::LegNotLocked(leg))?;
        let adapter = self.adapter(state.chain)?;
        let required = adapter.required_confirmations();
        let swap_id = session.id();

        let poll = async {
            loop {
                if abandon_requested(signal) {
                    return Ok::<_, Error>(Wait::Abandoned);
                }
                let depth = adapter.confirmations(&lock_tx).await?;
                debug!(%swap_id, %leg, chain = %state.chain, depth, required, "waiting for lock confirmations");
                if depth >= required {
                    return Ok(Wait::Done);
                }
                sleep(self.config.poll_interval).await;
            }
        };
        match timeout(self.config.timeouts.lock_confirmation, poll).await {
            Ok(Ok(Wait::Done)) => {
                if let Some(state) = session.legs_mut().map(|legs| legs.get_mut(leg)) {
                    state.confirmed = true;
                }
                Ok(Wait::Done)
            }
            Ok(other) => other,
            Err(_) => {
                warn!(%swap_id, %leg, "lock confirmation timed out");
                Ok(Wait::TimedOut)
            }
        }
    }

    async fn claim(&self, session: &mut SwapSession) -> Result<Step, Error> {
        let secret = session
            .secret()
            .cloned()
            .ok_or_else(|| Error::NotAgreed(session.id()))?;
        let (to_chain, to_contract) = Self::locked_contract(session, Leg::To)?;
        let to_adapter = self.adapter(to_chain)?;

        if Self::leg_state(session, Leg::To)?.status == LegStatus::Locked {
            match to_adapter.claim(&to_contract, &secret).await {
                Ok(tx) => {
                    debug!(swap_id = %session.id(), tx = %format!("{:x}", tx), "to leg claim submitted")
                }
                Err(htlc::Error::AlreadyClaimed) => {
                    info!(swap_id = %session.id(), "to leg already claimed on chain")
                }
                Err(err @ htlc::Error::TimelockExpired { .. }) => {
                    warn!(swap_id = %session.id(), %err, "to leg can no longer be claimed");
                    return Ok(Step::RefundPath);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let (observed, claim_tx) =
            match self.observe_secret(session, to_chain, to_contract).await? {
                Some(revealed) => revealed,
                None => return Ok(Step::RefundPath),
            };
        if Self::leg_state(session, Leg::To)?.status == LegStatus::Locked {
            self.record_claim(session, Leg::To, claim_tx);
        }
        if !self.settle_from(session, &observed).await? {
            return Ok(Step::RefundPath);
        }
        self.complete(session)?;
        Ok(Step::Continue)
    }

    /// Claim the `from` leg with the secret read on chain. Returns `false` when its timelock is
    /// already past and the leg is left to the refund.
    async fn settle_from(&self, session: &mut SwapSession, secret: &Secret) -> Result<bool, Error> {
        let secret_hash = session
            .secret_hash()
            .ok_or_else(|| Error::NotAgreed(session.id()))?;
        if !secret_hash.verify(secret) {
            return Err(Error::SecretMismatch);
        }
        let (from_chain, from_contract) = Self::locked_contract(session, Leg::From)?;
        let from_adapter = self.adapter(from_chain)?;
        match from_adapter.claim(&from_contract, secret).await {
            Ok(tx) => self.record_claim(session, Leg::From, tx),
            Err(htlc::Error::AlreadyClaimed) => {
                self.record_observed_claim(session, Leg::From, &*from_adapter, &from_contract)
                    .await?
            }
            Err(err @ htlc::Error::TimelockExpired { .. }) => {
                warn!(swap_id = %session.id(), %err, "from leg can no longer be claimed");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }

    /// Record the claim of `leg` made outside of this session.
    async fn record_observed_claim(
        &self,
        session: &mut SwapSession,
        leg: Leg,
        adapter: &dyn HtlcAdapter,
        contract: &ContractId,
    ) -> Result<(), Error> {
        if let ContractState::Claimed { claim_tx, .. } = adapter.contract_state(contract).await? {
            self.record_claim(session, leg, claim_tx);
        }
        Ok(())
    }

    fn complete(&self, session: &mut SwapSession) -> Result<(), Error> {
        if session.state() == SwapState::LockingTo {
            session.apply(Transition::Claim)?;
        }
        session.apply(Transition::Complete)?;
        self.events.emit(SwapEvent::SessionCompleted {
            swap_id: session.id(),
        });
        Ok(())
    }

    /// Wait for the secret published by a claim of `contract`, `None` when the wait times out.
    async fn observe_secret(
        &self,
        session: &SwapSession,
        chain: Chain,
        contract: ContractId,
    ) -> Result<Option<(Secret, TxId)>, Error> {
        let adapter = self.adapter(chain)?;
        let (sender, mut pushed) = mpsc::unbounded_channel::<ContractEvent>();
        if let Some(observer) = &self.observer {
            let callback: EventCallback = Box::new(move |event: ContractEvent| {
                if sender.send(event).is_err() {
                    debug!("contract event after the wait ended");
                }
            });
            observer.on_contract_event(chain, contract, ContractEventKind::Claimed, callback)?;
        }

        let swap_id = session.id();
        let observe = async {
            loop {
                if let ContractState::Claimed { secret, claim_tx } =
                    adapter.contract_state(&contract).await?
                {
                    return Ok::<_, Error>((secret, claim_tx));
                }
                debug!(%swap_id, %chain, "waiting for the secret on chain");
                tokio::select! {
                    Some(event) = pushed.recv() => {
                        if let Some(secret) = event.secret {
                            return Ok((secret, event.tx));
                        }
                    }
                    _ = sleep(self.config.poll_interval) => {}
                }
            }
        };
        match timeout(self.config.timeouts.claim_observation, observe).await {
            Ok(revealed) => revealed.map(Some),
            Err(_) => {
                warn!(%swap_id, %chain, "secret not observed in time");
                Ok(None)
            }
        }
    }

    /// Refund every locked leg once its timelock is past. A secret revealed meanwhile by a claim
    /// of the `to` leg is used to claim the `from` leg instead.
    async fn refund_path(&self, session: &mut SwapSession) -> Result<(), Error> {
        warn!(swap_id = %session.id(), state = %session.state(), "entering refund path");
        let budget = self.config.timelocks.first_leg + self.config.timeouts.claim_observation;
        match timeout(budget, self.refund_legs(session)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("refund")),
        }
    }

    async fn refund_legs(&self, session: &mut SwapSession) -> Result<(), Error> {
        loop {
            if self.settle_revealed(session).await? {
                return Ok(());
            }
            for leg in [Leg::To, Leg::From] {
                let state = Self::leg_state(session, leg)?;
                if !state.is_locked() {
                    continue;
                }
                let (chain, contract) = Self::locked_contract(session, leg)?;
                let adapter = self.adapter(chain)?;
                let now = adapter.chain_time().await?;
                if !state.timelock.is_expired(now) {
                    debug!(swap_id = %session.id(), %leg, %now, timelock = %state.timelock, "timelock not expired");
                    continue;
                }
                match adapter.refund(&contract).await {
                    Ok(tx) => self.record_refund(session, leg, tx),
                    Err(htlc::Error::TimelockNotExpired { .. }) => {}
                    Err(htlc::Error::AlreadyClaimed) => {
                        self.record_observed_claim(session, leg, &*adapter, &contract)
                            .await?
                    }
                    Err(htlc::Error::AlreadyRefunded) => {
                        if let ContractState::Refunded { refund_tx } =
                            adapter.contract_state(&contract).await?
                        {
                            self.record_refund(session, leg, refund_tx);
                        }
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            if !session.is_recoverable() {
                if Self::both_claimed(session) {
                    return self.complete(session);
                }
                session.apply(Transition::Refund)?;
                self.events.emit(SwapEvent::SessionRefunded {
                    swap_id: session.id(),
                });
                return Ok(());
            }
            sleep(self.config.poll_interval).await;
        }
    }

    fn both_claimed(session: &SwapSession) -> bool {
        session
            .legs()
            .map(|legs| {
                legs.from.status == LegStatus::Claimed && legs.to.status == LegStatus::Claimed
            })
            .unwrap_or(false)
    }

    /// If the `to` leg was claimed on chain while the `from` leg is still locked, claim the
    /// `from` leg with the revealed secret and complete the swap.
    async fn settle_revealed(&self, session: &mut SwapSession) -> Result<bool, Error> {
        let to = match session.leg(Leg::To) {
            Some(to) if matches!(to.status, LegStatus::Locked | LegStatus::Claimed) => to.clone(),
            _ => return Ok(false),
        };
        if !Self::leg_state(session, Leg::From)?.is_locked() {
            return Ok(false);
        }
        let contract = to.contract.ok_or(Error::LegNotLocked(Leg::To))?;
        let (secret, claim_tx) = match self.adapter(to.chain)?.contract_state(&contract).await? {
            ContractState::Claimed { secret, claim_tx } => (secret, claim_tx),
            _ => return Ok(false),
        };
        info!(swap_id = %session.id(), "secret revealed on chain, claiming the from leg");
        if to.status == LegStatus::Locked {
            self.record_claim(session, Leg::To, claim_tx);
        }
        if !self.settle_from(session, &secret).await? {
            return Ok(false);
        }
        self.complete(session)?;
        Ok(true)
    }
}
