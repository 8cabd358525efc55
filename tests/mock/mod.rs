#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cipherswap_core::blockchain::{Amount, Asset, Chain, ChainTime, TxId};
use cipherswap_core::crypto::{keccak256, KeyPair, Secret};
use cipherswap_core::htlc::{ContractId, ContractState, HtlcAction};
use cipherswap_core::rpc::{
    self, ChainObserver, ChainRpc, ContractEvent, ContractEventKind, EventCallback, Signer,
    SignedTx, TxPayload,
};
use cipherswap_core::swap::{
    Agreement, Counterparty, NegotiationError, Participant, Quote, RateService, SwapOffer,
};

pub const START_TIMESTAMP: u64 = 1_700_000_000;
pub const XMR_START_HEIGHT: u64 = 3_000_000;
pub const EVM_START_HEIGHT: u64 = 18_000_000;
pub const HTLC_CONTRACT: &str = "0x5555555555555555555555555555555555555555";

lazy_static::lazy_static! {
    pub static ref MAKER_XMR: String = monero_address();
    pub static ref TAKER_XMR: String = monero_address();
    pub static ref ESCROW_XMR: monero::Address = monero_address().parse().unwrap();
}

/// Route logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh random Monero mainnet address.
pub fn monero_address() -> String {
    let view = KeyPair::random();
    let spend = KeyPair::random();
    monero::Address::standard(
        monero::Network::Mainnet,
        monero::PublicKey::from_slice(spend.public.compress().as_bytes()).unwrap(),
        monero::PublicKey::from_slice(view.public.compress().as_bytes()).unwrap(),
    )
    .to_string()
}

/// An EVM address ending with `tag`.
pub fn evm_address(tag: u8) -> String {
    format!("0x{}{:02x}", "00".repeat(19), tag)
}

struct Ledger {
    time: ChainTime,
    block_time: u64,
    txs: HashMap<TxId, u64>,
    contracts: HashMap<ContractId, ContractState>,
    allowances: HashMap<ContractId, (Asset, Amount)>,
    reject_locks: bool,
    drop_claims: bool,
    claim_locks_with: Option<Secret>,
}

impl Ledger {
    fn new(chain: Chain) -> Self {
        let height = if chain == Chain::Monero {
            XMR_START_HEIGHT
        } else {
            EVM_START_HEIGHT
        };
        Self {
            time: ChainTime {
                height,
                timestamp: START_TIMESTAMP,
            },
            block_time: chain.block_time().as_secs(),
            txs: HashMap::new(),
            contracts: HashMap::new(),
            allowances: HashMap::new(),
            reject_locks: false,
            drop_claims: false,
            claim_locks_with: None,
        }
    }

    fn mine(&mut self, blocks: u64) {
        self.time.height += blocks;
        self.time.timestamp += blocks * self.block_time;
    }
}

/// In-memory chains holding HTLC contracts. Every `chain_time` or `confirmations` query mines
/// `blocks_per_query` blocks on the queried chain.
pub struct MockChain {
    ledgers: Mutex<HashMap<Chain, Ledger>>,
    observers: Mutex<Vec<(Chain, ContractId, ContractEventKind, EventCallback)>>,
    blocks_per_query: AtomicU64,
    fail_next_submits: AtomicU32,
    tx_counter: AtomicU64,
    submitted: Mutex<Vec<SignedTx>>,
}

impl Default for MockChain {
    fn default() -> Self {
        let ledgers = Chain::all()
            .iter()
            .map(|chain| (*chain, Ledger::new(*chain)))
            .collect();
        Self {
            ledgers: Mutex::new(ledgers),
            observers: Mutex::new(Vec::new()),
            blocks_per_query: AtomicU64::new(1),
            fail_next_submits: AtomicU32::new(0),
            tx_counter: AtomicU64::new(1),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_blocks_per_query(&self, blocks: u64) {
        self.blocks_per_query.store(blocks, Ordering::SeqCst);
    }

    pub fn reject_locks(&self, chain: Chain) {
        self.ledgers.lock().unwrap().get_mut(&chain).unwrap().reject_locks = true;
    }

    /// Claims on `chain` are accepted but never mined.
    pub fn drop_claims(&self, chain: Chain) {
        self.ledgers.lock().unwrap().get_mut(&chain).unwrap().drop_claims = true;
    }

    /// Another party claims every new lock on `chain` with `secret` right after it is mined.
    pub fn claim_locks_with(&self, chain: Chain, secret: Secret) {
        self.ledgers.lock().unwrap().get_mut(&chain).unwrap().claim_locks_with = Some(secret);
    }

    /// The next `count` submissions fail with a transport error.
    pub fn fail_next_submits(&self, count: u32) {
        self.fail_next_submits.store(count, Ordering::SeqCst);
    }

    pub fn mine(&self, chain: Chain, blocks: u64) {
        self.ledgers.lock().unwrap().get_mut(&chain).unwrap().mine(blocks);
    }

    pub fn time(&self, chain: Chain) -> ChainTime {
        self.ledgers.lock().unwrap()[&chain].time
    }

    pub fn submitted(&self) -> Vec<SignedTx> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn state(&self, chain: Chain, contract: &ContractId) -> Option<ContractState> {
        self.ledgers.lock().unwrap()[&chain]
            .contracts
            .get(contract)
            .cloned()
    }

    fn next_txid(&self) -> TxId {
        let mut id = [0u8; 32];
        id[24..].copy_from_slice(&self.tx_counter.fetch_add(1, Ordering::SeqCst).to_be_bytes());
        TxId(id)
    }

    fn advance(&self, chain: Chain) {
        let blocks = self.blocks_per_query.load(Ordering::SeqCst);
        self.mine(chain, blocks);
    }

    fn notify(&self, event: ContractEvent) {
        let observers = self.observers.lock().unwrap();
        for (chain, contract, kind, callback) in observers.iter() {
            if *chain == event.chain && *contract == event.contract && *kind == event.kind {
                callback(event.clone());
            }
        }
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn submit(&self, tx: SignedTx) -> Result<TxId, rpc::Error> {
        let pending_failures = self.fail_next_submits.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.fail_next_submits
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(rpc::Error::Transport("connection reset".into()));
        }
        let chain = tx.payload.chain;
        let txid = self.next_txid();
        let mut events = vec![];
        {
            let mut ledgers = self.ledgers.lock().unwrap();
            let ledger = ledgers
                .get_mut(&chain)
                .ok_or(rpc::Error::UnsupportedChain(chain))?;
            let now = ledger.time;
            match &tx.payload.action {
                HtlcAction::Approve {
                    contract,
                    token,
                    amount,
                } => {
                    ledger.allowances.insert(*contract, (*token, *amount));
                }
                HtlcAction::Lock { contract, params } => {
                    if ledger.reject_locks {
                        return Err(rpc::Error::Rejected("lock refused".into()));
                    }
                    if ledger.contracts.contains_key(contract) {
                        return Err(rpc::Error::Rejected("contract exists".into()));
                    }
                    if params.asset.token_contract().is_some() {
                        match ledger.allowances.remove(contract) {
                            Some((token, allowed))
                                if token == params.asset
                                    && allowed >= params.amount
                                    && tx.payload.value == 0 => {}
                            _ => return Err(rpc::Error::Rejected("allowance too low".into())),
                        }
                    } else if tx.payload.value != params.amount {
                        return Err(rpc::Error::Rejected("value does not match".into()));
                    }
                    ledger.contracts.insert(
                        *contract,
                        ContractState::Locked {
                            lock_tx: txid,
                            secret_hash: params.secret_hash,
                            recipient: params.recipient.clone(),
                            refund: params.refund.clone(),
                            amount: params.amount,
                            timelock: params.timelock,
                        },
                    );
                    events.push((*contract, ContractEventKind::Locked, txid, None));
                    if let Some(secret) = ledger.claim_locks_with.clone() {
                        if params.secret_hash.verify(&secret) {
                            let claim_tx = self.next_txid();
                            ledger.txs.insert(claim_tx, now.height + 1);
                            ledger.contracts.insert(
                                *contract,
                                ContractState::Claimed {
                                    secret: secret.clone(),
                                    claim_tx,
                                },
                            );
                            events.push((
                                *contract,
                                ContractEventKind::Claimed,
                                claim_tx,
                                Some(secret),
                            ));
                        }
                    }
                }
                HtlcAction::Claim { contract, secret } => {
                    let claimable = matches!(
                        ledger.contracts.get(contract),
                        Some(ContractState::Locked { secret_hash, timelock, .. })
                            if secret_hash.verify(secret) && !timelock.is_expired(now)
                    );
                    if !claimable {
                        return Err(rpc::Error::Rejected("claim refused".into()));
                    }
                    if !ledger.drop_claims {
                        ledger.contracts.insert(
                            *contract,
                            ContractState::Claimed {
                                secret: secret.clone(),
                                claim_tx: txid,
                            },
                        );
                        events.push((
                            *contract,
                            ContractEventKind::Claimed,
                            txid,
                            Some(secret.clone()),
                        ));
                    }
                }
                HtlcAction::Refund { contract } => {
                    let refundable = matches!(
                        ledger.contracts.get(contract),
                        Some(ContractState::Locked { timelock, .. }) if timelock.is_expired(now)
                    );
                    if !refundable {
                        return Err(rpc::Error::Rejected("refund refused".into()));
                    }
                    ledger
                        .contracts
                        .insert(*contract, ContractState::Refunded { refund_tx: txid });
                    events.push((*contract, ContractEventKind::Refunded, txid, None));
                }
            }
            if !(ledger.drop_claims && matches!(tx.payload.action, HtlcAction::Claim { .. })) {
                ledger.txs.insert(txid, now.height + 1);
            }
        }
        self.submitted.lock().unwrap().push(tx);
        for (contract, kind, tx, secret) in events {
            self.notify(ContractEvent {
                chain,
                contract,
                kind,
                tx,
                secret,
            });
        }
        Ok(txid)
    }

    async fn confirmations(&self, chain: Chain, tx: &TxId) -> Result<u32, rpc::Error> {
        self.advance(chain);
        let ledgers = self.ledgers.lock().unwrap();
        let ledger = &ledgers[&chain];
        Ok(match ledger.txs.get(tx) {
            Some(height) if ledger.time.height >= *height => {
                (ledger.time.height - height + 1) as u32
            }
            _ => 0,
        })
    }

    async fn chain_time(&self, chain: Chain) -> Result<ChainTime, rpc::Error> {
        self.advance(chain);
        Ok(self.time(chain))
    }

    async fn contract_state(
        &self,
        chain: Chain,
        contract: &ContractId,
    ) -> Result<Option<ContractState>, rpc::Error> {
        Ok(self.state(chain, contract))
    }
}

impl ChainObserver for MockChain {
    fn on_contract_event(
        &self,
        chain: Chain,
        contract: ContractId,
        kind: ContractEventKind,
        callback: EventCallback,
    ) -> Result<(), rpc::Error> {
        self.observers
            .lock()
            .unwrap()
            .push((chain, contract, kind, callback));
        Ok(())
    }
}

/// Signs with the keccak of the payload.
pub struct MockSigner;

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, payload: TxPayload) -> Result<SignedTx, rpc::Error> {
        let signature = keccak256(&[&payload.data]).to_vec();
        Ok(SignedTx { payload, signature })
    }
}

/// Quotes a fixed rate valid for `ttl` seconds.
pub struct MockRates {
    pub rate: f64,
    pub ttl: i64,
}

#[async_trait]
impl RateService for MockRates {
    async fn get_rate(&self, _from: Asset, _to: Asset) -> Result<Quote, NegotiationError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        Ok(Quote {
            rate: self.rate,
            expires_at: (now + self.ttl).max(0) as u64,
        })
    }
}

/// Agrees with `taker`, or rejects when none is set.
pub struct MockCounterparty {
    pub taker: Option<Participant>,
    pub delay: Duration,
}

#[async_trait]
impl Counterparty for MockCounterparty {
    async fn negotiate(&self, _offer: &SwapOffer) -> Result<Agreement, NegotiationError> {
        tokio::time::sleep(self.delay).await;
        match &self.taker {
            Some(taker) => Ok(Agreement {
                taker: taker.clone(),
            }),
            None => Err(NegotiationError::Rejected("not interested".into())),
        }
    }
}
