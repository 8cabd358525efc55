use std::sync::Arc;
use std::time::Duration;

use cipherswap_core::blockchain::{Asset, Chain, Timelock};
use cipherswap_core::config::SwapConfig;
use cipherswap_core::crypto::Secret;
use cipherswap_core::htlc::{
    ContractState, Error, EvmHtlc, EvmScript, HtlcAction, HtlcAdapter, LockParams, MoneroHtlc,
    MoneroLockScript, MoneroScript,
};
use cipherswap_core::consensus::serialize;
use cipherswap_core::rpc::{self, ChainRpc, RateLimit, RateLimitedRpc, RetryPolicy};

mod mock;

use mock::*;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        jitter: Duration::ZERO,
        call_timeout: Duration::from_secs(1),
    }
}

fn evm(chain: &Arc<MockChain>) -> EvmHtlc {
    EvmHtlc::new(
        EvmScript::new(Chain::Ethereum, HTLC_CONTRACT).unwrap(),
        chain.clone(),
        Arc::new(MockSigner),
    )
    .with_retry(fast_retry())
}

fn evm_params(secret: &Secret, timelock: u64) -> LockParams {
    LockParams {
        asset: Asset::Eth,
        secret_hash: secret.hash(),
        recipient: evm_address(0xa1),
        refund: evm_address(0xb2),
        amount: Asset::Eth.milli_units(50),
        timelock: Timelock::Timestamp(timelock),
    }
}

#[tokio::test(start_paused = true)]
async fn claim_waits_for_confirmations() {
    let chain = MockChain::new();
    chain.set_blocks_per_query(0);
    let adapter = evm(&chain);
    let secret = Secret::random();

    let receipt = adapter
        .lock(evm_params(&secret, START_TIMESTAMP + 3600))
        .await
        .unwrap();
    assert!(matches!(
        adapter.claim(&receipt.contract, &secret).await,
        Err(Error::NotYetConfirmed {
            confirmations: 0,
            required: 12
        })
    ));

    chain.mine(Chain::Ethereum, 12);
    let claim_tx = adapter.claim(&receipt.contract, &secret).await.unwrap();
    assert_eq!(
        adapter.contract_state(&receipt.contract).await.unwrap(),
        ContractState::Claimed {
            secret: secret.clone(),
            claim_tx
        }
    );
    assert_eq!(
        adapter.observe_claim(&receipt.contract).await.unwrap(),
        Some(secret.clone())
    );
    assert!(matches!(
        adapter.claim(&receipt.contract, &secret).await,
        Err(Error::AlreadyClaimed)
    ));
    assert!(matches!(
        adapter.refund(&receipt.contract).await,
        Err(Error::AlreadyClaimed)
    ));
}

#[tokio::test(start_paused = true)]
async fn wrong_secret_is_never_submitted() {
    let chain = MockChain::new();
    let adapter = evm(&chain);
    let secret = Secret::random();
    let receipt = adapter
        .lock(evm_params(&secret, START_TIMESTAMP + 3600))
        .await
        .unwrap();
    chain.mine(Chain::Ethereum, 20);

    assert!(matches!(
        adapter.claim(&receipt.contract, &Secret::random()).await,
        Err(Error::InvalidSecret)
    ));
    assert_eq!(chain.submitted().len(), 1);
    assert_eq!(adapter.observe_claim(&receipt.contract).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn refund_needs_a_strictly_expired_timelock() {
    let chain = MockChain::new();
    chain.set_blocks_per_query(0);
    let adapter = evm(&chain);
    let secret = Secret::random();
    // 10 blocks of 12s
    let timelock = START_TIMESTAMP + 120;
    let receipt = adapter.lock(evm_params(&secret, timelock)).await.unwrap();

    chain.mine(Chain::Ethereum, 10);
    assert_eq!(chain.time(Chain::Ethereum).timestamp, timelock);
    assert!(matches!(
        adapter.refund(&receipt.contract).await,
        Err(Error::TimelockNotExpired { .. })
    ));

    chain.mine(Chain::Ethereum, 1);
    let refund_tx = adapter.refund(&receipt.contract).await.unwrap();
    assert_eq!(
        chain.state(Chain::Ethereum, &receipt.contract),
        Some(ContractState::Refunded { refund_tx })
    );
    assert!(matches!(
        adapter.refund(&receipt.contract).await,
        Err(Error::AlreadyRefunded)
    ));
    assert!(matches!(
        adapter.claim(&receipt.contract, &secret).await,
        Err(Error::AlreadyRefunded)
    ));
}

#[tokio::test(start_paused = true)]
async fn claim_is_refused_once_the_timelock_is_past() {
    let chain = MockChain::new();
    chain.set_blocks_per_query(0);
    let adapter = evm(&chain);
    let secret = Secret::random();
    // 10 and 20 blocks of 12s
    let early = adapter
        .lock(evm_params(&secret, START_TIMESTAMP + 120))
        .await
        .unwrap();
    let late = adapter
        .lock(evm_params(&secret, START_TIMESTAMP + 240))
        .await
        .unwrap();

    chain.mine(Chain::Ethereum, 12);
    match adapter.claim(&early.contract, &secret).await {
        Err(Error::TimelockExpired { timelock, now }) => {
            assert_eq!(timelock, Timelock::Timestamp(START_TIMESTAMP + 120));
            assert_eq!(now.timestamp, START_TIMESTAMP + 144);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(chain.submitted().len(), 2);
    assert!(matches!(
        chain.state(Chain::Ethereum, &early.contract),
        Some(ContractState::Locked { .. })
    ));

    // still claimable at the timelock itself
    chain.mine(Chain::Ethereum, 8);
    assert_eq!(chain.time(Chain::Ethereum).timestamp, START_TIMESTAMP + 240);
    adapter.claim(&late.contract, &secret).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn token_lock_grants_an_allowance_first() {
    let chain = MockChain::new();
    let adapter = evm(&chain);
    let secret = Secret::random();
    let params = LockParams {
        asset: Asset::Dai,
        amount: Asset::Dai.milli_units(25_000),
        ..evm_params(&secret, START_TIMESTAMP + 3600)
    };

    let receipt = adapter.lock(params.clone()).await.unwrap();
    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(
        submitted[0].payload.action,
        HtlcAction::Approve {
            contract: receipt.contract,
            token: Asset::Dai,
            amount: params.amount,
        }
    );
    assert_eq!(submitted[0].payload.value, 0);
    assert_eq!(submitted[1].payload.value, 0);
    assert_eq!(submitted[1].payload.data.len(), 4 + 5 * 32);

    chain.mine(Chain::Ethereum, 12);
    adapter.claim(&receipt.contract, &secret).await.unwrap();
    assert_eq!(
        adapter.observe_claim(&receipt.contract).await.unwrap(),
        Some(secret)
    );

    let polygon = EvmHtlc::new(
        EvmScript::new(Chain::Polygon, HTLC_CONTRACT).unwrap(),
        chain.clone(),
        Arc::new(MockSigner),
    );
    assert!(matches!(
        polygon.lock(params).await,
        Err(Error::UnsupportedAsset(Asset::Dai))
    ));
}

#[tokio::test(start_paused = true)]
async fn adapters_follow_the_configuration() {
    let chain = MockChain::new();
    let mut config = SwapConfig::from_yaml(
        "confirmations:\n  Ethereum: 3\nretry:\n  max_attempts: 2\n  base_delay: 10\n",
    )
    .unwrap();
    config.retry.jitter = Duration::ZERO;
    let adapter = EvmHtlc::from_config(
        EvmScript::new(Chain::Ethereum, HTLC_CONTRACT).unwrap(),
        chain.clone(),
        Arc::new(MockSigner),
        &config,
    );
    assert_eq!(adapter.required_confirmations(), 3);

    chain.fail_next_submits(2);
    match adapter
        .lock(evm_params(&Secret::random(), START_TIMESTAMP + 3600))
        .await
    {
        Err(Error::Rpc(rpc::Error::Exhausted { attempts, .. })) => assert_eq!(attempts, 2),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn evm_lock_payload() {
    let chain = MockChain::new();
    let adapter = evm(&chain);
    let secret = Secret::random();
    let params = evm_params(&secret, START_TIMESTAMP + 3600);

    assert!(matches!(
        adapter
            .lock(LockParams {
                timelock: Timelock::Height(100),
                ..params.clone()
            })
            .await,
        Err(Error::InvalidTimelock(Timelock::Height(100)))
    ));
    assert!(matches!(
        adapter
            .lock(LockParams {
                recipient: "a1".into(),
                ..params.clone()
            })
            .await,
        Err(Error::InvalidAddress(_))
    ));

    let receipt = adapter.lock(params.clone()).await.unwrap();
    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 1);
    let payload = &submitted[0].payload;
    assert_eq!(payload.chain, Chain::Ethereum);
    assert_eq!(payload.value, params.amount);
    assert_eq!(payload.data.len(), 4 + 3 * 32);
    assert_eq!(
        payload.action,
        HtlcAction::Lock {
            contract: receipt.contract,
            params
        }
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_contract() {
    let chain = MockChain::new();
    let adapter = evm(&chain);
    let contract = Default::default();
    assert!(matches!(
        adapter.claim(&contract, &Secret::random()).await,
        Err(Error::UnknownContract(_))
    ));
    assert!(matches!(
        adapter.refund(&contract).await,
        Err(Error::UnknownContract(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn monero_lock_and_claim() {
    let chain = MockChain::new();
    let adapter = MoneroHtlc::new(
        MoneroScript::new(*ESCROW_XMR).unwrap(),
        chain.clone(),
        Arc::new(MockSigner),
    )
    .with_retry(fast_retry());
    assert_eq!(adapter.chain(), Chain::Monero);
    assert_eq!(adapter.required_confirmations(), 10);

    let secret = Secret::random();
    let params = LockParams {
        asset: Asset::Xmr,
        secret_hash: secret.hash(),
        recipient: TAKER_XMR.clone(),
        refund: MAKER_XMR.clone(),
        amount: Asset::Xmr.milli_units(1_500),
        timelock: Timelock::Height(XMR_START_HEIGHT + 1440),
    };
    assert!(matches!(
        adapter
            .lock(LockParams {
                timelock: Timelock::Timestamp(START_TIMESTAMP),
                ..params.clone()
            })
            .await,
        Err(Error::InvalidTimelock(_))
    ));
    assert!(matches!(
        adapter
            .lock(LockParams {
                refund: evm_address(1),
                ..params.clone()
            })
            .await,
        Err(Error::InvalidAddress(_))
    ));

    let receipt = adapter.lock(params.clone()).await.unwrap();
    let script: MoneroLockScript = adapter.script().lock_script(&params).unwrap();
    assert_eq!(receipt.contract, script.contract_id());
    let lock = &chain.submitted()[0].payload;
    assert_eq!(lock.value, params.amount);
    assert!(!lock.data.is_empty());

    chain.mine(Chain::Monero, 10);
    adapter.claim(&receipt.contract, &secret).await.unwrap();
    assert_eq!(
        adapter.observe_claim(&receipt.contract).await.unwrap(),
        Some(secret.clone())
    );
    // the claim publishes the secret next to the contract id
    let claim = &chain.submitted()[1].payload;
    assert_eq!(
        claim.data,
        [serialize(&receipt.contract), serialize(&secret)].concat()
    );
}

#[tokio::test(start_paused = true)]
async fn submit_retries_transport_errors() {
    let chain = MockChain::new();
    let adapter = evm(&chain);
    let secret = Secret::random();

    chain.fail_next_submits(2);
    adapter
        .lock(evm_params(&secret, START_TIMESTAMP + 3600))
        .await
        .unwrap();

    chain.fail_next_submits(3);
    match adapter.lock(evm_params(&secret, START_TIMESTAMP + 7200)).await {
        Err(Error::Rpc(rpc::Error::Exhausted { attempts, .. })) => assert_eq!(attempts, 3),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_lock_is_not_retried() {
    let chain = MockChain::new();
    chain.reject_locks(Chain::Ethereum);
    let adapter = evm(&chain);
    assert!(matches!(
        adapter
            .lock(evm_params(&Secret::random(), START_TIMESTAMP + 3600))
            .await,
        Err(Error::Rpc(rpc::Error::Rejected(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_rpc_spaces_requests() {
    let limited = RateLimitedRpc::new(
        MockChain::default(),
        &RateLimit {
            max_in_flight: 2,
            min_interval: Duration::from_millis(500),
        },
    );

    let start = tokio::time::Instant::now();
    for _ in 0..3 {
        limited.chain_time(Chain::Polygon).await.unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert_eq!(
        limited.inner().time(Chain::Polygon).height,
        EVM_START_HEIGHT + 3
    );
}
