//! Runs against the DB at `DATABASE_URL`, skipped when it is not set.

use client::{BridgeEvent, BridgeTransfer, ChainKind, Header, StateBatch, Token};
use ethers::types::{Address, Bytes, H160, H256};
use num::BigUint;
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use storage::IndexedBlock;
use uuid::Uuid;

async fn connect() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    };

    let pool = PgPool::connect(&url).await.unwrap();
    storage::migrate(&pool).await.unwrap();

    Some(pool)
}

fn random_hash() -> H256 {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    H256(bytes)
}

fn random_address() -> Address {
    H160::from_slice(&random_hash().as_bytes()[..20])
}

fn random_number() -> u64 {
    u64::from_be_bytes(random_hash().as_bytes()[..8].try_into().unwrap()) >> 16
}

fn transfer(from: Address, token: Address, block_hash: H256, log_index: u64) -> BridgeTransfer {
    BridgeTransfer {
        from,
        to: random_address(),
        l1_token: random_address(),
        l2_token: token,
        amount: BigUint::parse_bytes(b"115792089237316195423570985008687907853269984665640564039457584007913129639935", 10)
            .unwrap(),
        tx_hash: random_hash(),
        log_index,
        block_hash,
        data: Bytes::from(vec![0xde, 0xad]),
    }
}

#[tokio::test]
async fn indexed_block_round_trip() {
    let Some(pool) = connect().await else {
        return;
    };

    let header = Header {
        hash: random_hash(),
        parent_hash: random_hash(),
        number: random_number(),
        timestamp: 1_700_000_000,
    };
    let from = random_address();
    let token = random_address();

    let block = IndexedBlock {
        header,
        events: vec![
            BridgeEvent::Withdrawal(transfer(from, token, header.hash, 1)),
            BridgeEvent::Withdrawal(transfer(from, token, header.hash, 0)),
        ],
        state_batches: vec![],
    };

    storage::add_indexed_block(&pool, ChainKind::L2, &block)
        .await
        .unwrap();

    let stored = storage::block_by_hash(&pool, ChainKind::L2, header.hash)
        .await
        .unwrap();
    assert_eq!(stored, Some(header));

    // Same hash again violates the primary key.
    assert!(storage::add_indexed_block(&pool, ChainKind::L2, &IndexedBlock::empty(header))
        .await
        .is_err());

    let (events, total) = storage::events_by_address(&pool, ChainKind::L2, from, 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].log_index, 0);
    assert_eq!(events[0].token, None);

    let expected = block.events[1].transfer();
    assert_eq!(events[0].from, expected.from);
    assert_eq!(events[0].to, expected.to);
    assert_eq!(events[0].l1_token, expected.l1_token);
    assert_eq!(events[0].l2_token, expected.l2_token);
    assert_eq!(events[0].amount, expected.amount);
    assert_eq!(events[0].tx_hash, expected.tx_hash);
    assert_eq!(events[0].block_hash, header.hash);
    assert_eq!(events[0].block_number, header.number);
    assert_eq!(events[0].block_timestamp, header.timestamp);
    assert_eq!(events[0].data, expected.data);

    let (page, total) = storage::events_by_address(&pool, ChainKind::L2, from, 1, 1)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(page[0].log_index, 1);

    let token = Token {
        address: token,
        name: "Test".to_string(),
        symbol: "TST".to_string(),
        decimals: 6,
    };
    storage::add_token(&pool, ChainKind::L2, &token).await.unwrap();
    storage::add_token(&pool, ChainKind::L2, &Token::stub(token.address))
        .await
        .unwrap();

    assert_eq!(
        storage::token_by_address(&pool, ChainKind::L2, token.address)
            .await
            .unwrap(),
        Some(token.clone())
    );

    let (events, _) = storage::events_by_address(&pool, ChainKind::L2, from, 10, 0)
        .await
        .unwrap();
    assert_eq!(events[0].token, Some(token));
}

#[tokio::test]
async fn failed_block_insert_leaves_nothing_behind() {
    let Some(pool) = connect().await else {
        return;
    };

    let header = Header {
        hash: random_hash(),
        parent_hash: random_hash(),
        number: random_number(),
        timestamp: 1_700_000_000,
    };
    let from = random_address();
    let event = transfer(from, random_address(), header.hash, 0);

    // The second event duplicates `(tx_hash, log_index)` of the first one.
    let block = IndexedBlock {
        header,
        events: vec![
            BridgeEvent::Deposit(event.clone()),
            BridgeEvent::Deposit(event),
        ],
        state_batches: vec![],
    };

    assert!(storage::add_indexed_block(&pool, ChainKind::L1, &block)
        .await
        .is_err());

    assert_eq!(
        storage::block_by_hash(&pool, ChainKind::L1, header.hash)
            .await
            .unwrap(),
        None
    );
    let (_, total) = storage::events_by_address(&pool, ChainKind::L1, from, 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn events_of_the_other_chain_are_refused() {
    let Some(pool) = connect().await else {
        return;
    };

    let header = Header {
        hash: random_hash(),
        parent_hash: random_hash(),
        number: random_number(),
        timestamp: 1,
    };
    let block = IndexedBlock {
        header,
        events: vec![BridgeEvent::Withdrawal(transfer(
            random_address(),
            random_address(),
            header.hash,
            0,
        ))],
        state_batches: vec![],
    };

    let res = storage::add_indexed_block(&pool, ChainKind::L1, &block).await;

    assert!(matches!(res, Err(storage::Error::WrongChain { .. })));
}

#[tokio::test]
async fn withdrawal_is_matched_to_a_covering_batch() {
    let Some(pool) = connect().await else {
        return;
    };

    let l2_header = Header {
        hash: random_hash(),
        parent_hash: random_hash(),
        number: random_number(),
        timestamp: 1,
    };
    let withdrawal = transfer(random_address(), random_address(), l2_header.hash, 0);
    let tx_hash = withdrawal.tx_hash;

    storage::add_indexed_block(
        &pool,
        ChainKind::L2,
        &IndexedBlock {
            header: l2_header,
            events: vec![BridgeEvent::Withdrawal(withdrawal)],
            state_batches: vec![],
        },
    )
    .await
    .unwrap();

    let l1_header = Header {
        hash: random_hash(),
        parent_hash: random_hash(),
        number: random_number(),
        timestamp: 1,
    };
    let batch = StateBatch {
        index: random_number(),
        root: random_hash(),
        size: 10,
        prev_total: l2_header.number - 5,
        extra_data: Bytes::default(),
        block_hash: l1_header.hash,
    };

    storage::add_indexed_block(&pool, ChainKind::L1, &IndexedBlock::empty(l1_header))
        .await
        .unwrap();
    storage::add_state_batches(&pool, &[batch]).await.unwrap();

    let found = storage::withdrawal_batch(&pool, tx_hash)
        .await
        .unwrap()
        .unwrap();
    assert!(found.covers(l2_header.number));

    assert_eq!(
        storage::withdrawal_batch(&pool, random_hash())
            .await
            .unwrap(),
        None
    );
}
