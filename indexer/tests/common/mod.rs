//! In-memory stand-ins for the node, the bridges and the DB.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chain_events::{BatchesByBlockHash, BridgeEventFilter, EventsByBlockHash, StateBatchSource};
use client::{
    BlockLocator, BridgeEvent, BridgeTransfer, ChainClient, ChainKind, Header, StateBatch, Token,
    TokenMetadata,
};
use ethers::types::{Address, Bytes, H256};
use indexer::{BlockStore, FilterErrorPolicy, IndexerConfig, StartBlock};
use num::BigUint;
use storage::IndexedBlock;

/// Hash of block `number` on fork `fork`.
pub fn block_hash(number: u64, fork: u8) -> H256 {
    let mut hash = H256::from_low_u64_be(number);
    hash.0[0] = 0xb0 | fork;
    hash
}

/// A linear chain of headers on a fork, parent of `from` is `parent`.
pub fn chain(from: u64, to: u64, fork: u8, parent: H256) -> Vec<Header> {
    let mut parent_hash = parent;

    (from..=to)
        .map(|number| {
            let header = Header {
                hash: block_hash(number, fork),
                parent_hash,
                number,
                timestamp: 1_000 + number * 12,
            };
            parent_hash = header.hash;
            header
        })
        .collect()
}

pub fn config(chain: ChainKind, conf_depth: u64, max_batch_size: u64, start: u64) -> IndexerConfig {
    IndexerConfig {
        chain,
        conf_depth,
        max_batch_size,
        poll_interval: Duration::from_secs(5),
        start_block: Some(StartBlock {
            number: start,
            hash: Some(block_hash(start, 0)),
        }),
        filter_error_policy: FilterErrorPolicy::KeepBlocks,
    }
}

pub fn transfer(block: &Header, log_index: u64, token: Address) -> BridgeTransfer {
    BridgeTransfer {
        from: Address::repeat_byte(0x01),
        to: Address::repeat_byte(0x02),
        l1_token: Address::repeat_byte(0x03),
        l2_token: token,
        amount: BigUint::from(1_000_000u64) * BigUint::from(block.number),
        tx_hash: H256::from_low_u64_be(block.number * 1000 + log_index),
        log_index,
        block_hash: block.hash,
        data: Bytes::default(),
    }
}

/// A node serving a scripted chain.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    headers: Mutex<HashMap<u64, Header>>,
    tip: Mutex<u64>,
    failures: Mutex<HashSet<u64>>,
    tokens: Mutex<HashMap<Address, TokenMetadata>>,
    token_calls: Mutex<HashMap<Address, usize>>,
    pub chain_id: u64,
}

impl ScriptedClient {
    pub fn new(headers: Vec<Header>) -> Arc<Self> {
        let client = Self {
            chain_id: 10,
            ..Default::default()
        };
        client.extend(headers);

        Arc::new(client)
    }

    /// Add or replace headers, the tip moves to the highest one.
    pub fn extend(&self, headers: Vec<Header>) {
        let mut known = self.headers.lock().unwrap();
        let mut tip = self.tip.lock().unwrap();

        for header in headers {
            *tip = (*tip).max(header.number);
            known.insert(header.number, header);
        }
    }

    /// Answer requests for `number` with `header`, whatever its number is.
    pub fn serve_at(&self, number: u64, header: Header) {
        self.headers.lock().unwrap().insert(number, header);
    }

    /// Make the next request for `number` fail.
    pub fn fail_once(&self, number: u64) {
        self.failures.lock().unwrap().insert(number);
    }

    pub fn add_token(&self, address: Address, metadata: TokenMetadata) {
        self.tokens.lock().unwrap().insert(address, metadata);
    }

    pub fn token_calls(&self, address: Address) -> usize {
        self.token_calls
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn tip(&self) -> Header {
        let tip = *self.tip.lock().unwrap();
        self.headers.lock().unwrap()[&tip]
    }
}

#[async_trait]
impl ChainClient for ScriptedClient {
    async fn head_header(&self) -> client::Result<Header> {
        Ok(self.tip())
    }

    async fn header_by_number(&self, number: u64) -> client::Result<Option<Header>> {
        if self.failures.lock().unwrap().remove(&number) {
            return Err(client::Error::Timeout {
                method: "header_by_number",
            });
        }

        Ok(self.headers.lock().unwrap().get(&number).copied())
    }

    async fn chain_id(&self) -> client::Result<u64> {
        Ok(self.chain_id)
    }

    async fn token_metadata(&self, address: Address) -> client::Result<TokenMetadata> {
        *self
            .token_calls
            .lock()
            .unwrap()
            .entry(address)
            .or_default() += 1;

        self.tokens
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .ok_or_else(|| client::Error::ContractError("execution reverted".to_string()))
    }
}

/// A bridge emitting scripted events.
#[derive(Debug)]
pub struct ScriptedFilter {
    name: &'static str,
    events: Mutex<Vec<(u64, BridgeEvent)>>,
    failures: AtomicUsize,
    latency: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedFilter {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            events: Mutex::new(vec![]),
            failures: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn emit(&self, block: &Header, event: BridgeEvent) {
        self.events.lock().unwrap().push((block.number, event));
    }

    /// Fail the next `times` calls.
    pub fn fail(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    /// Answer every call after `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }
}

#[async_trait]
impl BridgeEventFilter for ScriptedFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn filter(&self, start: u64, end: u64) -> chain_events::Result<EventsByBlockHash> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
            .is_ok()
        {
            return Err(chain_events::Error::Middleware(
                "connection refused".to_string(),
            ));
        }

        let mut res = EventsByBlockHash::new();
        for (number, event) in self.events.lock().unwrap().iter() {
            if (start..=end).contains(number) {
                res.entry(event.transfer().block_hash)
                    .or_default()
                    .push(event.clone());
            }
        }

        Ok(res)
    }
}

/// An in-memory store with one transaction per block.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<HashMap<ChainKind, BTreeMap<u64, IndexedBlock>>>,
    tokens: Mutex<HashMap<(ChainKind, Address), Token>>,
    fail_block: Mutex<Option<u64>>,
    fail_tokens: AtomicBool,
    pub token_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the insert of block `number` fail until cleared.
    pub fn fail_block(&self, number: Option<u64>) {
        *self.fail_block.lock().unwrap() = number;
    }

    /// Make token inserts fail until cleared.
    pub fn fail_tokens(&self, fail: bool) {
        self.fail_tokens.store(fail, Ordering::SeqCst);
    }

    pub fn blocks(&self, chain: ChainKind) -> Vec<IndexedBlock> {
        self.blocks
            .lock()
            .unwrap()
            .get(&chain)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn token(&self, chain: ChainKind, address: Address) -> Option<Token> {
        self.tokens.lock().unwrap().get(&(chain, address)).cloned()
    }

    pub fn block_numbers(&self, chain: ChainKind) -> Vec<u64> {
        self.blocks(chain).iter().map(|b| b.header.number).collect()
    }
}

fn store_error() -> storage::Error {
    storage::Error::PgError(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn add_indexed_block(
        &self,
        chain: ChainKind,
        block: &IndexedBlock,
    ) -> storage::Result<()> {
        if *self.fail_block.lock().unwrap() == Some(block.header.number) {
            return Err(store_error());
        }

        let mut blocks = self.blocks.lock().unwrap();
        let blocks = blocks.entry(chain).or_default();

        // Test hashes encode the number, a taken number is a taken hash.
        if blocks.contains_key(&block.header.number) {
            return Err(store_error());
        }
        blocks.insert(block.header.number, block.clone());

        Ok(())
    }

    async fn highest(&self, chain: ChainKind) -> storage::Result<Option<BlockLocator>> {
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&chain)
            .and_then(|b| b.values().next_back())
            .map(|b| b.header.locator()))
    }

    async fn token_by_address(
        &self,
        chain: ChainKind,
        address: Address,
    ) -> storage::Result<Option<Token>> {
        Ok(self.token(chain, address))
    }

    async fn add_token(&self, chain: ChainKind, token: &Token) -> storage::Result<()> {
        if self.fail_tokens.load(Ordering::SeqCst) {
            return Err(store_error());
        }

        self.token_writes.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .entry((chain, token.address))
            .or_insert_with(|| token.clone());

        Ok(())
    }
}

/// A bridge whose node never answers.
#[derive(Debug)]
pub struct StalledFilter;

#[async_trait]
impl BridgeEventFilter for StalledFilter {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn filter(&self, _start: u64, _end: u64) -> chain_events::Result<EventsByBlockHash> {
        std::future::pending().await
    }
}

/// State batch commitments served after a fixed latency.
#[derive(Debug)]
pub struct ScriptedBatches {
    batches: Mutex<Vec<(u64, StateBatch)>>,
    latency: Duration,
}

impl ScriptedBatches {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(vec![]),
            latency,
        })
    }

    pub fn commit(&self, block: &Header, index: u64) {
        self.batches.lock().unwrap().push((
            block.number,
            StateBatch {
                index,
                root: H256::from_low_u64_be(index),
                size: 10,
                prev_total: index * 10,
                extra_data: Bytes::default(),
                block_hash: block.hash,
            },
        ));
    }
}

#[async_trait]
impl StateBatchSource for ScriptedBatches {
    async fn state_batches(&self, start: u64, end: u64) -> chain_events::Result<BatchesByBlockHash> {
        tokio::time::sleep(self.latency).await;

        let mut res = BatchesByBlockHash::new();
        for (number, batch) in self.batches.lock().unwrap().iter() {
            if (start..=end).contains(number) {
                res.entry(batch.block_hash).or_default().push(batch.clone());
            }
        }

        Ok(res)
    }
}
