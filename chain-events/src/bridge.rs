//! Bridge event filters.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use client::{
    l1bridge::codegen::{Erc20DepositInitiatedFilter, EthDepositInitiatedFilter},
    l2bridge::codegen::WithdrawalInitiatedFilter,
    u256_to_biguint, BridgeEvent, BridgeTransfer, ChainKind,
};
use ethers::{
    abi::RawLog,
    contract::EthEvent,
    providers::Middleware,
    types::{Address, Filter, Log, H256},
};
use itertools::Itertools;

use crate::{
    metrics::CHAIN_EVENTS_METRICS, retry::with_retry, BridgeEventFilter, Error,
    EventsByBlockHash, Result, FILTER_RETRY_ATTEMPTS, FILTER_RETRY_BACKOFF,
};

/// Block hash, transaction hash and index of a log.
///
/// A log returned by `eth_getLogs` for a mined block always carries these.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogPosition {
    pub block_hash: H256,
    pub tx_hash: H256,
    pub log_index: u64,
}

impl TryFrom<&Log> for LogPosition {
    type Error = Error;

    fn try_from(log: &Log) -> Result<Self> {
        let block_hash = log
            .block_hash
            .ok_or_else(|| Error::MalformedLog("log without a block hash".to_string()))?;
        let tx_hash = log.transaction_hash.ok_or_else(|| {
            Error::MalformedLog(format!("log in block {block_hash:?} without a tx hash"))
        })?;
        let log_index = log
            .log_index
            .ok_or_else(|| Error::MalformedLog(format!("log in tx {tx_hash:?} without an index")))
            .and_then(|idx| {
                u64::try_from(idx).map_err(|_| {
                    Error::MalformedLog(format!("log index {idx} in tx {tx_hash:?} is too big"))
                })
            })?;

        Ok(Self {
            block_hash,
            tx_hash,
            log_index,
        })
    }
}

/// Query the logs emitted by `address` with the given `topic0` in `[start, end]`.
///
/// Logs flagged as removed are dropped. A node that does not answer
/// within `timeout` yields a transient [`Error::Timeout`].
pub(crate) async fn get_logs<M: Middleware>(
    middleware: &M,
    address: Address,
    topic0: H256,
    start: u64,
    end: u64,
    timeout: Duration,
) -> Result<Vec<Log>> {
    let filter = Filter::new()
        .from_block(start)
        .to_block(end)
        .address(address)
        .topic0(topic0);

    let logs = tokio::time::timeout(timeout, middleware.get_logs(&filter))
        .await
        .map_err(|_| Error::Timeout {
            method: "eth_getLogs",
            timeout,
        })?
        .map_err(|e| Error::Middleware(e.to_string()))?;

    Ok(logs
        .into_iter()
        .filter(|log| log.removed != Some(true))
        .collect())
}

/// Group events by the hash of their block, every group sorted by log index.
fn group_by_block_hash(events: Vec<BridgeEvent>) -> EventsByBlockHash {
    let mut grouped: HashMap<_, Vec<_>> = events
        .into_iter()
        .into_group_map_by(|e| e.transfer().block_hash);

    for group in grouped.values_mut() {
        group.sort_by_key(|e| e.transfer().log_index);
    }

    grouped
}

/// Native ETH deposits into the L1 standard bridge.
#[derive(Debug)]
pub struct EthBridge<M> {
    address: Address,
    middleware: Arc<M>,
    rpc_timeout: Duration,
}

impl<M: Middleware> EthBridge<M> {
    /// Create a new `EthBridge`.
    ///
    /// # Arguments
    ///
    /// * `address`: Address of the L1 standard bridge
    /// * `middleware`: The L1 middleware to perform requests with
    /// * `rpc_timeout`: Upper bound on a single `eth_getLogs` call
    pub fn new(address: Address, middleware: Arc<M>, rpc_timeout: Duration) -> Self {
        Self {
            address,
            middleware,
            rpc_timeout,
        }
    }

    fn decode(log: Log) -> Result<BridgeEvent> {
        let pos = LogPosition::try_from(&log)?;
        let raw_log: RawLog = log.into();

        let event = EthDepositInitiatedFilter::decode_log(&raw_log).map_err(|e| {
            Error::MalformedLog(format!("ETHDepositInitiated in {:?}: {e}", pos.tx_hash))
        })?;

        Ok(BridgeEvent::Deposit(BridgeTransfer {
            from: event.from,
            to: event.to,
            l1_token: ChainKind::L1.eth_address(),
            l2_token: ChainKind::L2.eth_address(),
            amount: u256_to_biguint(event.amount),
            tx_hash: pos.tx_hash,
            log_index: pos.log_index,
            block_hash: pos.block_hash,
            data: event.data,
        }))
    }

    async fn filter_once(&self, start: u64, end: u64) -> Result<Vec<BridgeEvent>> {
        let logs = get_logs(
            self.middleware.as_ref(),
            self.address,
            EthDepositInitiatedFilter::signature(),
            start,
            end,
            self.rpc_timeout,
        )
        .await?;

        CHAIN_EVENTS_METRICS.logs_received[&"eth"].inc_by(logs.len() as u64);

        logs.into_iter().map(Self::decode).collect()
    }
}

/// ERC-20 transfers through a bridge with the standard bridge event layout.
///
/// On L1 these are `ERC20DepositInitiated` events, on L2 `WithdrawalInitiated`.
#[derive(Debug)]
pub struct Erc20Bridge<M> {
    name: &'static str,
    address: Address,
    chain: ChainKind,
    middleware: Arc<M>,
    rpc_timeout: Duration,
}

impl<M: Middleware> Erc20Bridge<M> {
    /// Create a new `Erc20Bridge`.
    ///
    /// # Arguments
    ///
    /// * `name`: Name of the bridge in logs and metrics
    /// * `address`: Address of the bridge contract on `chain`
    /// * `chain`: The chain the bridge contract lives on
    /// * `middleware`: The middleware of `chain` to perform requests with
    /// * `rpc_timeout`: Upper bound on a single `eth_getLogs` call
    pub fn new(
        name: &'static str,
        address: Address,
        chain: ChainKind,
        middleware: Arc<M>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            name,
            address,
            chain,
            middleware,
            rpc_timeout,
        }
    }

    fn topic0(&self) -> H256 {
        match self.chain {
            ChainKind::L1 => Erc20DepositInitiatedFilter::signature(),
            ChainKind::L2 => WithdrawalInitiatedFilter::signature(),
        }
    }

    fn decode(&self, log: Log) -> Result<BridgeEvent> {
        let pos = LogPosition::try_from(&log)?;
        let raw_log: RawLog = log.into();

        let malformed = |e: ethers::abi::Error| {
            Error::MalformedLog(format!("{} log in {:?}: {e}", self.name, pos.tx_hash))
        };

        match self.chain {
            ChainKind::L1 => {
                let ev = Erc20DepositInitiatedFilter::decode_log(&raw_log).map_err(malformed)?;

                Ok(BridgeEvent::Deposit(BridgeTransfer {
                    from: ev.from,
                    to: ev.to,
                    l1_token: ev.l_1_token,
                    l2_token: ev.l_2_token,
                    amount: u256_to_biguint(ev.amount),
                    tx_hash: pos.tx_hash,
                    log_index: pos.log_index,
                    block_hash: pos.block_hash,
                    data: ev.data,
                }))
            }
            ChainKind::L2 => {
                let ev = WithdrawalInitiatedFilter::decode_log(&raw_log).map_err(malformed)?;

                Ok(BridgeEvent::Withdrawal(BridgeTransfer {
                    from: ev.from,
                    to: ev.to,
                    l1_token: ev.l_1_token,
                    l2_token: ev.l_2_token,
                    amount: u256_to_biguint(ev.amount),
                    tx_hash: pos.tx_hash,
                    log_index: pos.log_index,
                    block_hash: pos.block_hash,
                    data: ev.data,
                }))
            }
        }
    }

    async fn filter_once(&self, start: u64, end: u64) -> Result<Vec<BridgeEvent>> {
        let logs = get_logs(
            self.middleware.as_ref(),
            self.address,
            self.topic0(),
            start,
            end,
            self.rpc_timeout,
        )
        .await?;

        CHAIN_EVENTS_METRICS.logs_received[&self.name].inc_by(logs.len() as u64);

        logs.into_iter().map(|log| self.decode(log)).collect()
    }
}

/// All bridge variants the indexer knows how to follow.
#[derive(Debug)]
pub enum Bridge<M> {
    /// Native ETH deposits on L1.
    Eth(EthBridge<M>),
    /// The standard bridge of a chain.
    Standard(Erc20Bridge<M>),
    /// A chain specific bridge with the standard event layout.
    Custom(Erc20Bridge<M>),
}

impl<M> Bridge<M> {
    /// Name of the bridge in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Bridge::Eth(_) => "eth",
            Bridge::Standard(b) | Bridge::Custom(b) => b.name,
        }
    }
}

impl<M: Middleware> Bridge<M> {
    async fn filter_once(&self, start: u64, end: u64) -> Result<Vec<BridgeEvent>> {
        match self {
            Bridge::Eth(b) => b.filter_once(start, end).await,
            Bridge::Standard(b) | Bridge::Custom(b) => b.filter_once(start, end).await,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> BridgeEventFilter for Bridge<M> {
    fn name(&self) -> &'static str {
        Bridge::name(self)
    }

    async fn filter(&self, start: u64, end: u64) -> Result<EventsByBlockHash> {
        let name = self.name();

        let events = with_retry(name, FILTER_RETRY_ATTEMPTS, FILTER_RETRY_BACKOFF, || {
            self.filter_once(start, end)
        })
        .await?;

        if events.is_empty() {
            tracing::debug!("{name} bridge: no events in [{start}, {end}]");
            CHAIN_EVENTS_METRICS.empty_ranges[&name].inc();
        } else {
            CHAIN_EVENTS_METRICS.events_decoded[&name].inc_by(events.len() as u64);
        }

        Ok(group_by_block_hash(events))
    }
}
