use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use client::{state_commitment_chain::codegen::StateBatchAppendedFilter, StateBatch};
use ethers::{
    abi::RawLog,
    contract::EthEvent,
    providers::Middleware,
    types::{Address, Log, H256, U256},
};
use itertools::Itertools;

use crate::{
    bridge::{get_logs, LogPosition},
    metrics::CHAIN_EVENTS_METRICS,
    retry::with_retry,
    BatchesByBlockHash, Error, Result, StateBatchSource, FILTER_RETRY_ATTEMPTS,
    FILTER_RETRY_BACKOFF,
};

/// Decodes `StateBatchAppended` commitments of the L1 state commitment chain.
#[derive(Debug)]
pub struct StateBatchScanner<M> {
    address: Address,
    middleware: Arc<M>,
    rpc_timeout: Duration,
}

fn to_u64(value: U256, field: &str, tx_hash: H256) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| Error::MalformedLog(format!("{field} {value} in {tx_hash:?} is too big")))
}

impl<M: Middleware> StateBatchScanner<M> {
    /// Create a new `StateBatchScanner`.
    ///
    /// # Arguments
    ///
    /// * `address`: Address of the state commitment chain contract on L1
    /// * `middleware`: The L1 middleware to perform requests with
    /// * `rpc_timeout`: Upper bound on a single `eth_getLogs` call
    pub fn new(address: Address, middleware: Arc<M>, rpc_timeout: Duration) -> Self {
        Self {
            address,
            middleware,
            rpc_timeout,
        }
    }

    fn decode(log: Log) -> Result<StateBatch> {
        let pos = LogPosition::try_from(&log)?;
        let raw_log: RawLog = log.into();

        let ev = StateBatchAppendedFilter::decode_log(&raw_log).map_err(|e| {
            Error::MalformedLog(format!("StateBatchAppended in {:?}: {e}", pos.tx_hash))
        })?;

        Ok(StateBatch {
            index: to_u64(ev.batch_index, "batch index", pos.tx_hash)?,
            root: H256(ev.batch_root),
            size: to_u64(ev.batch_size, "batch size", pos.tx_hash)?,
            prev_total: to_u64(ev.prev_total_elements, "prev total elements", pos.tx_hash)?,
            extra_data: ev.extra_data,
            block_hash: pos.block_hash,
        })
    }

    async fn scan_once(&self, start: u64, end: u64) -> Result<Vec<StateBatch>> {
        let logs = get_logs(
            self.middleware.as_ref(),
            self.address,
            StateBatchAppendedFilter::signature(),
            start,
            end,
            self.rpc_timeout,
        )
        .await?;

        logs.into_iter().map(Self::decode).collect()
    }
}

#[async_trait]
impl<M: Middleware + 'static> StateBatchSource for StateBatchScanner<M> {
    async fn state_batches(&self, start: u64, end: u64) -> Result<BatchesByBlockHash> {
        let batches = with_retry(
            "state_batches",
            FILTER_RETRY_ATTEMPTS,
            FILTER_RETRY_BACKOFF,
            || self.scan_once(start, end),
        )
        .await?;

        CHAIN_EVENTS_METRICS
            .state_batches
            .inc_by(batches.len() as u64);

        let mut grouped: HashMap<_, Vec<_>> =
            batches.into_iter().into_group_map_by(|b| b.block_hash);
        for group in grouped.values_mut() {
            group.sort_by_key(|b| b.index);
        }

        Ok(grouped)
    }
}
