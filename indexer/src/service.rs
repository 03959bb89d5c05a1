use std::{collections::HashMap, time::Duration};

use chain_events::{BatchesByBlockHash, BridgeEventFilter, StateBatchSource};
use client::{BlockLocator, BridgeEvent, ChainClient, ChainKind, Header};
use ethers::types::H256;
use futures::future::join_all;
use storage::IndexedBlock;
use tokio_util::sync::CancellationToken;

use crate::{
    header_selector::ConfirmedHeaderSelector, metrics::INDEXER_METRICS, store::BlockStore,
    token_cache::TokenCache, Error, Result,
};

/// Default pause between two polls of the chain tip.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What to do with a batch when one of the bridge filters fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterErrorPolicy {
    /// Persist the blocks without the events of the failed filter.
    #[default]
    KeepBlocks,
    /// Persist nothing and retry the whole batch on the next iteration.
    AbortIteration,
}

/// The block to start from when nothing is persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartBlock {
    /// Number of the block. Indexing starts at the block after it.
    pub number: u64,
    /// Hash of the block, fetched from the node if not given.
    pub hash: Option<H256>,
}

/// Configuration of one indexing service.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Chain to index.
    pub chain: ChainKind,
    /// Number of blocks behind the tip a block is considered final at.
    pub conf_depth: u64,
    /// Upper bound on the number of blocks imported in one iteration.
    pub max_batch_size: u64,
    /// Pause between polls of the chain tip when there is nothing to do.
    pub poll_interval: Duration,
    /// Seed locator for an empty store.
    pub start_block: Option<StartBlock>,
    /// How to deal with failing bridge filters.
    pub filter_error_policy: FilterErrorPolicy,
}

/// The result of a single [`IndexerService::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No confirmed block to import.
    NoWork,
    /// The next confirmed block does not extend the persisted tip.
    ReorgSkipped {
        /// Persisted tip.
        high_water: BlockLocator,
        /// The block that was supposed to extend it.
        next: BlockLocator,
        /// Parent hash of `next`.
        parent_hash: H256,
    },
    /// Blocks in `[from, to]` were persisted.
    Advanced {
        /// First persisted block.
        from: u64,
        /// Last persisted block.
        to: u64,
        /// Number of filters whose events are missing from the blocks.
        filter_errors: usize,
    },
}

/// Check that the node of a chain is on the expected chain.
///
/// Returns the chain id reported by the node.
///
/// # Arguments
///
/// * `client`: Client of the chain
/// * `chain`: Which of the two chains this is
/// * `expected`: Configured chain id, if any
pub async fn check_chain_id<C>(client: &C, chain: ChainKind, expected: Option<u64>) -> Result<u64>
where
    C: ChainClient + ?Sized,
{
    let actual = client.chain_id().await?;

    match expected {
        Some(expected) if expected != actual => Err(Error::ChainIdMismatch {
            chain,
            expected,
            actual,
        }),
        _ => Ok(actual),
    }
}

/// Follows one chain and persists its confirmed blocks with their bridge events.
pub struct IndexerService<C, S> {
    chain: ChainKind,
    client: C,
    store: S,
    selector: ConfirmedHeaderSelector,
    filters: Vec<Box<dyn BridgeEventFilter>>,
    state_batches: Option<Box<dyn StateBatchSource>>,
    token_cache: TokenCache,
    high_water: BlockLocator,
    poll_interval: Duration,
    filter_error_policy: FilterErrorPolicy,
}

impl<C, S> IndexerService<C, S>
where
    C: ChainClient,
    S: BlockStore,
{
    /// Create a new `IndexerService`.
    ///
    /// The starting point is the highest persisted block, or the configured
    /// start block if nothing is persisted yet.
    ///
    /// # Arguments
    ///
    /// * `config`: Service configuration
    /// * `client`: Client of the chain
    /// * `store`: Store to persist blocks into
    /// * `filters`: Bridge filters of the chain
    /// * `state_batches`: State batch source, L1 only
    pub async fn new(
        config: IndexerConfig,
        client: C,
        store: S,
        filters: Vec<Box<dyn BridgeEventFilter>>,
        state_batches: Option<Box<dyn StateBatchSource>>,
    ) -> Result<Self> {
        let chain = config.chain;
        let selector = ConfirmedHeaderSelector::new(config.conf_depth, config.max_batch_size)?;

        if chain == ChainKind::L2 && state_batches.is_some() {
            return Err(Error::InvalidConfig(
                "state batches are only committed on L1".to_string(),
            ));
        }

        let high_water = match store.highest(chain).await? {
            Some(locator) => {
                tracing::info!(
                    "{chain} resuming after block {} {:?}",
                    locator.number,
                    locator.hash
                );
                locator
            }
            None => {
                let start = config.start_block.ok_or(Error::MissingStartBlock(chain))?;

                let hash = match start.hash {
                    Some(hash) => hash,
                    None => {
                        client
                            .header_by_number(start.number)
                            .await?
                            .ok_or(Error::StartBlockNotFound {
                                chain,
                                number: start.number,
                            })?
                            .hash
                    }
                };

                tracing::info!(
                    "{chain} store is empty, starting after block {} {hash:?}",
                    start.number
                );

                BlockLocator {
                    number: start.number,
                    hash,
                }
            }
        };

        INDEXER_METRICS.sync_height[&chain.as_str()].set(high_water.number as i64);

        Ok(Self {
            chain,
            client,
            store,
            selector,
            filters,
            state_batches,
            token_cache: TokenCache::new(chain),
            high_water,
            poll_interval: config.poll_interval,
            filter_error_policy: config.filter_error_policy,
        })
    }

    /// Locator of the last persisted block.
    pub fn high_water(&self) -> BlockLocator {
        self.high_water
    }

    /// The token cache of the service.
    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }

    /// Import the next batch of blocks confirmed at `tip`.
    ///
    /// Blocks are persisted one transaction each in ascending order, the
    /// high water mark follows every successful write. A failing write
    /// ends the iteration with an error.
    pub async fn update(&mut self, tip: &Header) -> Result<UpdateOutcome> {
        let chain = self.chain;
        let label = chain.as_str();
        let started = std::time::Instant::now();

        INDEXER_METRICS.tip_height[&label].set(tip.number as i64);

        let catching_up = tip.number.saturating_sub(self.selector.conf_depth())
            > self
                .high_water
                .number
                .saturating_add(self.selector.max_batch_size());
        INDEXER_METRICS.catching_up[&label].set(catching_up as i64);

        let headers = self
            .selector
            .select(&self.client, self.high_water, tip)
            .await;

        let (Some(first), Some(last)) = (headers.first(), headers.last()) else {
            return Ok(UpdateOutcome::NoWork);
        };

        if first.number != self.high_water.number + 1 || first.parent_hash != self.high_water.hash
        {
            tracing::error!(
                "{chain} block {} {:?} with parent {:?} does not extend persisted block {} {:?}",
                first.number,
                first.hash,
                first.parent_hash,
                self.high_water.number,
                self.high_water.hash,
            );
            INDEXER_METRICS.reorgs_detected[&label].inc();

            return Ok(UpdateOutcome::ReorgSkipped {
                high_water: self.high_water,
                next: first.locator(),
                parent_hash: first.parent_hash,
            });
        }

        let (start, end) = (first.number, last.number);

        let (events, batches) = tokio::join!(
            self.collect_events(start, end),
            self.collect_state_batches(start, end),
        );
        let (mut events, filter_errors) = events?;
        let mut batches = batches?;

        for header in &headers {
            for event in events.get(&header.hash).into_iter().flatten() {
                let address = event.local_token();
                if let Err(e) = self
                    .token_cache
                    .ensure(address, &self.client, &self.store)
                    .await
                {
                    tracing::warn!("failed to cache {chain} token {address:?}: {e}");
                }
            }
        }
        INDEXER_METRICS.cached_tokens[&label].set(self.token_cache.len() as i64);

        for header in headers.iter() {
            let block = IndexedBlock {
                header: *header,
                events: events.remove(&header.hash).unwrap_or_default(),
                state_batches: batches.remove(&header.hash).unwrap_or_default(),
            };

            if let Err(e) = self.store.add_indexed_block(chain, &block).await {
                tracing::error!("failed to persist {chain} block {}: {e}", header.number);
                INDEXER_METRICS.store_errors[&label].inc();

                return Err(e.into());
            }

            self.high_water = header.locator();
            INDEXER_METRICS.sync_height[&label].set(header.number as i64);
            INDEXER_METRICS.indexed_events[&label].inc_by(block.events.len() as u64);
        }

        INDEXER_METRICS.update_duration[&label].observe(started.elapsed());

        tracing::info!(
            "{chain} imported blocks [{start}, {end}] {:?}",
            self.high_water.hash
        );

        Ok(UpdateOutcome::Advanced {
            from: start,
            to: end,
            filter_errors,
        })
    }

    async fn collect_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<(HashMap<H256, Vec<BridgeEvent>>, usize)> {
        let results = join_all(
            self.filters
                .iter()
                .map(|f| async move { (f.name(), f.filter(start, end).await) }),
        )
        .await;

        let mut events: HashMap<H256, Vec<BridgeEvent>> = HashMap::new();
        let mut errors = 0;

        for (name, res) in results {
            match res {
                Ok(by_block) => {
                    for (hash, block_events) in by_block {
                        events.entry(hash).or_default().extend(block_events);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "{} bridge {name} failed on [{start}, {end}]: {e}",
                        self.chain
                    );
                    INDEXER_METRICS.filter_errors[&self.chain.as_str()].inc();

                    if self.filter_error_policy == FilterErrorPolicy::AbortIteration {
                        return Err(e.into());
                    }
                    errors += 1;
                }
            }
        }

        for block_events in events.values_mut() {
            block_events.sort_by_key(|e| e.transfer().log_index);
        }

        Ok((events, errors))
    }

    async fn collect_state_batches(&self, start: u64, end: u64) -> Result<BatchesByBlockHash> {
        match &self.state_batches {
            Some(source) => source.state_batches(start, end).await.map_err(|e| {
                tracing::error!("state batches on [{start}, {end}] failed: {e}");
                e.into()
            }),
            None => Ok(HashMap::new()),
        }
    }

    async fn tick(&mut self) -> Result<UpdateOutcome> {
        let tip = self.client.head_header().await?;

        self.update(&tip).await
    }

    /// Run the service until `cancel` is triggered.
    ///
    /// Iterations follow each other without a pause while they import
    /// blocks, so a service far behind the tip catches up at full speed.
    /// Cancellation interrupts an iteration in flight. Blocks are written
    /// one transaction each, so an interrupted iteration keeps the blocks
    /// it already persisted and nothing of the one in progress.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            "starting {} indexer after block {}",
            self.chain,
            self.high_water.number
        );

        while !cancel.is_cancelled() {
            let res = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.tick() => res,
            };

            let idle = match res {
                Ok(UpdateOutcome::Advanced { .. }) => false,
                Ok(UpdateOutcome::NoWork) | Ok(UpdateOutcome::ReorgSkipped { .. }) => true,
                Err(e) => {
                    tracing::error!("{} indexer iteration failed: {e}", self.chain);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!(
            "{} indexer stopped after block {}",
            self.chain,
            self.high_water.number
        );

        Ok(())
    }
}
