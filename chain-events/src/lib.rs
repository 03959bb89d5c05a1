#![warn(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Extraction of bridge events and state batch commitments from block ranges.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use auto_impl::auto_impl;
use client::{BridgeEvent, StateBatch};
use ethers::types::H256;

mod bridge;
mod error;
mod metrics;
mod registry;
mod retry;
mod state_batches;

pub use bridge::{Bridge, Erc20Bridge, EthBridge};
pub use error::{Error, Result};
pub use registry::BridgeRegistry;
pub use state_batches::StateBatchScanner;

/// How many times a filter request is attempted before giving up.
pub const FILTER_RETRY_ATTEMPTS: usize = 3;

/// Pause between two attempts of a filter request.
pub const FILTER_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Bridge events in a block range keyed by the hash of their block.
pub type EventsByBlockHash = HashMap<H256, Vec<BridgeEvent>>;

/// State batches in a block range keyed by the hash of their block.
pub type BatchesByBlockHash = HashMap<H256, Vec<StateBatch>>;

/// Something that yields the bridge events of a block range.
#[async_trait]
#[auto_impl(&, Arc, Box)]
pub trait BridgeEventFilter: Send + Sync {
    /// Name of the filter in logs and metrics.
    fn name(&self) -> &'static str;

    /// Query the events in the inclusive range `[start, end]`.
    ///
    /// Transient errors are retried internally. Events of one block
    /// are sorted by log index.
    ///
    /// # Arguments
    ///
    /// * `start`: First block number of the range
    /// * `end`: Last block number of the range
    async fn filter(&self, start: u64, end: u64) -> Result<EventsByBlockHash>;
}

/// Something that yields the state batches committed in a block range.
#[async_trait]
#[auto_impl(&, Arc, Box)]
pub trait StateBatchSource: Send + Sync {
    /// Query the batches committed in the inclusive range `[start, end]`.
    async fn state_batches(&self, start: u64, end: u64) -> Result<BatchesByBlockHash>;
}
