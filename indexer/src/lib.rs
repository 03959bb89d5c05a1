#![warn(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Confirmed-header following and bridge event ingestion of one chain.

mod error;
mod header_selector;
mod metrics;
mod service;
mod store;
mod token_cache;

pub use error::{Error, Result};
pub use header_selector::{
    ConfirmedHeaderSelector, DEFAULT_CONF_DEPTH, DEFAULT_MAX_HEADER_BATCH_SIZE,
};
pub use service::{
    check_chain_id, FilterErrorPolicy, IndexerConfig, IndexerService, StartBlock, UpdateOutcome,
    DEFAULT_POLL_INTERVAL,
};
pub use store::BlockStore;
pub use token_cache::TokenCache;
