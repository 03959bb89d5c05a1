use client::ChainKind;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] client::Error),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    ChainEvents(#[from] chain_events::Error),

    #[error("{chain} node reports chain id {actual}, expected {expected}")]
    ChainIdMismatch {
        chain: ChainKind,
        expected: u64,
        actual: u64,
    },

    #[error("{0} store is empty and no start block is configured")]
    MissingStartBlock(ChainKind),

    #[error("start block {number} is not known to the {chain} node")]
    StartBlockNotFound { chain: ChainKind, number: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Indexer result type.
pub type Result<T> = std::result::Result<T, Error>;
