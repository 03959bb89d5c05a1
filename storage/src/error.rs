use client::ChainKind;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    PgError(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Malformed {column} value {value:?} in the DB")]
    Decode { column: &'static str, value: String },

    #[error("Event {tx_hash} of {event} cannot be stored on {chain}")]
    WrongChain {
        event: ChainKind,
        chain: ChainKind,
        tx_hash: String,
    },

    #[error("Block {number} on {chain} is not {expected}")]
    LocatorMismatch {
        chain: ChainKind,
        number: u64,
        expected: String,
    },
}

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;
