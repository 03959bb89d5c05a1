use async_trait::async_trait;
use auto_impl::auto_impl;
use client::{BlockLocator, ChainKind, Token};
use ethers::types::Address;
use sqlx::PgPool;
use storage::IndexedBlock;

/// The part of the storage the indexing services write through.
#[async_trait]
#[auto_impl(&, Arc, Box)]
pub trait BlockStore: Send + Sync {
    /// Persist a block with its events in one transaction.
    async fn add_indexed_block(&self, chain: ChainKind, block: &IndexedBlock)
        -> storage::Result<()>;

    /// Locator of the highest persisted block.
    async fn highest(&self, chain: ChainKind) -> storage::Result<Option<BlockLocator>>;

    /// Look up a known token.
    async fn token_by_address(
        &self,
        chain: ChainKind,
        address: Address,
    ) -> storage::Result<Option<Token>>;

    /// Persist a token.
    async fn add_token(&self, chain: ChainKind, token: &Token) -> storage::Result<()>;
}

#[async_trait]
impl BlockStore for PgPool {
    async fn add_indexed_block(
        &self,
        chain: ChainKind,
        block: &IndexedBlock,
    ) -> storage::Result<()> {
        storage::add_indexed_block(self, chain, block).await
    }

    async fn highest(&self, chain: ChainKind) -> storage::Result<Option<BlockLocator>> {
        storage::highest(self, chain).await
    }

    async fn token_by_address(
        &self,
        chain: ChainKind,
        address: Address,
    ) -> storage::Result<Option<Token>> {
        storage::token_by_address(self, chain, address).await
    }

    async fn add_token(&self, chain: ChainKind, token: &Token) -> storage::Result<()> {
        storage::add_token(self, chain, token).await
    }
}
