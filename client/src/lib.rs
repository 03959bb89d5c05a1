#![warn(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Interactions with L1 and L2 nodes and bridge contracts.

mod error;
mod metrics;
mod types;

pub use error::{Error, Result};

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use auto_impl::auto_impl;
use ethers::{
    providers::Middleware,
    types::{Address, BlockNumber, H160},
};

use metrics::CLIENT_METRICS;

pub use types::{
    u256_to_biguint, BlockLocator, BridgeEvent, BridgeTransfer, ChainKind, Header, StateBatch,
    Token, TokenMetadata,
};

/// Native ETH sentinel token address on L1.
pub const L1_ETH_ADDRESS: Address = Address::zero();

/// Native ETH sentinel token address on L2.
pub const L2_ETH_ADDRESS: Address = H160([
    0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad,
    0xde, 0xad, 0x00, 0x00,
]);

/// Default timeout of a single call to a node.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

pub mod addresses;
pub mod erc20;
pub mod l1bridge;
pub mod l2bridge;
pub mod state_commitment_chain;

/// A typed view over a remote node of one chain.
#[async_trait]
#[auto_impl(&, Arc, Box)]
pub trait ChainClient: Send + Sync {
    /// Get the header of the current chain tip.
    async fn head_header(&self) -> Result<Header>;

    /// Get the canonical header at the given height.
    ///
    /// Returns `Ok(None)` if the node does not know the block yet.
    async fn header_by_number(&self, number: u64) -> Result<Option<Header>>;

    /// Call `eth_chainId`.
    async fn chain_id(&self) -> Result<u64>;

    /// Query `name()`, `symbol()` and `decimals()` of an ERC-20 contract.
    ///
    /// # Arguments
    ///
    /// * `address`: Address of the token contract
    async fn token_metadata(&self, address: Address) -> Result<TokenMetadata>;
}

/// [`ChainClient`] implementation over an `ethers` middleware.
///
/// Every call is bounded by the configured timeout.
#[derive(Debug)]
pub struct RpcClient<M> {
    middleware: Arc<M>,
    timeout: Duration,
}

impl<M> Clone for RpcClient<M> {
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
            timeout: self.timeout,
        }
    }
}

impl<M: Middleware + 'static> RpcClient<M> {
    /// Create a new `RpcClient`.
    ///
    /// # Arguments
    ///
    /// * `middleware`: The middleware to perform requests with
    /// * `timeout`: Upper bound on the duration of every single call
    pub fn new(middleware: Arc<M>, timeout: Duration) -> Self {
        Self {
            middleware,
            timeout,
        }
    }

    /// The underlying middleware.
    pub fn middleware(&self) -> Arc<M> {
        self.middleware.clone()
    }

    async fn timed<T, F>(&self, method: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let started = std::time::Instant::now();
        let res = match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                CLIENT_METRICS.timeouts[&method].inc();
                Err(Error::Timeout { method })
            }
        };
        CLIENT_METRICS.call[&method].observe(started.elapsed());

        if let Err(Error::MalformedResponse(ref e)) = res {
            tracing::warn!("malformed response to {method}: {e}");
            CLIENT_METRICS.malformed_responses.inc();
        }

        res
    }

    async fn block_header(&self, block: BlockNumber) -> Result<Option<Header>> {
        let block = self
            .middleware
            .get_block(block)
            .await
            .map_err(|e| Error::Middleware(e.to_string()))?;

        block.map(Header::try_from).transpose()
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for RpcClient<M> {
    async fn head_header(&self) -> Result<Header> {
        self.timed("head_header", async {
            self.block_header(BlockNumber::Latest)
                .await?
                .ok_or_else(|| Error::MalformedResponse("no latest block".to_string()))
        })
        .await
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<Header>> {
        self.timed(
            "header_by_number",
            self.block_header(BlockNumber::Number(number.into())),
        )
        .await
    }

    async fn chain_id(&self) -> Result<u64> {
        self.timed("chain_id", async {
            let chain_id = self
                .middleware
                .get_chainid()
                .await
                .map_err(|e| Error::Middleware(e.to_string()))?;

            u64::try_from(chain_id)
                .map_err(|_| Error::MalformedResponse(format!("chain id {chain_id} is too big")))
        })
        .await
    }

    async fn token_metadata(&self, address: Address) -> Result<TokenMetadata> {
        let contract = erc20::codegen::ERC20::new(address, self.middleware.clone());

        self.timed("token_metadata", async {
            let name = contract.name().call().await?;
            let symbol = contract.symbol().call().await?;
            let decimals = contract.decimals().call().await?;

            Ok::<_, Error>(TokenMetadata {
                name,
                symbol,
                decimals,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ethers::{
        providers::Provider,
        types::{Block, H256, U256, U64},
    };
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn l2_eth_sentinel() {
        assert_eq!(
            L2_ETH_ADDRESS,
            Address::from_str("0xDeadDeAddeAddEAddeadDEaDDEAdDeaDDeAD0000").unwrap()
        );
        assert_eq!(ChainKind::L1.eth_address(), L1_ETH_ADDRESS);
    }

    #[tokio::test]
    async fn header_by_number_from_mocked_node() {
        let (provider, mock) = Provider::mocked();
        let client = RpcClient::new(Arc::new(provider), DEFAULT_RPC_TIMEOUT);

        let block = Block::<H256> {
            hash: Some(H256::repeat_byte(7)),
            parent_hash: H256::repeat_byte(6),
            number: Some(U64::from(11)),
            timestamp: U256::from(100),
            ..Default::default()
        };
        mock.push(block).unwrap();

        let header = client.header_by_number(11).await.unwrap().unwrap();

        assert_eq!(header.number, 11);
        assert_eq!(header.hash, H256::repeat_byte(7));
        assert_eq!(header.parent_hash, H256::repeat_byte(6));
    }

    #[tokio::test]
    async fn chain_id_from_mocked_node() {
        let (provider, mock) = Provider::mocked();
        let client = RpcClient::new(Arc::new(provider), DEFAULT_RPC_TIMEOUT);

        mock.push(U256::from(10)).unwrap();

        assert_eq!(client.chain_id().await.unwrap(), 10);
    }
}
