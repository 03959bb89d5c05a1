use std::collections::HashMap;

use client::{ChainClient, ChainKind, Token};
use ethers::types::Address;

use crate::{store::BlockStore, Result};

/// Memoized ERC-20 metadata of the tokens of one chain.
///
/// Lookups go to the cache, then the store, then the token contract.
#[derive(Debug)]
pub struct TokenCache {
    chain: ChainKind,
    tokens: HashMap<Address, Token>,
    unsaved: HashMap<Address, Token>,
}

impl TokenCache {
    /// An empty cache apart from the native ETH sentinels.
    pub fn new(chain: ChainKind) -> Self {
        let tokens = [Token::eth(ChainKind::L1), Token::eth(ChainKind::L2)]
            .into_iter()
            .map(|t| (t.address, t))
            .collect();

        Self {
            chain,
            tokens,
            unsaved: HashMap::new(),
        }
    }

    /// Number of cached tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Is the cache empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// A cached token.
    pub fn get(&self, address: &Address) -> Option<&Token> {
        self.tokens.get(address)
    }

    /// Make sure the token at `address` is known, fetching and persisting it if needed.
    ///
    /// A failing token contract is not an error: a stub with only the
    /// address is stored instead so that the contract is never asked again.
    /// A token the store fails to persist is kept aside and its write is
    /// retried on the next call for the same address, without another
    /// contract query.
    ///
    /// # Arguments
    ///
    /// * `address`: Address of the token on the chain of this cache
    /// * `client`: Client of the chain to query the token contract with
    /// * `store`: Store to look up and persist tokens in
    pub async fn ensure<C, S>(&mut self, address: Address, client: &C, store: &S) -> Result<&Token>
    where
        C: ChainClient + ?Sized,
        S: BlockStore + ?Sized,
    {
        if self.tokens.contains_key(&address) {
            return Ok(&self.tokens[&address]);
        }

        let token = match self.unsaved.remove(&address) {
            Some(token) => self.persist(token, store).await?,
            None => match store.token_by_address(self.chain, address).await? {
                Some(token) => token,
                None => {
                    let token = match client.token_metadata(address).await {
                        Ok(metadata) => Token::with_metadata(address, metadata),
                        Err(e) => {
                            tracing::warn!(
                                "failed to query {} token {address:?}, storing a stub: {e}",
                                self.chain
                            );
                            Token::stub(address)
                        }
                    };

                    tracing::info!(
                        "new {} token {address:?} {:?} ({} decimals)",
                        self.chain,
                        token.symbol,
                        token.decimals
                    );

                    self.persist(token, store).await?
                }
            },
        };

        Ok(&*self.tokens.entry(address).or_insert(token))
    }

    async fn persist<S>(&mut self, token: Token, store: &S) -> Result<Token>
    where
        S: BlockStore + ?Sized,
    {
        match store.add_token(self.chain, &token).await {
            Ok(()) => Ok(token),
            Err(e) => {
                self.unsaved.insert(token.address, token);
                Err(e.into())
            }
        }
    }
}
