//! Chain data model shared by the indexer crates.

use std::fmt;

use ethers::types::{Address, Block, Bytes, H256, U256};
use num::BigUint;
use serde::Serialize;

use crate::{Error, Result, L1_ETH_ADDRESS, L2_ETH_ADDRESS};

/// Which of the two followed chains a piece of data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// The settlement chain, deposits originate here.
    L1,
    /// The rollup, withdrawals originate here.
    L2,
}

impl ChainKind {
    /// Short lower-case name, used as a metric label and table prefix.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChainKind::L1 => "l1",
            ChainKind::L2 => "l2",
        }
    }

    /// Address of the native asset sentinel token on this chain.
    pub const fn eth_address(&self) -> Address {
        match self {
            ChainKind::L1 => L1_ETH_ADDRESS,
            ChainKind::L2 => L2_ETH_ADDRESS,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The minimal state needed to resume indexing a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockLocator {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: H256,
}

/// A block header as far as the indexer cares about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Hash of the block.
    pub hash: H256,
    /// Hash of the parent block.
    pub parent_hash: H256,
    /// Block number.
    pub number: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

impl Header {
    /// The locator pointing at this header.
    pub fn locator(&self) -> BlockLocator {
        BlockLocator {
            number: self.number,
            hash: self.hash,
        }
    }
}

impl TryFrom<Block<H256>> for Header {
    type Error = Error;

    fn try_from(block: Block<H256>) -> Result<Self> {
        let hash = block
            .hash
            .ok_or_else(|| Error::MalformedResponse("block without a hash".to_string()))?;
        let number = block
            .number
            .ok_or_else(|| Error::MalformedResponse(format!("block {hash:?} without a number")))?
            .as_u64();
        let timestamp = u64::try_from(block.timestamp).map_err(|_| {
            Error::MalformedResponse(format!("block {number} timestamp does not fit u64"))
        })?;

        Ok(Header {
            hash,
            parent_hash: block.parent_hash,
            number,
            timestamp,
        })
    }
}

/// A single asset transfer initiated through a bridge contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTransfer {
    /// Sender on the originating chain.
    pub from: Address,
    /// Recipient on the destination chain.
    pub to: Address,
    /// Token address on L1.
    pub l1_token: Address,
    /// Token address on L2.
    pub l2_token: Address,
    /// Transferred amount in the token's base units.
    pub amount: BigUint,
    /// Hash of the transaction that emitted the event.
    pub tx_hash: H256,
    /// Index of the log within its block.
    pub log_index: u64,
    /// Hash of the block containing the event.
    pub block_hash: H256,
    /// Opaque extra data passed along with the transfer.
    pub data: Bytes,
}

/// A bridge event as seen on one of the chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// An L1 -> L2 transfer, persisted on L1.
    Deposit(BridgeTransfer),
    /// An L2 -> L1 transfer, persisted on L2.
    Withdrawal(BridgeTransfer),
}

impl BridgeEvent {
    /// The transfer carried by this event.
    pub fn transfer(&self) -> &BridgeTransfer {
        match self {
            BridgeEvent::Deposit(t) | BridgeEvent::Withdrawal(t) => t,
        }
    }

    /// The chain this event is persisted on.
    pub fn chain(&self) -> ChainKind {
        match self {
            BridgeEvent::Deposit(_) => ChainKind::L1,
            BridgeEvent::Withdrawal(_) => ChainKind::L2,
        }
    }

    /// The token on the chain this event is persisted on.
    pub fn local_token(&self) -> Address {
        match self {
            BridgeEvent::Deposit(t) => t.l1_token,
            BridgeEvent::Withdrawal(t) => t.l2_token,
        }
    }
}

/// ERC-20 metadata as returned by the token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    /// `name()`
    pub name: String,
    /// `symbol()`
    pub symbol: String,
    /// `decimals()`
    pub decimals: u8,
}

/// A token known to the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Token contract address.
    pub address: Address,
    /// Token name, empty for stubs.
    pub name: String,
    /// Token symbol, empty for stubs.
    pub symbol: String,
    /// Token decimals, zero for stubs.
    pub decimals: u8,
}

impl Token {
    /// The native asset sentinel of a chain.
    pub fn eth(chain: ChainKind) -> Self {
        Self {
            address: chain.eth_address(),
            name: "Ethereum".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }

    /// A token whose metadata could not be queried.
    pub fn stub(address: Address) -> Self {
        Self {
            address,
            name: String::new(),
            symbol: String::new(),
            decimals: 0,
        }
    }

    /// A token with metadata fetched from its contract.
    pub fn with_metadata(address: Address, metadata: TokenMetadata) -> Self {
        Self {
            address,
            name: metadata.name,
            symbol: metadata.symbol,
            decimals: metadata.decimals,
        }
    }
}

/// A state root batch committed on L1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBatch {
    /// Batch index, unique.
    pub index: u64,
    /// State root of the batch.
    pub root: H256,
    /// Number of L2 blocks covered by the batch.
    pub size: u64,
    /// Number of L2 blocks committed before this batch.
    pub prev_total: u64,
    /// Opaque extra data.
    pub extra_data: Bytes,
    /// L1 block containing the commitment.
    pub block_hash: H256,
}

impl StateBatch {
    /// Does this batch finalize the given L2 block number.
    pub fn covers(&self, l2_block_number: u64) -> bool {
        self.prev_total.saturating_add(self.size) >= l2_block_number
    }
}

/// Converts `U256` into the corresponding `BigUint` value.
pub fn u256_to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_little_endian(&mut bytes);
    BigUint::from_bytes_le(&bytes)
}
