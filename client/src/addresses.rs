//! Well-known contract addresses.

use ethers::types::{Address, H160};

use crate::ChainKind;

/// Predeployed L2 standard bridge.
pub const L2_STANDARD_BRIDGE_PREDEPLOY: Address = H160([
    0x42, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x10,
]);

/// Ethereum mainnet chain id.
pub const ETHEREUM_MAINNET_CHAIN_ID: u64 = 1;

/// Optimism mainnet chain id.
pub const OPTIMISM_MAINNET_CHAIN_ID: u64 = 10;

/// A non-standard bridge deployed for a specific pair of chains.
#[derive(Debug, Clone, Copy)]
pub struct CustomBridgeAddresses {
    /// Name used in logs and metrics.
    pub name: &'static str,
    /// L1 chain the bridge is deployed on.
    pub l1_chain_id: u64,
    /// L2 chain the bridge is deployed on.
    pub l2_chain_id: u64,
    /// Bridge contract on L1.
    pub l1_bridge: Address,
    /// Bridge contract on L2.
    pub l2_bridge: Address,
}

/// Custom bridges known at compile time.
pub const CUSTOM_BRIDGES: &[CustomBridgeAddresses] = &[
    CustomBridgeAddresses {
        name: "dai",
        l1_chain_id: ETHEREUM_MAINNET_CHAIN_ID,
        l2_chain_id: OPTIMISM_MAINNET_CHAIN_ID,
        l1_bridge: H160([
            0x10, 0xe6, 0x59, 0x3c, 0xdd, 0xa8, 0xc5, 0x8a, 0x1d, 0x0f, 0x14, 0xc5, 0x16, 0x4b,
            0x37, 0x63, 0x52, 0xa5, 0x5f, 0x2f,
        ]),
        l2_bridge: H160([
            0x46, 0x71, 0x94, 0x77, 0x1d, 0xae, 0x29, 0x67, 0xae, 0xf3, 0xec, 0xbe, 0xdd, 0x3b,
            0xf9, 0xa3, 0x10, 0xc7, 0x6c, 0x65,
        ]),
    },
    CustomBridgeAddresses {
        name: "bitbtc",
        l1_chain_id: ETHEREUM_MAINNET_CHAIN_ID,
        l2_chain_id: OPTIMISM_MAINNET_CHAIN_ID,
        l1_bridge: H160([
            0xab, 0xa2, 0xc5, 0xf1, 0x08, 0xf7, 0xe8, 0x20, 0xc0, 0x49, 0xd5, 0xaf, 0x70, 0xb1,
            0x6a, 0xc2, 0x66, 0xc8, 0xf1, 0x28,
        ]),
        l2_bridge: H160([
            0x15, 0x8f, 0x51, 0x30, 0x96, 0x92, 0x3f, 0xf2, 0xd3, 0xaa, 0xb2, 0xbc, 0xf4, 0x47,
            0x85, 0x36, 0xde, 0x67, 0x25, 0xe2,
        ]),
    },
];

/// Custom bridges deployed on the given chain, as `(name, address)` pairs.
pub fn custom_bridges(
    chain: ChainKind,
    chain_id: u64,
) -> impl Iterator<Item = (&'static str, Address)> {
    CUSTOM_BRIDGES.iter().filter_map(move |b| match chain {
        ChainKind::L1 if b.l1_chain_id == chain_id => Some((b.name, b.l1_bridge)),
        ChainKind::L2 if b.l2_chain_id == chain_id => Some((b.name, b.l2_bridge)),
        _ => None,
    })
}
