use std::{sync::Arc, time::Duration};

use client::{addresses::custom_bridges, ChainKind};
use ethers::{providers::Middleware, types::Address};

use crate::{Bridge, Erc20Bridge, EthBridge};

/// The set of bridges followed on one chain.
#[derive(Debug)]
pub struct BridgeRegistry<M> {
    chain: ChainKind,
    bridges: Vec<Bridge<M>>,
}

impl<M: Middleware> BridgeRegistry<M> {
    /// Resolve the bridges deployed on a chain.
    ///
    /// Every chain follows its standard bridge, L1 additionally follows
    /// native ETH deposits into it. Chains with well-known ids get their
    /// custom bridges on top.
    ///
    /// # Arguments
    ///
    /// * `chain`: Which of the two chains this is
    /// * `chain_id`: Chain id reported by the node
    /// * `standard_bridge`: Address of the standard bridge on this chain
    /// * `middleware`: The middleware of this chain
    /// * `rpc_timeout`: Upper bound on a single log query of any bridge
    pub fn for_chain(
        chain: ChainKind,
        chain_id: u64,
        standard_bridge: Address,
        middleware: Arc<M>,
        rpc_timeout: Duration,
    ) -> Self {
        let mut bridges = vec![];

        if chain == ChainKind::L1 {
            bridges.push(Bridge::Eth(EthBridge::new(
                standard_bridge,
                middleware.clone(),
                rpc_timeout,
            )));
        }

        bridges.push(Bridge::Standard(Erc20Bridge::new(
            "standard",
            standard_bridge,
            chain,
            middleware.clone(),
            rpc_timeout,
        )));

        for (name, address) in custom_bridges(chain, chain_id) {
            bridges.push(Bridge::Custom(Erc20Bridge::new(
                name,
                address,
                chain,
                middleware.clone(),
                rpc_timeout,
            )));
        }

        tracing::info!(
            "{chain} bridges for chain id {chain_id}: {}",
            bridges
                .iter()
                .map(|b| b.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self { chain, bridges }
    }

    /// The chain this registry belongs to.
    pub fn chain(&self) -> ChainKind {
        self.chain
    }

    /// The resolved bridges.
    pub fn bridges(&self) -> &[Bridge<M>] {
        &self.bridges
    }

    /// Take the resolved bridges.
    pub fn into_bridges(self) -> Vec<Bridge<M>> {
        self.bridges
    }
}
