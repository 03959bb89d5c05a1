//! Event bindings for the L1 state commitment chain.

#[allow(missing_docs)]
pub mod codegen {
    use ethers::{
        contract::EthEvent,
        types::{Bytes, U256},
    };

    #[derive(Clone, Debug, Default, Eq, PartialEq, EthEvent)]
    #[ethevent(
        name = "StateBatchAppended",
        abi = "StateBatchAppended(uint256,bytes32,uint256,uint256,bytes)"
    )]
    pub struct StateBatchAppendedFilter {
        #[ethevent(indexed)]
        pub batch_index: U256,
        pub batch_root: [u8; 32],
        pub batch_size: U256,
        pub prev_total_elements: U256,
        pub extra_data: Bytes,
    }
}
