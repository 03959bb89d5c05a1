//! Event bindings for the L2 standard bridge.

#[allow(missing_docs)]
pub mod codegen {
    use ethers::{
        contract::EthEvent,
        types::{Address, Bytes, U256},
    };

    #[derive(Clone, Debug, Default, Eq, PartialEq, EthEvent)]
    #[ethevent(
        name = "WithdrawalInitiated",
        abi = "WithdrawalInitiated(address,address,address,address,uint256,bytes)"
    )]
    pub struct WithdrawalInitiatedFilter {
        #[ethevent(indexed)]
        pub l_1_token: Address,
        #[ethevent(indexed)]
        pub l_2_token: Address,
        #[ethevent(indexed)]
        pub from: Address,
        pub to: Address,
        pub amount: U256,
        pub data: Bytes,
    }
}
