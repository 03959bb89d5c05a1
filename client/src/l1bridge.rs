//! Event bindings for the L1 standard bridge.

#[allow(missing_docs)]
pub mod codegen {
    use ethers::{
        contract::EthEvent,
        types::{Address, Bytes, U256},
    };

    #[derive(Clone, Debug, Default, Eq, PartialEq, EthEvent)]
    #[ethevent(
        name = "ETHDepositInitiated",
        abi = "ETHDepositInitiated(address,address,uint256,bytes)"
    )]
    pub struct EthDepositInitiatedFilter {
        #[ethevent(indexed)]
        pub from: Address,
        #[ethevent(indexed)]
        pub to: Address,
        pub amount: U256,
        pub data: Bytes,
    }

    #[derive(Clone, Debug, Default, Eq, PartialEq, EthEvent)]
    #[ethevent(
        name = "ERC20DepositInitiated",
        abi = "ERC20DepositInitiated(address,address,address,address,uint256,bytes)"
    )]
    pub struct Erc20DepositInitiatedFilter {
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
