use std::{fmt::Debug, str::FromStr};

use ethers::types::{Address, H256};
use num::BigUint;

use crate::{Error, Result};

/// Lower-case `0x` prefixed hex representation of a hash or an address.
pub(crate) fn to_hex<T: Debug>(value: &T) -> String {
    format!("{value:?}")
}

pub(crate) fn parse_h256(column: &'static str, value: &str) -> Result<H256> {
    H256::from_str(value).map_err(|_| Error::Decode {
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_address(column: &'static str, value: &str) -> Result<Address> {
    Address::from_str(value).map_err(|_| Error::Decode {
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_amount(value: &str) -> Result<BigUint> {
    BigUint::from_str(value).map_err(|_| Error::Decode {
        column: "amount",
        value: value.to_string(),
    })
}

pub(crate) fn parse_u64(column: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Decode {
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_u8(column: &'static str, value: i16) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::Decode {
        column,
        value: value.to_string(),
    })
}
