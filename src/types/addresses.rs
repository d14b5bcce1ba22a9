//! Ledger account addresses and transaction hashes
//!
//! Both are 32-byte values rendered in canonical form: `0x` followed by
//! exactly 64 lowercase hex characters.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::ValidationError;

pub const CANONICAL_HEX_LEN: usize = 66;

// Coin type used as the type argument of native-asset entry functions
pub const NATIVE_COIN_TYPE: &str = "0x1::aptos_coin::AptosCoin";

fn parse_canonical(value: &str) -> Result<B256, String> {
    if !value.starts_with("0x") {
        return Err("missing 0x prefix".to_string());
    }
    if value.len() != CANONICAL_HEX_LEN {
        return Err(format!(
            "expected {} characters, got {}",
            CANONICAL_HEX_LEN,
            value.len()
        ));
    }
    B256::from_str(value).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress(B256);

impl AccountAddress {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0.0
    }
}

impl FromStr for AccountAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical(s)
            .map(Self)
            .map_err(|reason| ValidationError::MalformedAddress {
                value: s.to_string(),
                reason,
            })
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(address: AccountAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&alloy::hex::encode_prefixed(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(B256);

impl TxHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }
}

impl FromStr for TxHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical(s)
            .map(Self)
            .map_err(|reason| ValidationError::MalformedHash {
                value: s.to_string(),
                reason,
            })
    }
}

impl TryFrom<String> for TxHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&alloy::hex::encode_prefixed(self.0))
    }
}
