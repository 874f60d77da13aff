//! Ledger value types and error definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a transaction hash in bytes.
pub const TX_HASH_LEN: usize = 32;

/// Length of a policy id (script hash) in bytes.
pub const POLICY_ID_LEN: usize = 28;

/// Maximum length of an asset name in bytes.
pub const MAX_ASSET_NAME_LEN: usize = 32;

/// Errors raised while deriving identities or assembling transactions.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The seed phrase could not be turned into key material.
    #[error("seed phrase could not be decoded into key material")]
    InvalidSeed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid asset unit: {0}")]
    InvalidAssetUnit(String),

    #[error("invalid token name: {0}")]
    InvalidTokenName(String),

    #[error("invalid minting script: {0}")]
    InvalidScript(String),

    /// The wallet has no spendable inputs at all.
    #[error("no spendable inputs available at the wallet address")]
    NoFundsAvailable,

    /// Inputs cannot cover the minimum output value plus fee.
    #[error("insufficient funds: available {available} lovelace, required {required} lovelace")]
    InsufficientFunds { available: u64, required: u64 },

    /// No input of the wallet carries the requested asset.
    #[error("asset {0} is not held by the wallet")]
    AssetNotHeld(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("metadata is {size} bytes, exceeding the {max} byte ceiling")]
    MetadataTooLarge { size: usize, max: usize },

    #[error("transaction is {size} bytes, exceeding the {max} byte ceiling")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

macro_rules! hex_newtype {
    ($name:ident, $len:expr, $label:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, String> {
                let bytes = hex::decode(s.trim()).map_err(|e| format!("{}: {}", $label, e))?;
                let arr: [u8; $len] = bytes.try_into().map_err(|b: Vec<u8>| {
                    format!("{} must be {} bytes, got {}", $label, $len, b.len())
                })?;
                Ok(Self(arr))
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_newtype!(TxHash, TX_HASH_LEN, "transaction hash");
hex_newtype!(PolicyId, POLICY_ID_LEN, "policy id");

/// Reference to a transaction output: origin transaction id and output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub tx_hash: TxHash,
    pub index: u32,
}

impl OutputRef {
    pub fn new(tx_hash: TxHash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

/// Raw asset name bytes (at most 32).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, String> {
        let bytes = bytes.into();
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err(format!(
                "asset name is {} bytes, maximum is {}",
                bytes.len(),
                MAX_ASSET_NAME_LEN
            ));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Human-readable form: UTF-8 when printable, hex otherwise.
    pub fn display_name(&self) -> String {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !s.chars().any(char::is_control) => s.to_string(),
            _ => self.to_hex(),
        }
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({})", self.display_name())
    }
}

/// Global identifier of a token type: policy id followed by asset name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetUnit {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
}

impl AssetUnit {
    pub fn new(policy_id: PolicyId, asset_name: AssetName) -> Self {
        Self { policy_id, asset_name }
    }
}

impl fmt::Display for AssetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.policy_id.to_hex(), self.asset_name.to_hex())
    }
}

impl fmt::Debug for AssetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetUnit({})", self)
    }
}

impl FromStr for AssetUnit {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let policy_hex_len = POLICY_ID_LEN * 2;
        if s.len() < policy_hex_len || !s.is_ascii() {
            return Err(LedgerError::InvalidAssetUnit(format!(
                "expected at least {} hex characters",
                policy_hex_len
            )));
        }
        let (policy_hex, name_hex) = s.split_at(policy_hex_len);
        let policy_id = PolicyId::from_hex(policy_hex).map_err(LedgerError::InvalidAssetUnit)?;
        let name = hex::decode(name_hex)
            .map_err(|e| LedgerError::InvalidAssetUnit(format!("asset name: {}", e)))?;
        let asset_name = AssetName::new(name).map_err(LedgerError::InvalidAssetUnit)?;
        Ok(Self { policy_id, asset_name })
    }
}

impl Serialize for AssetUnit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetUnit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Bundle of asset quantities carried by an output: lovelace plus native tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: u64,
    pub assets: BTreeMap<AssetUnit, u64>,
}

impl Value {
    pub fn lovelace(coin: u64) -> Self {
        Self { coin, assets: BTreeMap::new() }
    }

    pub fn with_asset(mut self, unit: AssetUnit, quantity: u64) -> Self {
        self.add_asset(unit, quantity);
        self
    }

    /// True when the value carries only the base currency.
    pub fn is_pure(&self) -> bool {
        self.assets.values().all(|q| *q == 0)
    }

    pub fn quantity_of(&self, unit: &AssetUnit) -> u64 {
        self.assets.get(unit).copied().unwrap_or(0)
    }

    pub fn add_asset(&mut self, unit: AssetUnit, quantity: u64) {
        if quantity == 0 {
            return;
        }
        *self.assets.entry(unit).or_insert(0) += quantity;
    }

    /// Add another value into this one.
    pub fn merge(&mut self, other: &Value) -> LedgerResult<()> {
        self.coin = self
            .coin
            .checked_add(other.coin)
            .ok_or(LedgerError::Overflow("value coin"))?;
        for (unit, qty) in &other.assets {
            let entry = self.assets.entry(unit.clone()).or_insert(0);
            *entry = entry
                .checked_add(*qty)
                .ok_or(LedgerError::Overflow("asset quantity"))?;
        }
        Ok(())
    }

    /// Remove `quantity` of `unit`, dropping the entry when it reaches zero.
    pub fn take_asset(&mut self, unit: &AssetUnit, quantity: u64) -> LedgerResult<()> {
        let held = self.quantity_of(unit);
        if held < quantity {
            return Err(LedgerError::AssetNotHeld(unit.to_string()));
        }
        if held == quantity {
            self.assets.remove(unit);
        } else {
            self.assets.insert(unit.clone(), held - quantity);
        }
        Ok(())
    }
}

/// An unspent output observed at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableInput {
    pub out_ref: OutputRef,
    pub value: Value,
}

impl SpendableInput {
    pub fn new(out_ref: OutputRef, value: Value) -> Self {
        Self { out_ref, value }
    }
}
