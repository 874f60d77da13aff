//! Shelley addresses and network selection.

use pallas_addresses::{ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_crypto::hash::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ledger::types::{LedgerError, LedgerResult};

const KEY_HASH_LEN: usize = 28;

/// Target network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Preprod,
    Preview,
}

impl Network {
    /// Network id carried in the low nibble of the address header.
    pub fn network_id(self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Preprod | Network::Preview => 0,
        }
    }

    /// Human-readable part for bech32 addresses.
    pub fn address_hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            Network::Preprod | Network::Preview => "addr_test",
        }
    }

    /// Default Blockfrost endpoint for this network.
    pub fn default_provider_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://cardano-mainnet.blockfrost.io/api/v0",
            Network::Preprod => "https://cardano-preprod.blockfrost.io/api/v0",
            Network::Preview => "https://cardano-preview.blockfrost.io/api/v0",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "preprod" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Preprod => "preprod",
            Network::Preview => "preview",
        };
        f.write_str(name)
    }
}

/// A Shelley-era address, kept with its raw bytes.
#[derive(Clone)]
pub struct Address {
    bytes: Vec<u8>,
    shelley: ShelleyAddress,
}

impl Address {
    /// Enterprise address (payment key hash, no stake credential).
    pub fn enterprise(network: Network, key_hash: [u8; KEY_HASH_LEN]) -> Self {
        let network = match network {
            Network::Mainnet => pallas_addresses::Network::Mainnet,
            Network::Preprod | Network::Preview => pallas_addresses::Network::Testnet,
        };
        let shelley = ShelleyAddress::new(
            network,
            ShelleyPaymentPart::Key(Hash::from(key_hash)),
            ShelleyDelegationPart::Null,
        );
        Self {
            bytes: shelley.to_vec(),
            shelley,
        }
    }

    /// Build from raw bytes; only Shelley payment addresses are accepted.
    pub fn from_bytes(bytes: Vec<u8>) -> LedgerResult<Self> {
        if bytes.is_empty() {
            return Err(LedgerError::InvalidAddress("empty address".to_string()));
        }
        match pallas_addresses::Address::from_bytes(&bytes) {
            Ok(pallas_addresses::Address::Shelley(shelley)) => Ok(Self { bytes, shelley }),
            Ok(_) => Err(LedgerError::InvalidAddress(
                "not a Shelley payment address".to_string(),
            )),
            Err(e) => Err(LedgerError::InvalidAddress(e.to_string())),
        }
    }

    /// Parse a bech32 address, checking the prefix agrees with the header network.
    pub fn from_bech32(s: &str) -> LedgerResult<Self> {
        let (hrp, data) = bech32::decode(s.trim())
            .map_err(|e| LedgerError::InvalidAddress(format!("bech32: {}", e)))?;
        let address = Self::from_bytes(data)?;
        if hrp.to_string().to_lowercase() != address.hrp() {
            return Err(LedgerError::InvalidAddress(format!(
                "prefix '{}' does not match network id {}",
                hrp,
                address.network_id()
            )));
        }
        Ok(address)
    }

    pub fn to_bech32(&self) -> String {
        // Shelley payloads are far below the bech32 code length
        self.shelley
            .to_bech32()
            .unwrap_or_else(|_| hex::encode(&self.bytes))
    }

    fn hrp(&self) -> &'static str {
        if self.network_id() == 1 {
            "addr"
        } else {
            "addr_test"
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn network_id(&self) -> u8 {
        self.bytes[0] & 0x0f
    }

    /// Payment key hash, when the payment credential is a key (not a script).
    pub fn payment_key_hash(&self) -> Option<[u8; KEY_HASH_LEN]> {
        match self.shelley.payment() {
            ShelleyPaymentPart::Key(hash) => Some(**hash),
            ShelleyPaymentPart::Script(_) => None,
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_bech32())
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bech32(s)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_bech32())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_bech32(&s).map_err(serde::de::Error::custom)
    }
}
