//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the minting service.
//! Every section is defaulted, so an empty file is a valid preprod configuration.

use serde::{Deserialize, Serialize};

use crate::ledger::Network;

/// Root configuration for the minting service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Ledger provider settings.
    pub ledger: LedgerConfig,

    /// Minting policy and metadata settings.
    pub minting: MintingConfig,

    /// Ledger protocol parameters used for fees and minimum outputs.
    pub protocol: ProtocolConfig,

    /// Submission retry settings.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Deadline for mint and transfer requests in seconds. Once it passes no new provider
    /// attempt starts; a call already in flight still completes and its result is returned.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 256 * 1024,
            request_timeout_secs: 300,
        }
    }
}

/// Ledger provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Target network.
    pub network: Network,

    /// Provider base URL; the network's public Blockfrost endpoint when unset.
    pub provider_url: Option<String>,

    /// Deadline for every provider call in seconds.
    pub request_timeout_secs: u64,

    /// Page size for input listings (provider maximum is 100).
    pub page_size: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: Network::Preprod,
            provider_url: None,
            request_timeout_secs: 20,
            page_size: 100,
        }
    }
}

impl LedgerConfig {
    pub fn provider_url(&self) -> &str {
        self.provider_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_provider_url())
    }
}

/// Minting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MintingConfig {
    /// Compiled minting script template used when a request carries none.
    pub script_template_hex: Option<String>,

    /// Metadata label for mint records (CIP-25).
    pub mint_label: u64,

    /// Metadata label for status updates.
    pub status_label: u64,

    /// Memory budget declared for the mint redeemer.
    pub redeemer_mem: u64,

    /// CPU step budget declared for the mint redeemer.
    pub redeemer_steps: u64,

    /// Plutus V2 cost model hashed into the script-data hash. Read from the provider
    /// when unset.
    pub plutus_v2_cost_model: Option<Vec<i64>>,

    /// Pure inputs must hold strictly more than this to be preferred for minting.
    pub min_pure_lovelace: u64,
}

impl Default for MintingConfig {
    fn default() -> Self {
        Self {
            script_template_hex: None,
            mint_label: 721,
            status_label: 1001,
            redeemer_mem: 1_400_000,
            redeemer_steps: 500_000_000,
            plutus_v2_cost_model: None,
            min_pure_lovelace: 5_000_000,
        }
    }
}

/// Protocol parameters (Babbage-era mainnet values by default).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Fee per serialized byte.
    pub min_fee_a: u64,

    /// Constant fee component.
    pub min_fee_b: u64,

    /// Price per unit of script memory.
    pub price_mem: f64,

    /// Price per script CPU step.
    pub price_step: f64,

    /// Lovelace per byte of output held in the UTxO set.
    pub coins_per_utxo_byte: u64,

    /// Floor for any output's lovelace.
    pub min_output_lovelace: u64,

    /// Maximum serialized transaction size in bytes.
    pub max_tx_size: usize,

    /// Maximum encoded metadata size in bytes.
    pub max_metadata_bytes: usize,

    /// Collateral required, as a percentage of the fee.
    pub collateral_percent: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            price_mem: 0.0577,
            price_step: 0.0000721,
            coins_per_utxo_byte: 4_310,
            min_output_lovelace: 1_000_000,
            max_tx_size: 16_384,
            max_metadata_bytes: 16_384,
            collateral_percent: 150,
        }
    }
}

/// Delay strategy between submission attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total submission attempts, including the first.
    pub max_attempts: u32,

    /// Delay between attempts (base delay for exponential) in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    pub strategy: RetryStrategy,

    /// Suggested wait returned to callers on input conflicts, in milliseconds.
    pub conflict_wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 20_000,
            strategy: RetryStrategy::Fixed,
            conflict_wait_ms: 20_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Full,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
