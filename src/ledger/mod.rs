//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Request secrets (seed phrase, provider key)
//!     → wallet.rs (key derivation, address, signing)
//!     → transaction.rs (CBOR body, witness set, transaction id)
//!     → gateway.rs (query spendable inputs, submit signed transactions)
//!     → blockfrost.rs (REST provider with timeouts and error classification)
//! ```
//!
//! # Security Constraints
//! - Seed phrases and provider keys arrive per request and are never persisted
//! - Never log key material or provider keys
//! - Every provider call has a bounded deadline
//! - Failure classification happens once, at the gateway boundary

pub mod address;
pub mod blockfrost;
pub mod gateway;
pub mod hash;
pub mod secret;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use address::{Address, Network};
pub use blockfrost::{BlockfrostFactory, BlockfrostGateway};
pub use gateway::{FailureClass, GatewayError, GatewayFactory, LedgerGateway, RejectionKind};
pub use secret::SecretString;
pub use transaction::{CostModel, SignedTransaction, TxOutput, UnsignedTransaction};
pub use types::{
    AssetName, AssetUnit, LedgerError, LedgerResult, OutputRef, PolicyId, SpendableInput, TxHash,
    Value,
};
pub use wallet::WalletContext;
