//! Token minting subsystem.
//!
//! # Data Flow
//! ```text
//! Spendable inputs (from the ledger gateway)
//!     → selector.rs (pick the funding input)
//!     → policy.rs (bind the script template to that input and the token name)
//!     → metadata.rs (CIP-25 / status payloads as metadata)
//!     → builder.rs + fees.rs (assemble, balance, size-check)
//!     → UnsignedTransaction, signed by the wallet
//! ```
//!
//! # Design Decisions
//! - Pure and synchronous: no I/O happens here
//! - Same input set, same choices: selection and binding are deterministic
//! - Fees are an upper bound computed in one pass

pub mod builder;
pub mod fees;
pub mod metadata;
pub mod policy;
pub mod selector;

pub use builder::TransactionBuilder;
pub use metadata::StatusRecord;
pub use policy::{bind, BoundPolicy, ScriptTemplate};
pub use selector::{Selection, UtxoSelector};
