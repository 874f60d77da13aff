//! Network boundary to the ledger provider.
//!
//! Every failure is classified exactly once, here, into a closed taxonomy. Callers branch on
//! [`FailureClass`] and never inspect provider message text.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::ledger::address::{Address, Network};
use crate::ledger::secret::SecretString;
use crate::ledger::transaction::{CostModel, SignedTransaction};
use crate::ledger::types::{SpendableInput, TxHash};

/// Why the ledger refused a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// An input is already spent or unknown; the input snapshot was stale.
    Conflict,
    /// Any other ledger-rule violation.
    Other,
}

/// Errors crossing the provider boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transaction rejected by the ledger: {reason}")]
    Rejected { kind: RejectionKind, reason: String },

    /// Connectivity problem or provider-side failure.
    #[error("provider unavailable: {0}")]
    Network(String),

    #[error("provider call timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The provider refused the access key.
    #[error("provider rejected the access key")]
    Unauthorized,

    /// The provider answered with something we could not interpret.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

/// How a caller should react to a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Indexer lag: wait for fresh inputs, do not resubmit the same transaction.
    Conflict,
    /// May succeed if attempted again.
    Transient,
    /// Will not succeed without outside change.
    Fatal,
}

impl GatewayError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            GatewayError::Rejected {
                kind: RejectionKind::Conflict,
                ..
            } => FailureClass::Conflict,
            GatewayError::Rejected {
                kind: RejectionKind::Other,
                ..
            }
            | GatewayError::Network(_)
            | GatewayError::Timeout { .. } => FailureClass::Transient,
            GatewayError::Unauthorized | GatewayError::Decode(_) => FailureClass::Fatal,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            GatewayError::Rejected {
                kind: RejectionKind::Conflict,
                ..
            } => "conflict",
            GatewayError::Rejected { .. } => "rejected",
            GatewayError::Network(_) => "network",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::Decode(_) => "decode",
        }
    }
}

/// Queries and submissions against the ledger.
///
/// Input listings may lag behind recently submitted transactions.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Unspent outputs currently indexed at `address`.
    async fn list_spendable_inputs(
        &self,
        address: &Address,
    ) -> Result<Vec<SpendableInput>, GatewayError>;

    /// Submit a signed transaction, returning the id the ledger accepted.
    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash, GatewayError>;

    /// Plutus V2 cost model of the current epoch.
    async fn plutus_v2_cost_model(&self) -> Result<CostModel, GatewayError>;
}

/// Builds a gateway for one request from its call-scoped provider key.
pub trait GatewayFactory: Send + Sync {
    fn connect(
        &self,
        network: Network,
        provider_key: &SecretString,
    ) -> Result<Arc<dyn LedgerGateway>, GatewayError>;
}
