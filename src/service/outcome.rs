//! Caller-facing results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::{AssetUnit, GatewayError, LedgerError, PolicyId, TxHash};
use crate::resilience::{RunOutcome, SubmissionOutcome};

/// Closed set of failure kinds callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    InvalidSeed,
    NoFunds,
    InsufficientFunds,
    AssetNotHeld,
    MetadataTooLarge,
    TransactionTooLarge,
    Rejected,
    Network,
    Unauthorized,
    Cancelled,
    Internal,
}

impl FailureKind {
    /// HTTP status used when this kind is returned over HTTP.
    pub fn http_status(self) -> u16 {
        match self {
            FailureKind::InvalidInput | FailureKind::InvalidSeed => 400,
            FailureKind::Unauthorized => 401,
            FailureKind::NoFunds
            | FailureKind::InsufficientFunds
            | FailureKind::AssetNotHeld
            | FailureKind::MetadataTooLarge
            | FailureKind::TransactionTooLarge => 422,
            FailureKind::Rejected => 502,
            FailureKind::Network | FailureKind::Cancelled => 503,
            FailureKind::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::InvalidSeed => "invalid_seed",
            FailureKind::NoFunds => "no_funds",
            FailureKind::InsufficientFunds => "insufficient_funds",
            FailureKind::AssetNotHeld => "asset_not_held",
            FailureKind::MetadataTooLarge => "metadata_too_large",
            FailureKind::TransactionTooLarge => "transaction_too_large",
            FailureKind::Rejected => "rejected",
            FailureKind::Network => "network",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a mint or status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServiceResult {
    Success {
        tx_hash: TxHash,
        unit: AssetUnit,
        policy_id: PolicyId,
    },
    RetryLater {
        suggested_wait_ms: u64,
        reason: String,
    },
    /// Submitted at least once with no answer, then refused as a conflict. The
    /// transaction has probably landed; look `tx_hash` up before minting again.
    Unconfirmed {
        tx_hash: TxHash,
        unit: AssetUnit,
        policy_id: PolicyId,
        reason: String,
    },
    PermanentFailure {
        kind: FailureKind,
        reason: String,
    },
}

impl ServiceResult {
    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        ServiceResult::PermanentFailure {
            kind,
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::failure(FailureKind::InvalidInput, reason)
    }

    /// Metric label for the outcome.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            ServiceResult::Success { .. } => "success",
            ServiceResult::RetryLater { .. } => "retry_later",
            ServiceResult::Unconfirmed { .. } => "unconfirmed",
            ServiceResult::PermanentFailure { kind, .. } => kind.as_str(),
        }
    }

    /// Combine a submission outcome with the unit it concerns.
    pub fn from_submission(outcome: SubmissionOutcome, unit: &AssetUnit) -> Self {
        match outcome {
            SubmissionOutcome::Confirmed { tx_hash, .. } => ServiceResult::Success {
                tx_hash,
                unit: unit.clone(),
                policy_id: unit.policy_id,
            },
            SubmissionOutcome::RetryLater {
                suggested_wait,
                reason,
                ..
            } => ServiceResult::RetryLater {
                suggested_wait_ms: suggested_wait.as_millis() as u64,
                reason,
            },
            SubmissionOutcome::Unconfirmed {
                tx_hash, reason, ..
            } => ServiceResult::Unconfirmed {
                tx_hash,
                unit: unit.clone(),
                policy_id: unit.policy_id,
                reason,
            },
            SubmissionOutcome::Failed { error, attempts } => {
                let (kind, reason) = gateway_failure(&error);
                Self::failure(kind, format!("{} (after {} attempts)", reason, attempts))
            }
            SubmissionOutcome::Cancelled {
                attempts,
                last_error,
            } => cancelled(attempts, last_error.as_ref()),
        }
    }
}

/// Unwrap the value of a successful run, or turn any other outcome into a result.
pub fn run_value<T>(outcome: RunOutcome<T>) -> Result<T, ServiceResult> {
    match outcome {
        RunOutcome::Succeeded { value, .. } => Ok(value),
        RunOutcome::RetryLater {
            suggested_wait,
            reason,
            ..
        } => Err(ServiceResult::RetryLater {
            suggested_wait_ms: suggested_wait.as_millis() as u64,
            reason,
        }),
        RunOutcome::Failed { error, attempts } => {
            let (kind, reason) = gateway_failure(&error);
            Err(ServiceResult::failure(
                kind,
                format!("{} (after {} attempts)", reason, attempts),
            ))
        }
        RunOutcome::Cancelled {
            attempts,
            last_error,
        } => Err(cancelled(attempts, last_error.as_ref())),
    }
}

/// Cancellation, keeping the last error for context.
pub fn cancelled(attempts: u32, last_error: Option<&GatewayError>) -> ServiceResult {
    let reason = match last_error {
        Some(e) => format!("cancelled after {} attempts; last error: {}", attempts, e),
        None => format!("cancelled after {} attempts", attempts),
    };
    ServiceResult::failure(FailureKind::Cancelled, reason)
}

/// Kind and reason for a gateway error that ended a run.
pub fn gateway_failure(error: &GatewayError) -> (FailureKind, String) {
    let kind = match error {
        GatewayError::Rejected { .. } => FailureKind::Rejected,
        GatewayError::Network(_) | GatewayError::Timeout { .. } | GatewayError::Decode(_) => {
            FailureKind::Network
        }
        GatewayError::Unauthorized => FailureKind::Unauthorized,
    };
    (kind, error.to_string())
}

impl From<GatewayError> for ServiceResult {
    fn from(error: GatewayError) -> Self {
        let (kind, reason) = gateway_failure(&error);
        Self::failure(kind, reason)
    }
}

impl From<LedgerError> for ServiceResult {
    fn from(error: LedgerError) -> Self {
        let kind = match &error {
            LedgerError::InvalidSeed => FailureKind::InvalidSeed,
            LedgerError::InvalidAddress(_)
            | LedgerError::InvalidAssetUnit(_)
            | LedgerError::InvalidTokenName(_)
            | LedgerError::InvalidScript(_)
            | LedgerError::InvalidMetadata(_) => FailureKind::InvalidInput,
            LedgerError::NoFundsAvailable => FailureKind::NoFunds,
            LedgerError::InsufficientFunds { .. } => FailureKind::InsufficientFunds,
            LedgerError::AssetNotHeld(_) => FailureKind::AssetNotHeld,
            LedgerError::MetadataTooLarge { .. } => FailureKind::MetadataTooLarge,
            LedgerError::TransactionTooLarge { .. } => FailureKind::TransactionTooLarge,
            LedgerError::Overflow(_) | LedgerError::Encoding(_) => FailureKind::Internal,
        };
        Self::failure(kind, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AssetName;
    use std::time::Duration;

    fn unit() -> AssetUnit {
        AssetUnit::new(PolicyId([2; 28]), AssetName::new(b"Coffee#1".to_vec()).unwrap())
    }

    #[test]
    fn test_success_json_shape() {
        let result = ServiceResult::from_submission(
            SubmissionOutcome::Confirmed {
                tx_hash: TxHash([3; 32]),
                attempts: 1,
            },
            &unit(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["txHash"], "03".repeat(32));
        assert_eq!(json["policyId"], "02".repeat(28));
        assert_eq!(json["unit"], unit().to_string());
    }

    #[test]
    fn test_retry_later_json_shape() {
        let result = ServiceResult::from_submission(
            SubmissionOutcome::RetryLater {
                suggested_wait: Duration::from_secs(20),
                reason: "input spent".into(),
                attempts: 1,
            },
            &unit(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "retry_later");
        assert_eq!(json["suggestedWaitMs"], 20_000);
    }

    #[test]
    fn test_unconfirmed_keeps_transaction_id() {
        let result = ServiceResult::from_submission(
            SubmissionOutcome::Unconfirmed {
                tx_hash: TxHash([9; 32]),
                reason: "BadInputsUTxO".into(),
                attempts: 2,
            },
            &unit(),
        );
        assert_eq!(result.outcome_label(), "unconfirmed");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "unconfirmed");
        assert_eq!(json["txHash"], "09".repeat(32));
        assert_eq!(json["unit"], unit().to_string());
    }

    #[test]
    fn test_ledger_error_kinds() {
        let result: ServiceResult = LedgerError::InsufficientFunds {
            available: 1,
            required: 2,
        }
        .into();
        let ServiceResult::PermanentFailure { kind, .. } = &result else { panic!("expected failure") };
        assert_eq!(*kind, FailureKind::InsufficientFunds);
        assert_eq!(kind.http_status(), 422);

        let json = serde_json::to_value(ServiceResult::from(LedgerError::InvalidSeed)).unwrap();
        assert_eq!(json["status"], "permanent_failure");
        assert_eq!(json["kind"], "invalid_seed");
    }

    #[test]
    fn test_exhausted_retries_are_permanent() {
        let result = ServiceResult::from_submission(
            SubmissionOutcome::Failed {
                error: GatewayError::Network("down".into()),
                attempts: 3,
            },
            &unit(),
        );
        assert_eq!(
            result,
            ServiceResult::failure(FailureKind::Network, "provider unavailable: down (after 3 attempts)")
        );
        assert_eq!(result.outcome_label(), "network");
    }

    #[test]
    fn test_deserialize_roundtrip_for_clients() {
        let text = r#"{"status":"permanent_failure","kind":"asset_not_held","reason":"gone"}"#;
        let parsed: ServiceResult = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, ServiceResult::failure(FailureKind::AssetNotHeld, "gone"));
    }
}
