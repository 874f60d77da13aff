//! Bounded retry of provider calls.
//!
//! # Policy
//! - Conflict (stale input snapshot): stop at once, tell the caller to retry later
//! - Transient (network, timeout, non-conflict rejection): retry until `max_attempts`
//!   calls have been made in total, sleeping between attempts
//! - Fatal (bad key, undecodable response): stop at once
//!
//! # Cancellation
//! The token is checked before every attempt and raced against every delay. A call that
//! is already in flight is never abandoned: its result is honoured, and only the next
//! attempt is skipped.
//!
//! # Submission States
//! ```text
//! Built → Signed → Submitted → Confirmed
//!                            → RejectedConflict
//!                            → RejectedOther   ─┐
//!                            → NetworkFailure  ─┴→ Submitted (next attempt)
//! ```
//!
//! A network failure or timeout on submit leaves the outcome unknown: the ledger may
//! already hold the transaction. If a later attempt of the same bytes then meets a
//! conflict, the run ends [`SubmissionOutcome::Unconfirmed`] with the transaction id
//! instead of asking the caller to build a new transaction.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::ledger::{
    FailureClass, GatewayError, LedgerGateway, RejectionKind, SignedTransaction, TxHash,
};
use crate::observability::metrics;
use crate::resilience::backoff::BackoffStrategy;

/// Limits applied to one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls, including the first.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    /// Wait suggested to callers after a conflict.
    pub conflict_wait: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: BackoffStrategy::from_config(config),
            conflict_wait: Duration::from_millis(config.conflict_wait_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Terminal result of a generic engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    Succeeded {
        value: T,
        attempts: u32,
    },
    RetryLater {
        suggested_wait: Duration,
        reason: String,
        attempts: u32,
    },
    Failed {
        error: GatewayError,
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
        last_error: Option<GatewayError>,
    },
}

/// Terminal result of submitting one signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Confirmed {
        tx_hash: TxHash,
        attempts: u32,
    },
    RetryLater {
        suggested_wait: Duration,
        reason: String,
        attempts: u32,
    },
    Failed {
        error: GatewayError,
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
        last_error: Option<GatewayError>,
    },
    /// An earlier attempt may have landed; the conflict that followed is likely our own.
    Unconfirmed {
        tx_hash: TxHash,
        reason: String,
        attempts: u32,
    },
}

impl SubmissionOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Confirmed { attempts, .. }
            | Self::RetryLater { attempts, .. }
            | Self::Unconfirmed { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

impl From<RunOutcome<TxHash>> for SubmissionOutcome {
    fn from(outcome: RunOutcome<TxHash>) -> Self {
        match outcome {
            RunOutcome::Succeeded { value, attempts } => Self::Confirmed {
                tx_hash: value,
                attempts,
            },
            RunOutcome::RetryLater {
                suggested_wait,
                reason,
                attempts,
            } => Self::RetryLater {
                suggested_wait,
                reason,
                attempts,
            },
            RunOutcome::Failed { error, attempts } => Self::Failed { error, attempts },
            RunOutcome::Cancelled {
                attempts,
                last_error,
            } => Self::Cancelled {
                attempts,
                last_error,
            },
        }
    }
}

/// Lifecycle state of one submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Built,
    Signed,
    Submitted,
    Confirmed,
    RejectedConflict,
    RejectedOther,
    NetworkFailure,
}

/// Attempt counter, state and last failure class of one transaction.
#[derive(Debug, Clone)]
pub struct TransactionAttempt {
    tx_hash: TxHash,
    attempts: u32,
    state: AttemptState,
    last_failure: Option<FailureClass>,
    ambiguous: bool,
}

impl TransactionAttempt {
    pub fn new(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            attempts: 0,
            state: AttemptState::Built,
            last_failure: None,
            ambiguous: false,
        }
    }

    pub fn mark_signed(&mut self) {
        self.state = AttemptState::Signed;
    }

    pub fn mark_submitted(&mut self) {
        self.attempts += 1;
        self.state = AttemptState::Submitted;
    }

    pub fn record(&mut self, result: &Result<TxHash, GatewayError>) {
        self.state = match result {
            Ok(_) => AttemptState::Confirmed,
            Err(GatewayError::Rejected {
                kind: RejectionKind::Conflict,
                ..
            }) => AttemptState::RejectedConflict,
            Err(GatewayError::Rejected { .. }) => AttemptState::RejectedOther,
            Err(_) => AttemptState::NetworkFailure,
        };
        self.last_failure = result.as_ref().err().map(GatewayError::failure_class);
        if matches!(result, Err(GatewayError::Network(_) | GatewayError::Timeout { .. })) {
            self.ambiguous = true;
        }
    }

    /// True once any attempt ended without knowing whether the ledger accepted it.
    pub fn was_ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn last_failure(&self) -> Option<FailureClass> {
        self.last_failure
    }
}

/// Observation points inside a run.
pub enum AttemptEvent<'a, T> {
    Started(u32),
    Finished(&'a Result<T, GatewayError>),
}

/// Drives provider calls to a terminal outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionRetryEngine {
    policy: RetryPolicy,
}

impl SubmissionRetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run an idempotent provider call under the retry policy.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        op: F,
    ) -> RunOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.run_observed(operation, cancel, op, |_| {}).await
    }

    /// Submit `tx`, retrying transient failures.
    pub async fn submit(
        &self,
        gateway: &dyn LedgerGateway,
        tx: &SignedTransaction,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        let mut attempt = TransactionAttempt::new(tx.id());
        attempt.mark_signed();

        let outcome = self
            .run_observed(
                "submit",
                cancel,
                move || gateway.submit(tx),
                |event| match event {
                    AttemptEvent::Started(_) => attempt.mark_submitted(),
                    AttemptEvent::Finished(result) => {
                        attempt.record(result);
                        metrics::record_submission_attempt(match result {
                            Ok(_) => "confirmed",
                            Err(e) => e.label(),
                        });
                    }
                },
            )
            .await;

        tracing::debug!(
            tx_hash = %attempt.tx_hash(),
            attempts = attempt.attempts(),
            state = ?attempt.state(),
            last_failure = ?attempt.last_failure(),
            "Submission finished"
        );

        match outcome {
            RunOutcome::RetryLater {
                reason, attempts, ..
            } if attempt.was_ambiguous() => {
                tracing::warn!(
                    tx_hash = %attempt.tx_hash(),
                    attempts,
                    reason = %reason,
                    "Conflict after an unconfirmed attempt, transaction may already be on chain"
                );
                SubmissionOutcome::Unconfirmed {
                    tx_hash: attempt.tx_hash(),
                    reason,
                    attempts,
                }
            }
            outcome => outcome.into(),
        }
    }

    async fn run_observed<T, F, Fut, O>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        mut op: F,
        mut observe: O,
    ) -> RunOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
        O: FnMut(AttemptEvent<'_, T>),
    {
        let mut attempts = 0u32;
        let mut last_error: Option<GatewayError> = None;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(operation, attempts, "Cancelled before next attempt");
                return RunOutcome::Cancelled {
                    attempts,
                    last_error,
                };
            }

            attempts += 1;
            observe(AttemptEvent::Started(attempts));
            let result = op().await;
            observe(AttemptEvent::Finished(&result));

            let error = match result {
                Ok(value) => {
                    tracing::debug!(operation, attempt = attempts, "Attempt succeeded");
                    return RunOutcome::Succeeded { value, attempts };
                }
                Err(error) => error,
            };

            match error.failure_class() {
                FailureClass::Conflict => {
                    tracing::warn!(
                        operation,
                        attempt = attempts,
                        error = %error,
                        "Input conflict, deferring to caller"
                    );
                    return RunOutcome::RetryLater {
                        suggested_wait: self.policy.conflict_wait,
                        reason: error.to_string(),
                        attempts,
                    };
                }
                FailureClass::Fatal => {
                    tracing::error!(operation, attempt = attempts, error = %error, "Non-retryable failure");
                    return RunOutcome::Failed { error, attempts };
                }
                FailureClass::Transient if attempts >= self.policy.max_attempts => {
                    tracing::error!(
                        operation,
                        attempts,
                        error = %error,
                        "Retry ceiling reached"
                    );
                    return RunOutcome::Failed { error, attempts };
                }
                FailureClass::Transient => {
                    let delay = self.policy.backoff.delay(attempts);
                    tracing::warn!(
                        operation,
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    last_error = Some(error);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::info!(operation, attempts, "Cancelled during backoff");
                            return RunOutcome::Cancelled { attempts, last_error };
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn engine(max_attempts: u32) -> SubmissionRetryEngine {
        SubmissionRetryEngine::new(RetryPolicy {
            max_attempts,
            backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            conflict_wait: Duration::from_secs(20),
        })
    }

    fn network() -> GatewayError {
        GatewayError::Network("connection reset".into())
    }

    #[tokio::test]
    async fn test_first_try_success() {
        let calls = AtomicU32::new(0);
        let outcome = engine(3)
            .run("list_inputs", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, GatewayError>(5) }
            })
            .await;
        assert_eq!(outcome, RunOutcome::Succeeded { value: 5, attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let outcome = engine(5)
            .run("list_inputs", &CancellationToken::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(network())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(outcome, RunOutcome::Succeeded { value: 3, attempts: 4 });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_ceiling_is_total_attempts() {
        let calls = AtomicU32::new(0);
        let outcome: RunOutcome<()> = engine(3)
            .run("submit", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::Timeout { after_ms: 10 }) }
            })
            .await;
        assert!(matches!(outcome, RunOutcome::Failed { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome: RunOutcome<()> = engine(5)
            .run("submit", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(GatewayError::Rejected {
                        kind: RejectionKind::Conflict,
                        reason: "BadInputsUTxO".into(),
                    })
                }
            })
            .await;
        let RunOutcome::RetryLater { suggested_wait, attempts, .. } = outcome else {
            panic!("expected RetryLater")
        };
        assert_eq!(suggested_wait, Duration::from_secs(20));
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let outcome: RunOutcome<()> = engine(5)
            .run("submit", &CancellationToken::new(), || async {
                Err(GatewayError::Unauthorized)
            })
            .await;
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                error: GatewayError::Unauthorized,
                attempts: 1
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let outcome: RunOutcome<()> = engine(3)
            .run("submit", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert_eq!(outcome, RunOutcome::Cancelled { attempts: 0, last_error: None });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let engine = SubmissionRetryEngine::new(RetryPolicy {
            max_attempts: 5,
            backoff: BackoffStrategy::Fixed(Duration::from_secs(60)),
            conflict_wait: Duration::from_secs(1),
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome: RunOutcome<()> = tokio::time::timeout(
            Duration::from_secs(5),
            engine.run("submit", &cancel, || async { Err(network()) }),
        )
        .await
        .expect("cancellation should end the backoff");
        assert_eq!(
            outcome,
            RunOutcome::Cancelled {
                attempts: 1,
                last_error: Some(network())
            }
        );
    }

    #[tokio::test]
    async fn test_in_flight_success_survives_cancel() {
        let cancel = CancellationToken::new();
        let inner = cancel.clone();
        let outcome = engine(3)
            .run("submit", &cancel, || {
                let inner = inner.clone();
                async move {
                    inner.cancel();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, GatewayError>("accepted")
                }
            })
            .await;
        assert_eq!(outcome, RunOutcome::Succeeded { value: "accepted", attempts: 1 });
    }

    #[tokio::test]
    async fn test_no_new_attempt_after_cancel_during_call() {
        let cancel = CancellationToken::new();
        let inner = cancel.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome: RunOutcome<()> = engine(3)
            .run("submit", &cancel, || {
                counter.fetch_add(1, Ordering::SeqCst);
                let inner = inner.clone();
                async move {
                    inner.cancel();
                    Err(network())
                }
            })
            .await;
        assert!(matches!(outcome, RunOutcome::Cancelled { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attempt_state_transitions() {
        let mut attempt = TransactionAttempt::new(TxHash([1; 32]));
        assert_eq!(attempt.state(), AttemptState::Built);
        attempt.mark_signed();
        assert_eq!(attempt.state(), AttemptState::Signed);

        attempt.mark_submitted();
        attempt.record(&Err(network()));
        assert_eq!(attempt.state(), AttemptState::NetworkFailure);
        assert_eq!(attempt.last_failure(), Some(FailureClass::Transient));

        attempt.mark_submitted();
        attempt.record(&Err(GatewayError::Rejected {
            kind: RejectionKind::Other,
            reason: "script".into(),
        }));
        assert_eq!(attempt.state(), AttemptState::RejectedOther);

        attempt.mark_submitted();
        attempt.record(&Ok(TxHash([1; 32])));
        assert_eq!(attempt.state(), AttemptState::Confirmed);
        assert_eq!(attempt.attempts(), 3);
        assert_eq!(attempt.last_failure(), None);
        assert!(attempt.was_ambiguous());
    }

    #[test]
    fn test_rejection_alone_is_not_ambiguous() {
        let mut attempt = TransactionAttempt::new(TxHash([1; 32]));
        attempt.mark_submitted();
        attempt.record(&Err(GatewayError::Rejected {
            kind: RejectionKind::Conflict,
            reason: "BadInputsUTxO".into(),
        }));
        assert_eq!(attempt.state(), AttemptState::RejectedConflict);
        assert!(!attempt.was_ambiguous());
    }

    #[test]
    fn test_policy_from_config_clamps_attempts() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }
}
