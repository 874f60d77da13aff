//! Deadlines for provider calls.
//!
//! Every gateway call runs under a deadline; an elapsed deadline surfaces as
//! [`GatewayError::Timeout`], which callers treat as transient.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::ledger::GatewayError;

/// Run `fut` under `deadline`.
pub async fn bounded<T, F>(deadline: Duration, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            after_ms: deadline.as_millis() as u64,
        }),
    }
}
