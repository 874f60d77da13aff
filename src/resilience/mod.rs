//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider call:
//!     → timeouts.rs (every call has a deadline; elapsed ⇒ Timeout)
//!     → retries.rs (classify, retry transient failures, stop on conflict or fatal)
//!     → backoff.rs (fixed or exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Branching is on the typed failure class, never on provider text
//! - Conflicts are surfaced, not retried: a retry would reuse the stale input
//! - Cancellation never abandons an in-flight submission

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::BackoffStrategy;
pub use retries::{
    AttemptState, RetryPolicy, RunOutcome, SubmissionOutcome, SubmissionRetryEngine,
    TransactionAttempt,
};
