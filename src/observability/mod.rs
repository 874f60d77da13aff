//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway, retry engine and token service produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request span
//! - Metrics are cheap (atomic increments) and no-ops when disabled
//! - Seed phrases and provider keys are never log fields

pub mod logging;
pub mod metrics;
