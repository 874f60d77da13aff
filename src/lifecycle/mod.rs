//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → root token cancelled
//!         → per-request child tokens cancelled (retry loops stop before their next attempt)
//!         → server stops accepting and drains in-flight requests
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
