//! Token lifecycle service.
//!
//! # Data Flow
//! ```text
//! request (seed, provider key, order)
//!     → WalletSessions::acquire (one operation per custodial address)
//!     → TokenService::mint / update_status
//!         → gateway listing (retried)
//!         → minting::* (select, bind, build)
//!         → wallet signature
//!         → SubmissionRetryEngine::submit
//!     → ServiceResult
//! ```

pub mod outcome;
pub mod session;
pub mod token_service;

pub use outcome::{FailureKind, ServiceResult};
pub use session::{SessionGuard, WalletSessions};
pub use token_service::{MintOrder, StatusUpdate, TokenService};
