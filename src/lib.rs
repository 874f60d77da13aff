//! Custodial minting service for batch provenance tokens.

pub mod config;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod minting;
pub mod observability;
pub mod resilience;
pub mod service;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::{ServiceResult, TokenService};
