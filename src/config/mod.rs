//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc with the HTTP layer and token service
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets never live in config; they arrive per request

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LedgerConfig, ListenerConfig, LogFormat, MintingConfig, ObservabilityConfig, ProtocolConfig,
    RetryConfig, RetryStrategy, ServiceConfig,
};
pub use validation::ValidationError;
