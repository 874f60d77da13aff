//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field constraints.
//! Validation is a pure function that reports every violation, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{RetryStrategy, ServiceConfig};

/// Provider runs one operation can make: input listing, cost model, submission.
const RUNS_PER_OPERATION: u64 = 3;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    let worst_case_ms = worst_case_operation_ms(config);
    if config.listener.request_timeout_secs.saturating_mul(1000) < worst_case_ms {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            format!(
                "must be at least {} s, the longest an operation can spend retrying",
                worst_case_ms.div_ceil(1000)
            ),
        ));
    }

    if let Some(url) = &config.ledger.provider_url {
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::new(
                "ledger.provider_url",
                format!("'{}' is not an http(s) URL", url),
            )),
        }
    }
    if config.ledger.request_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.request_timeout_secs", "must be > 0"));
    }
    if !(1..=100).contains(&config.ledger.page_size) {
        errors.push(ValidationError::new("ledger.page_size", "must be between 1 and 100"));
    }

    if let Some(template) = &config.minting.script_template_hex {
        if hex::decode(template).map(|b| b.is_empty()).unwrap_or(true) {
            errors.push(ValidationError::new(
                "minting.script_template_hex",
                "must be non-empty hex",
            ));
        }
    }
    if config
        .minting
        .plutus_v2_cost_model
        .as_ref()
        .is_some_and(Vec::is_empty)
    {
        errors.push(ValidationError::new(
            "minting.plutus_v2_cost_model",
            "must not be empty when set",
        ));
    }
    if config.minting.mint_label == config.minting.status_label {
        errors.push(ValidationError::new(
            "minting.status_label",
            "must differ from minting.mint_label",
        ));
    }

    let protocol = &config.protocol;
    if !(protocol.price_mem.is_finite() && protocol.price_mem >= 0.0) {
        errors.push(ValidationError::new("protocol.price_mem", "must be a finite value >= 0"));
    }
    if !(protocol.price_step.is_finite() && protocol.price_step >= 0.0) {
        errors.push(ValidationError::new("protocol.price_step", "must be a finite value >= 0"));
    }
    if protocol.max_tx_size == 0 {
        errors.push(ValidationError::new("protocol.max_tx_size", "must be > 0"));
    }
    if protocol.max_metadata_bytes == 0 {
        errors.push(ValidationError::new("protocol.max_metadata_bytes", "must be > 0"));
    }
    if protocol.collateral_percent < 100 {
        errors.push(ValidationError::new("protocol.collateral_percent", "must be >= 100"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must be >= retries.base_delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest an operation can keep a wallet busy: every run exhausting its attempts, each
/// attempt ending at the provider deadline, separated by the longest backoff delay.
pub fn worst_case_operation_ms(config: &ServiceConfig) -> u64 {
    let attempts = u64::from(config.retries.max_attempts);
    let delay_ms = match config.retries.strategy {
        RetryStrategy::Fixed => config.retries.base_delay_ms,
        RetryStrategy::Exponential => config.retries.max_delay_ms.max(config.retries.base_delay_ms),
    };
    let per_run = attempts
        .saturating_mul(config.ledger.request_timeout_secs.saturating_mul(1000))
        .saturating_add(attempts.saturating_sub(1).saturating_mul(delay_ms));
    per_run.saturating_mul(RUNS_PER_OPERATION)
}
