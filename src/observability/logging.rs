//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level. Secrets are never recorded as fields.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Default directive set for a configured level.
fn default_directives(level: &str) -> String {
    format!("provenance_mint={level},mint_cli={level},tower_http={level}")
}

fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = build_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.log_format {
        LogFormat::Compact => registry.with(tracing_subscriber::fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
        LogFormat::Full => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_binaries() {
        let directives = default_directives("debug");
        assert!(directives.contains("provenance_mint=debug"));
        assert!(directives.contains("mint_cli=debug"));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = ObservabilityConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
