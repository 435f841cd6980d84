//! Logging setup
//!
//! `RUST_LOG` wins when present; otherwise the configured level applies to
//! this crate and everything else logs at `info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter used when `RUST_LOG` is not set
pub fn default_directive(log_level: &str) -> String {
    format!("toyshop={},info", log_level)
}

/// Install the global tracing subscriber
pub fn init(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert_eq!(directive, "toyshop=debug,info");
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
