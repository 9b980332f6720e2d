//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` applies to this crate and
/// `warn` to everything else.
pub fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

fn default_directive(level: &str) -> String {
    format!("warn,loadtrace={}", level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert_eq!(directive, "warn,loadtrace=debug");
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn test_second_install_is_reported() {
        let _ = init_logging("info");
        let err = init_logging("info")
            .map_err(|e| e as Box<dyn std::error::Error>)
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
