// Logging initialization for services and scripts
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// `RUST_LOG` wins when set; otherwise the requested level applies, with
/// sqlx statement logging demoted to warnings (it spams INFO).
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},sqlx=warn")))
}

/// Install the global subscriber for a long-running service.
///
/// Errors if a subscriber is already installed; call this once, early in
/// `main`.
pub fn init_service_logging(service_name: &str, instance_name: &str) -> Result<(), TryInitError> {
    init(Level::INFO, &format!("{service_name}.{instance_name}"))
}

/// Install the global subscriber for a one-shot script.
pub fn init_script_logging(level: Level, script_name: &str) -> Result<(), TryInitError> {
    init(level, script_name)
}

fn init(level: Level, originator: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;
    info!("logging initialized for {originator}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_directives_parse() {
        // EnvFilter::new silently drops bad directives; render the filter
        // to make sure ours survive
        let filter = EnvFilter::new(format!("{},sqlx=warn", Level::DEBUG));
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("sqlx=warn"));
    }
}
