use tracing_subscriber::EnvFilter;

/// Logging settings handed to each stage's entry point.
///
/// `RUST_LOG` takes precedence over `default_directive` when set.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_directive: String,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            with_target: false,
        }
    }
}

/// Install the fmt subscriber. Calling it again is a no-op.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init();
}
