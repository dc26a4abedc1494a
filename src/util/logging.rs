use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes tracing/logging based on environment variables.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
