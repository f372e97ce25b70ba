//! Subscriber setup.
//!
//! Runs execute on worker threads, so records carry the thread id and name
//! next to the span fields of the run that produced them.

use tracing_subscriber::EnvFilter;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs a human-readable `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Returns false if a global
/// subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

/// Installs a JSON-formatted `tracing` subscriber.
///
/// Same filtering rules as [`init_logging`].
pub fn init_json_logging(level: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(level))
        .with_current_span(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init_logging("debug");
        assert!(!init_json_logging("info"));
        assert!(!init_logging("info"));
    }
}
