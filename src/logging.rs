//! Logging initialization

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `verbose`. Returns `false` when a
/// subscriber was already installed.
pub fn init_logging(verbose: u8) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .try_init()
        .is_ok();

    if installed {
        debug!("Logging initialized with verbosity level: {}", verbose);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), "info");
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(5), "trace");
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_logging(0);
        assert!(!init_logging(1));
    }
}
