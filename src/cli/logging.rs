//! Diagnostic logging setup

use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive
pub const LOG_ENV: &str = "CAPTURE_DECK_LOG";

/// Filter used when `CAPTURE_DECK_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "capture_deck=debug,info"
    } else {
        "warn"
    }
}

/// Install the stderr subscriber. `--verbose` wins over the environment.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(default_directive(true))
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
    };

    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_debug_for_the_crate() {
        assert!(default_directive(true).contains("capture_deck=debug"));
        assert_eq!(default_directive(false), "warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
