//! Tracing setup.
//!
//! `CLAUDEWATCH_LOG` takes standard `EnvFilter` directives and wins over the
//! flags. Without it only warnings are shown, unless `--verbose` or
//! `debug_logging = true` asks for debug output from this crate.
//!
//! ```bash
//! CLAUDEWATCH_LOG=cwatch=trace cwatch usage
//! ```

use tracing::Subscriber;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "CLAUDEWATCH_LOG";

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "warn,cwatch=debug"
    } else {
        "warn"
    }
}

fn subscriber(verbose: bool, debug_logging: bool) -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose || debug_logging)));

    fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .finish()
}

/// Install the global subscriber on stderr. Safe to call more than once.
pub fn init(verbose: bool, debug_logging: bool) {
    let _ = tracing::subscriber::set_global_default(subscriber(verbose, debug_logging));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        for debug in [false, true] {
            assert!(EnvFilter::try_new(default_directive(debug)).is_ok());
        }
    }

    #[test]
    fn debug_directive_targets_this_crate() {
        assert!(default_directive(true).contains("cwatch=debug"));
        assert_eq!(default_directive(false), "warn");
    }

    #[test]
    fn subscriber_builds_for_every_flag_combination() {
        for (verbose, debug_logging) in [(false, false), (true, false), (false, true)] {
            tracing::subscriber::with_default(subscriber(verbose, debug_logging), || {
                tracing::trace!(verbose, debug_logging, "scoped subscriber");
            });
        }
    }
}
