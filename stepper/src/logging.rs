//! Diagnostic logging setup
//!
//! Logs go to stderr so they never interleave with the board on stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over warn.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "stepper=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
