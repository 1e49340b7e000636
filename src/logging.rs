//! Structured logging to stderr via `tracing`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise the
/// level is `info`, or `debug` for this crate when `verbose` is on.
pub fn init(verbose: bool) {
    let fallback = if verbose { "info,vocalyzer=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}
