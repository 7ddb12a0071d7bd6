//! Logging initialization
//!
//! Structured logging to stderr so embedding hosts keep stdout for their
//! own protocol. Level overrides come from the `PLEXUS_LOG` environment
//! variable.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for hosts that have no subscriber of
/// their own
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_env_var("PLEXUS_LOG")
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
