//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Install a console `tracing` subscriber.
///
/// `RUST_LOG` overrides `level` when set. Does nothing if a global
/// subscriber is already installed.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
