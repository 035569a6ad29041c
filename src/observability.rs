//! Structured logging setup, grounded on the teacher's `RUST_LOG`-driven
//! `tracing_subscriber::fmt` wiring. A library does not install a global
//! subscriber on its own; this is a convenience for binaries/tests that
//! embed this crate.

use tracing_subscriber::EnvFilter;

/// Installs a JSON-formatted `tracing` subscriber honoring `RUST_LOG`,
/// defaulting to `info` with this crate at `info` and noisy HTTP
/// dependencies quieted down. Safe to call more than once; subsequent calls
/// are no-ops (global subscriber already set).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("scholarly_federation=info".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}
