//! Process-wide logging bootstrap.
use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber` fmt layer filtered by `RUST_LOG` (default `info`).
///
/// Call once, at the very start of `main`. Idempotent-safe to call twice in tests
/// (`try_init` swallows the "already set" error).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
