//! Process-wide logging initialization: a `tracing-subscriber` layer
//! reading its filter from `RUST_LOG`, falling back to a sane default so
//! the provider is never silent out of the box.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,modbridge=debug";

/// Initialize the global tracing subscriber. Safe to call once at process
/// start; a second call is a logic error in the caller, not guarded here
/// since only `main` is expected to call it.
///
/// `verbosity_override` lets a CLI's repeated `-v` flag raise the default
/// filter without touching `RUST_LOG`; an explicit `RUST_LOG` always wins.
pub fn init(verbosity_override: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_override.unwrap_or(DEFAULT_FILTER)));
    fmt().with_env_filter(filter).with_target(true).init();
}
