//! Tracing initialisation for processes that embed the runner.
//!
//! Call [`init_tracing`] once at startup. Later calls are ignored because
//! the global subscriber can only be installed once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "AUTOGRADE_LOG";

/// Build the filter: `AUTOGRADE_LOG`, then `RUST_LOG`, then `level`.
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber.
///
/// * `json` emits newline-delimited JSON, one object per event.
/// * `level` is the default verbosity when no filter variable is set.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .is_ok()
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .is_ok()
    }
}
