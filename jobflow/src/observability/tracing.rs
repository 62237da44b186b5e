//! Tracing subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs a global fmt subscriber filtered by `RUST_LOG`.
///
/// Safe to call multiple times; only the first call installs a subscriber.
/// Returns true if this call installed it.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
    };

    installed.is_ok()
}
