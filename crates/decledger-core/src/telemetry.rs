//! Tracing setup for decledger binaries.
//!
//! [`init_tracing`] installs the global subscriber: an `EnvFilter` (from
//! `RUST_LOG` when set) plus either human-readable or newline-delimited JSON
//! output. Only the first call in a process has any effect.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter used when `RUST_LOG` is absent.
///
/// decledger crates log at `level`; everything else (HTTP, storage engine)
/// stays at `warn` so pipeline events are not drowned out.
pub fn default_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::new(format!(
        "warn,decledger_core={level},decledger_state={level},decledger_gateway={level},decledger={level}"
    ))
}

/// Install the global subscriber.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().with_target(false).json().flatten_event(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    // already installed by an earlier call or a test harness
    installed.ok();
}
