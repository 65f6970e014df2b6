//! Tracing setup

use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "warn";

/// Initialize the global tracing subscriber
///
/// Use the `RUST_LOG` env var to control the level (e.g. `RUST_LOG=app_state=debug`).
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}
