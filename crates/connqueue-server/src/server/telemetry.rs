//! Log subscriber setup.
//!
//! Events go to stdout through a `fmt` layer, filtered by `RUST_LOG`
//! (default `info`). The `connqueue` library emits its own events under the
//! `connqueue` target, so `RUST_LOG=info,connqueue=trace` shows every
//! enqueue and dequeue.

use crate::server::config::LogFormat;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber was already installed.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let pretty = (format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty()
    });
    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_thread_ids(true)
            .with_timer(ChronoLocal::rfc_3339())
            .json()
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(pretty)
        .with(json)
        .try_init()?;

    Ok(())
}
