//! Diagnostic output for the binaries.
//!
//! The library only emits `tracing` events. Nothing is printed unless a
//! front end installs a subscriber through [init].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Used when neither `--log` nor `RUST_LOG` says otherwise.
pub const DEFAULT_FILTER: &str = "warn";

/// Picks the filter directive: an explicit one wins over `RUST_LOG`,
/// which wins over [DEFAULT_FILTER].
pub fn filter_for(explicit: Option<&str>) -> anyhow::Result<EnvFilter> {
    match explicit {
        Some(directive) => Ok(EnvFilter::try_new(directive)?),
        None            => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Installs a compact stderr subscriber. Standard output is left alone
/// for the report tables.
pub fn init(explicit: Option<&str>) -> anyhow::Result<()> {
    let filter = filter_for(explicit)?;
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}
