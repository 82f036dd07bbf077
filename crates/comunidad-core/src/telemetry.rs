//! Tracing bootstrap shared by binaries.

use crate::ComunidadResult;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,comunidad=debug";

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `level`. `format` selects `json` or pretty output.
#[cfg(feature = "telemetry")]
pub fn init_tracing(level: &str, format: &str) -> ComunidadResult<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| crate::ComunidadError::internal(format!("Failed to init tracing: {}", e)))
}

/// No-op when the `telemetry` feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_level: &str, _format: &str) -> ComunidadResult<()> {
    Ok(())
}
