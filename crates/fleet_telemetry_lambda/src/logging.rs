use tracing_subscriber::EnvFilter;

/// Installs the JSON subscriber used by both Lambdas.
///
/// Filtering comes from `RUST_LOG` (default `info`). Timestamps are left to
/// CloudWatch, which stamps ingestion time on every line.
pub fn init() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_current_span(false)
        .with_target(false)
        .without_time()
        .init();
}
