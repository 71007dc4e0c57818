use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise structured JSON logging on stdout.
///
/// The level comes from `RUST_LOG`, defaulting to `default_filter`. Audit
/// events are emitted on the `audit` target, so `RUST_LOG=info,audit=off`
/// silences them independently.
pub fn init_telemetry(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    // A global subscriber may already be installed (tests spawn many apps)
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Telemetry already initialised");
    }
}
