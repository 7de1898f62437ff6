use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Default level when RUST_LOG is not set (trace, debug, info, warn,
    /// error).
    pub log_level: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json_output: bool,
}

/// Initialize the tracing subscriber for the process.
///
/// RUST_LOG takes precedence over the configured level so operators can
/// raise verbosity per module without a restart config change.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_output {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(true)
            .with_current_span(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    tracing::info!(service = %config.service_name, "telemetry initialized");
    Ok(())
}
