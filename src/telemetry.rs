use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;

pub fn init_telemetry(config: &TelemetryConfig) {
    let filter = EnvFilter::try_new(&config.rust_log)
        .unwrap_or_else(|_| "bungu_entry_scanner=info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
