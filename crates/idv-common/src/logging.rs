//! Tracing subscriber setup shared by the binaries

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::{Compact, DefaultFields, Format, Json, JsonFields};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_logging(format: LogFormat, default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(text_layer()).init(),
        LogFormat::Json => registry.with(json_layer()).init(),
    }
}

fn text_layer<S>() -> fmt::Layer<S, DefaultFields, Format<Compact>> {
    fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .compact()
}

fn json_layer<S>() -> fmt::Layer<S, JsonFields, Format<Json>> {
    fmt::layer()
        .with_target(true)
        .json()
        .with_current_span(true)
}
