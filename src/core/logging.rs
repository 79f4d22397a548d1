use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::{
    config::{LogFormat, LoggingConfig},
    error::{AppError, Result},
};

const DEFAULT_FILTER: &str = "warn,cronctl=info";

/// Initialize logging with custom configuration. `RUST_LOG` wins over the
/// configured level when set.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match config.level.as_deref() {
            Some(level) => EnvFilter::new(format!("warn,cronctl={}", normalize_level(level))),
            None => EnvFilter::new(DEFAULT_FILTER),
        }
    });

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .json()
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .pretty()
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::NONE)
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .compact()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::ConfigError(format!("Failed to initialize logging: {}", e)))?;

    info!(format = ?config.format, "Structured logging initialized");
    Ok(())
}

fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level_falls_back_to_info() {
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level("verbose"), "info");
    }
}
