//! Logging setup and data directory layout

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use crate::config::Config;

pub const LOG_FILE_PREFIX: &str = "wallet-tx-engine.log";

pub struct LoggingGuard {
    pub _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Installs console logging plus an hourly rolling file under
/// `config.log_dir`, compact text or one JSON object per line depending on
/// `config.log_json`. The host must hold the returned guard or buffered file
/// output is lost on exit.
pub fn setup_logging(config: &Config) -> Result<Arc<LoggingGuard>> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_appender = tracing_appender::rolling::hourly(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let text_file = (!config.log_json).then(|| {
        fmt::layer()
            .with_writer(non_blocking.clone())
            .with_target(true)
            .with_ansi(false)
            .compact()
    });
    let json_file = config.log_json.then(|| {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_current_span(false)
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(true)
        )
        .with(text_file)
        .with(json_file)
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .try_init()?;

    Ok(Arc::new(LoggingGuard { _guard: guard }))
}

/// Creates the journal directories under `data_dir`.
pub fn setup_data_directories(data_dir: impl AsRef<Path>) -> Result<()> {
    let data_dir = data_dir.as_ref();
    for sub in ["transactions", "bundles"] {
        std::fs::create_dir_all(data_dir.join(sub))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_once_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            log_dir: dir.path().join("logs").to_string_lossy().into_owned(),
            log_json: true,
            ..Config::default()
        };

        let guard = setup_logging(&config).unwrap();
        tracing::info!(component = "logging", "JSON file logging installed");
        assert!(dir.path().join("logs").is_dir());

        // A second global subscriber is refused, not silently ignored.
        assert!(setup_logging(&config).is_err());
        drop(guard);

        setup_data_directories(dir.path().join("data")).unwrap();
        assert!(dir.path().join("data/transactions").is_dir());
        assert!(dir.path().join("data/bundles").is_dir());
    }
}
