use std::{fs, path::Path};

use anyhow::Context;
use chrono::Utc;
use tracing::{Span, info, info_span, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

pub const DEFAULT_FILTER: &str = "info,teopatch_core=trace";
pub const DEFAULT_FILE_PREFIX: &str = "teopatch";

/// Keeps the non-blocking log writer alive; drop it to flush.
pub struct TelemetryGuard {
    pub session_id: Uuid,
    _file_guard: WorkerGuard,
}

impl TelemetryGuard {
    /// Root span for one CLI command; every patch and batch span nests under it.
    #[must_use]
    pub fn session_span(&self, command: &str) -> Span {
        session_span(self.session_id, command)
    }
}

#[must_use]
pub fn session_span(session_id: Uuid, command: &str) -> Span {
    info_span!("session", %session_id, command)
}

pub fn init_tracing(log_dir: impl AsRef<Path>) -> anyhow::Result<TelemetryGuard> {
    init_tracing_with_options(log_dir, DEFAULT_FILE_PREFIX, DEFAULT_FILTER)
}

pub fn init_tracing_with_options(
    log_dir: impl AsRef<Path>,
    file_prefix: &str,
    default_filter: &str,
) -> anyhow::Result<TelemetryGuard> {
    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let session_id = Uuid::new_v4();
    let file_name = log_file_name(file_prefix);
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_target(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(file_writer);

    if let Err(error) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        warn!(?error, "global tracing subscriber already initialized");
    } else {
        info!(%session_id, "tracing initialized");
    }

    Ok(TelemetryGuard {
        session_id,
        _file_guard: file_guard,
    })
}

fn log_file_name(file_prefix: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    format!("{file_prefix}-{timestamp}.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_span_records_id_and_command() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = session_span(Uuid::nil(), "drum-batch");
            let metadata = span.metadata().expect("registry enables every span");
            assert_eq!(metadata.name(), "session");
            assert!(metadata.fields().field("session_id").is_some());
            assert!(metadata.fields().field("command").is_some());
        });
    }

    #[test]
    fn log_file_name_carries_prefix() {
        let name = log_file_name("kit");
        assert!(name.starts_with("kit-"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "kit-".len() + "YYYYmmdd-HHMMSS".len() + ".log".len());
    }
}
