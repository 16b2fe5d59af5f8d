//! Logging and metrics setup.
//!
//! - **Console**: JSON or compact human-readable output
//! - **Files**: optional daily-rotated logs split by level into `<dir>/error`
//!   and `<dir>/info`, written through non-blocking workers
//! - **Metrics**: Prometheus recorder rendered by the `/metrics` endpoint

use std::path::Path;

use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::{FromEnvError, LevelFilter, ParseError, filter_fn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use metrics_exporter_prometheus::PrometheusHandle;

/// Rotated files kept per level directory.
const MAX_LOG_FILES: usize = 14;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Telemetry setup errors.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter directive: {0}")]
    Directive(#[from] ParseError),
    #[error("invalid RUST_LOG filter: {0}")]
    Env(#[from] FromEnvError),
    #[error("failed to create log file appender: {0}")]
    Appender(#[from] InitError),
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: String,
    pub json_logs: bool,
    /// Directory for split log files; console only when `None`.
    pub log_dir: Option<std::path::PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            json_logs: true,
            log_dir: None,
        }
    }
}

/// Keeps the non-blocking file writers alive. Dropping it flushes them.
#[must_use]
pub struct TelemetryGuard {
    workers: Vec<WorkerGuard>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// Install the Prometheus recorder and return the handle for the /metrics endpoint.
///
/// # Errors
/// Returns an error if a global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    Ok(metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?)
}

fn parse_level(level: &str) -> Level {
    match level.to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn env_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(log_level).into())
        .from_env()?
        .add_directive("sqlx::query=warn".parse()?)
        .add_directive("tower=info".parse()?)
        .add_directive("hyper=info".parse()?)
        .add_directive("lettre=info".parse()?)
        .add_directive("reqwest=info".parse()?);
    Ok(filter)
}

/// Daily-rotated file layers: ERROR events into `<dir>/error`, every other
/// level into `<dir>/info`.
fn file_layers<S>(dir: &Path) -> Result<(Vec<BoxedLayer<S>>, Vec<WorkerGuard>), TelemetryError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let mut layers = Vec::with_capacity(2);
    let mut guards = Vec::with_capacity(2);

    for name in ["error", "info"] {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(name)
            .filename_suffix("log")
            .max_log_files(MAX_LOG_FILES)
            .build(dir.join(name))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(ChronoLocal::rfc_3339());
        let layer = if name == "error" {
            layer.with_filter(LevelFilter::ERROR).boxed()
        } else {
            layer
                .with_filter(filter_fn(|meta| *meta.level() != Level::ERROR))
                .boxed()
        };
        layers.push(layer);
    }

    Ok((layers, guards))
}

/// Setup the logging stack: console output plus optional split log files.
///
/// Returns a guard that must be kept alive for the application lifetime.
///
/// # Errors
/// Returns an error if a filter directive is invalid, the log directory cannot
/// be created, or a global subscriber is already installed.
pub fn setup_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = env_filter(&config.log_level)?;

    let mut layers: Vec<BoxedLayer<Registry>> = Vec::new();
    layers.push(if config.json_logs {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()))
            .compact()
            .boxed()
    });

    let mut workers = Vec::new();
    if let Some(dir) = &config.log_dir {
        let (file_layers, guards) = file_layers(dir)?;
        layers.extend(file_layers);
        workers = guards;
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(TelemetryGuard { workers })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn read_dir_contents(dir: &Path) -> String {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect()
    }

    #[test]
    fn default_config_logs_json_to_console_only() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "INFO");
        assert!(config.json_logs);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("Warn"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn file_logs_are_split_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let (layers, guards) = file_layers::<Registry>(dir.path()).unwrap();
        let subscriber = tracing_subscriber::registry().with(layers);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("database unreachable");
            tracing::warn!("cat name taken");
            tracing::info!("server started");
        });
        drop(guards);

        let errors = read_dir_contents(&dir.path().join("error"));
        let info = read_dir_contents(&dir.path().join("info"));

        assert!(errors.contains("database unreachable"));
        assert!(!errors.contains("server started"));
        assert!(info.contains("cat name taken"));
        assert!(info.contains("server started"));
        assert!(!info.contains("database unreachable"));
    }
}
