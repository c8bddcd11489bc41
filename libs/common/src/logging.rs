//! Logging bootstrap for gridgen
//!
//! Console output always; optional daily rolling file output.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use errors::{GridgenError, GridgenResult};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Environment variable that overrides the configured log directory
pub const LOG_DIR_ENV: &str = "GRIDGEN_LOG_DIR";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Profile started`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps non-blocking file writers alive for the life of the process
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

/// Logging settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Crate/target name that gets `level` when RUST_LOG is unset
    pub service_name: String,
    /// Level for `service_name` targets
    pub level: String,
    /// Write a daily rolling file here when set
    pub log_dir: Option<PathBuf>,
    /// JSON lines instead of the bracketed format in the file
    pub enable_json: bool,
    /// Colour console output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "gridgen".to_string(),
            level: "info".to_string(),
            log_dir: None,
            enable_json: false,
            ansi: true,
        }
    }
}

/// Whether `level` is one of trace/debug/info/warn/error (case-insensitive)
pub fn is_valid_level(level: &str) -> bool {
    VALID_LEVELS.contains(&level.to_ascii_lowercase().as_str())
}

/// Resolve the log directory
///
/// Priority: `GRIDGEN_LOG_DIR` env > `configured` > none (console only)
pub fn resolve_log_dir(configured: Option<&Path>) -> Option<PathBuf> {
    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => Some(PathBuf::from(dir)),
        _ => configured.map(Path::to_path_buf),
    }
}

/// Filter string used when RUST_LOG is not set
fn default_filter(config: &LogConfig) -> String {
    let crate_target = config.service_name.replace('-', "_");
    format!(
        "info,{}={},gridgen_protocols={}",
        crate_target,
        config.level.to_ascii_lowercase(),
        config.level.to_ascii_lowercase()
    )
}

/// Initialize the global subscriber
///
/// RUST_LOG, when set, replaces the computed filter entirely.
pub fn init_with_config(config: &LogConfig) -> GridgenResult<()> {
    if !is_valid_level(&config.level) {
        return Err(GridgenError::invalid_config(
            "logging.level",
            format!("unknown level '{}'", config.level),
        ));
    }

    let env_filter = match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.trim().is_empty() => EnvFilter::try_new(&env_str)
            .map_err(|e| GridgenError::Logging(format!("Invalid RUST_LOG '{env_str}': {e}")))?,
        _ => EnvFilter::new(default_filter(config)),
    };

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let log_dir = resolve_log_dir(config.log_dir.as_deref());
    let file_layer = match &log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let guards = GUARDS.get_or_init(|| Mutex::new(Vec::new()));
            match guards.lock() {
                Ok(mut guards) => guards.push(guard),
                Err(poisoned) => poisoned.into_inner().push(guard),
            }

            let layer = if config.enable_json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            Some(layer)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| GridgenError::Logging(e.to_string()))?;

    match &log_dir {
        Some(dir) => tracing::debug!("Logging: {} @ {}", config.service_name, dir.display()),
        None => tracing::debug!("Logging: {} (console only)", config.service_name),
    }

    Ok(())
}
