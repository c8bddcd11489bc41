//! Generator configuration
//!
//! Loaded with `common::load_layered`: defaults, then an optional YAML/TOML/JSON file,
//! then `GRIDGEN_*` environment variables (`__` for nesting, e.g.
//! `GRIDGEN_TARGET__PORT=1502`). CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::logging::is_valid_level;
use common::{load_layered, LogConfig};
use errors::{GridgenError, GridgenResult};
use gridgen_protocols::modbus::DEFAULT_MODBUS_PORT;
use gridgen_protocols::{detect_local_ip, Target, DEFAULT_TRANSMIT_TIMEOUT};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENV_PREFIX: &str = "GRIDGEN_";
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 5;
/// One day
pub const MAX_REPORT_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Auto-detected local address when unset
    pub host: Option<String>,
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_MODBUS_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Daily rolling log files go here when set
    pub dir: Option<PathBuf>,
    /// JSON lines in the log file
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub target: TargetConfig,
    /// Connect and write timeout per frame
    pub transmit_timeout_ms: u64,
    /// Progress log period, 0 disables it
    pub report_interval_secs: u64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    pub logging: LoggingSettings,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            transmit_timeout_ms: DEFAULT_TRANSMIT_TIMEOUT.as_millis() as u64,
            report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
            seed: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl GeneratorConfig {
    /// Defaults, then `file` when given, then environment
    pub fn load(file: Option<&Path>) -> GridgenResult<Self> {
        load_layered(Self::default(), file, ENV_PREFIX)
    }

    pub fn validate(&self) -> GridgenResult<()> {
        if self.target.port == 0 {
            return Err(GridgenError::invalid_config("target.port", "must be 1-65535"));
        }
        if let Some(host) = &self.target.host {
            if host.trim().is_empty() {
                return Err(GridgenError::invalid_config("target.host", "must not be empty"));
            }
        }
        if self.transmit_timeout_ms == 0 {
            return Err(GridgenError::invalid_config(
                "transmit_timeout_ms",
                "must be positive",
            ));
        }
        if self.report_interval_secs > MAX_REPORT_INTERVAL_SECS {
            return Err(GridgenError::invalid_config(
                "report_interval_secs",
                format!("must be at most {MAX_REPORT_INTERVAL_SECS} (0 disables)"),
            ));
        }
        if !is_valid_level(&self.logging.level) {
            return Err(GridgenError::invalid_config(
                "logging.level",
                format!(
                    "unknown level '{}' (trace, debug, info, warn, error)",
                    self.logging.level
                ),
            ));
        }
        Ok(())
    }

    pub fn transmit_timeout(&self) -> Duration {
        Duration::from_millis(self.transmit_timeout_ms)
    }

    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_interval_secs > 0).then(|| Duration::from_secs(self.report_interval_secs))
    }

    /// Configured target, or the local outbound address on the configured port
    pub fn resolve_target(&self) -> GridgenResult<Target> {
        match &self.target.host {
            Some(host) => Target::new(host.clone(), self.target.port),
            None => {
                let ip = detect_local_ip();
                info!("No target host configured, using local address {}", ip);
                Target::new(ip.to_string(), self.target.port)
            },
        }
    }

    pub fn log_config(&self, ansi: bool) -> LogConfig {
        LogConfig {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            level: self.logging.level.clone(),
            log_dir: self.logging.dir.clone(),
            enable_json: self.logging.json,
            ansi,
        }
    }
}
