use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;
use utils::version;

use crate::error::ReporterError;
use crate::error::ReporterResult;
use crate::reporter::DEFAULT_NAME;

/// Reporter settings, as read from a YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReporterConfig {
    pub host: String,
    pub port: u16,
    /// Key prefix without the trailing dot
    pub prefix: Option<String>,
    pub interval_secs: u64,
    pub name: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8125,
            prefix: None,
            interval_secs: 60,
            name: DEFAULT_NAME.to_string(),
        }
    }
}

impl ReporterConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ReporterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .change_context_lazy(|| ReporterError::configuration("failed to read config file"))
            .attach_printable_lazy(|| format!("path: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .attach_printable_lazy(|| format!("path: {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> ReporterResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .change_context_lazy(|| ReporterError::configuration("invalid YAML"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReporterResult<()> {
        if self.host.is_empty() {
            return Err(Report::new(ReporterError::configuration("host is empty")));
        }
        if self.port == 0 {
            return Err(Report::new(ReporterError::configuration("port must be non-zero")));
        }
        if self.interval_secs == 0 {
            return Err(Report::new(ReporterError::configuration(
                "intervalSecs must be at least 1",
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Periodically report process metrics to a StatsD aggregator
    Daemon(DaemonArgs),
}

#[derive(Parser, Debug, Clone, Default)]
pub struct DaemonArgs {
    #[arg(
        long,
        env = "STATSD_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "YAML config file; flags given on the command line take precedence"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, env = "STATSD_HOST", help = "Aggregator host (default: localhost)")]
    pub host: Option<String>,

    #[arg(long, env = "STATSD_PORT", help = "Aggregator UDP port (default: 8125)")]
    pub port: Option<u16>,

    #[arg(long, env = "STATSD_PREFIX", help = "Prefix prepended to every metric key")]
    pub prefix: Option<String>,

    #[arg(
        long,
        env = "STATSD_INTERVAL_SECS",
        help = "Seconds between reports (default: 60)"
    )]
    pub interval_secs: Option<u64>,

    #[arg(
        long,
        env = "STATSD_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_file: Option<PathBuf>,
}

impl DaemonArgs {
    /// Effective configuration: the config file (or defaults) overridden by
    /// any flag that was supplied.
    pub fn resolve(&self) -> ReporterResult<ReporterConfig> {
        let mut config = match &self.config {
            Some(path) => ReporterConfig::from_yaml_file(path)?,
            None => ReporterConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = Some(prefix.clone());
        }
        if let Some(interval_secs) = self.interval_secs {
            config.interval_secs = interval_secs;
        }

        config.validate()?;
        Ok(config)
    }
}
