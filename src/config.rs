use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::execution::OverflowPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Poll interval for metrics created by the factory, and for declared
    /// metrics with an interval of 0
    #[serde(default = "default_poll_interval_ms")]
    pub default_poll_interval_ms: u64,
}

impl MetricsConfig {
    pub fn default_poll_interval(&self) -> Duration {
        Duration::from_millis(self.default_poll_interval_ms)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsConfig {
    /// Pending actions held before the overflow policy applies
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Buffered discovery events before agents wait
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BootstrapConfig {
    /// Declarative rules/resources/metrics/SLA file applied at startup
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("metrics.default_poll_interval_ms", 5000)?
            .set_default("actions.queue_capacity", 256)?
            .set_default("actions.overflow", "reject")?
            .set_default("discovery.channel_capacity", 64)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific file, e.g. config/production.toml
            .add_source(
                File::from(config_dir.join(
                    std::env::var("MAPE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // MAPE_ACTIONS__QUEUE_CAPACITY=32 etc.
            .add_source(
                Environment::with_prefix("MAPE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.metrics.default_poll_interval_ms == 0 {
            errors.push("metrics.default_poll_interval_ms must be positive".to_string());
        }

        if self.actions.queue_capacity == 0 {
            errors.push("actions.queue_capacity must be positive".to_string());
        }

        if self.discovery.channel_capacity == 0 {
            errors.push("discovery.channel_capacity must be positive".to_string());
        }

        if self.logging.level.trim().is_empty() {
            errors.push("logging.level must not be empty".to_string());
        }

        if let Some(path) = &self.bootstrap.path {
            if path.as_os_str().is_empty() {
                errors.push("bootstrap.path must not be empty when set".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.metrics.default_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.actions.queue_capacity, 256);
        assert_eq!(config.actions.overflow, OverflowPolicy::Reject);
        assert!(config.bootstrap.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[logging]
level = "debug"
json = true

[metrics]
default_poll_interval_ms = 250

[actions]
queue_capacity = 8
overflow = "block"

[bootstrap]
path = "config/bootstrap.toml"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.metrics.default_poll_interval_ms, 250);
        assert_eq!(config.actions.queue_capacity, 8);
        assert_eq!(config.actions.overflow, OverflowPolicy::Block);
        assert_eq!(
            config.bootstrap.path.as_deref(),
            Some(Path::new("config/bootstrap.toml"))
        );
        assert_eq!(config.discovery.channel_capacity, 64);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = AppConfig::default();
        config.metrics.default_poll_interval_ms = 0;
        config.actions.queue_capacity = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("default_poll_interval_ms"));
    }
}
