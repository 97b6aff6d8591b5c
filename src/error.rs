use thiserror::Error;

/// Main error type for the control loop
#[derive(Error, Debug)]
pub enum MapeError {
    // Resource tree errors
    #[error("Resource already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Resource not registered: {0}")]
    NotRegistered(String),

    // Metric lifecycle errors
    #[error("Metric already running: {metric_uri} on {resource_uri}")]
    AlreadyRunning {
        metric_uri: String,
        resource_uri: String,
    },

    #[error("Metric not running: {metric_uri} on {resource_uri}")]
    NotRunning {
        metric_uri: String,
        resource_uri: String,
    },

    // Rule engine errors
    #[error("Rule name already in use: {0}")]
    DuplicateRuleName(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Invalid rule query: {0}")]
    InvalidQuery(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // SLA lifecycle errors
    #[error("SLA validation already running, update instead of starting")]
    SlaAlreadyRunning,

    #[error("SLA validation not running, start SLA validation first")]
    SlaNotRunning,

    #[error("No SLA set")]
    NoSla,

    // Action execution errors
    #[error("Action queue full: {0}")]
    ActionQueueFull(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Declarative file error: {0}")]
    Toml(#[from] toml::de::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MapeError {
    pub(crate) fn already_running(metric: &crate::domain::ConfiguredMetric) -> Self {
        MapeError::AlreadyRunning {
            metric_uri: metric.metric_uri().to_string(),
            resource_uri: metric.resource_uri().to_string(),
        }
    }

    pub(crate) fn not_running(metric: &crate::domain::ConfiguredMetric) -> Self {
        MapeError::NotRunning {
            metric_uri: metric.metric_uri().to_string(),
            resource_uri: metric.resource_uri().to_string(),
        }
    }

    pub(crate) fn invalid_pattern(pattern: &str, err: regex::Error) -> Self {
        MapeError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias for MapeError
pub type Result<T> = std::result::Result<T, MapeError>;
