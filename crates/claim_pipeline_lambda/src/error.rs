//! Error types for configuration loading and per-record processing.

use thiserror::Error;

/// Errors raised while reading function configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be configured")]
    Missing { name: &'static str },

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Unrecovered failure of one inner record after it was accepted for
/// processing. The owning queue message is reported for redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("NOTIFY_TOPIC_ARN is not configured")]
    TopicNotConfigured,

    #[error("failed to fetch secret: {0}")]
    SecretFetch(String),

    #[error("failed to launch worker: {0}")]
    Launch(String),

    #[error("failed while waiting for worker {run_id}: {cause}")]
    WaitFailed { run_id: String, cause: String },

    #[error("worker {run_id} did not stop within {waited_secs}s")]
    WaitTimedOut { run_id: String, waited_secs: u64 },

    #[error("worker {run_id} stopped without an exit code ({stopped_reason})")]
    MissingExitCode {
        run_id: String,
        stopped_reason: String,
    },

    #[error("failed to resolve worker log sink: {0}")]
    LogConfig(String),

    #[error("failed to read worker logs: {0}")]
    LogFetch(String),

    #[error("failed to publish result: {0}")]
    Publish(String),
}

impl RecordError {
    /// Stage name used in structured logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::TopicNotConfigured => "configuration",
            Self::SecretFetch(_) => "secret",
            Self::Launch(_) => "launch",
            Self::WaitFailed { .. } | Self::WaitTimedOut { .. } => "wait",
            Self::MissingExitCode { .. } => "describe",
            Self::LogConfig(_) | Self::LogFetch(_) => "logs",
            Self::Publish(_) => "publish",
        }
    }

    /// Whether a worker run was started before the failure.
    pub fn worker_launched(&self) -> bool {
        !matches!(
            self,
            Self::TopicNotConfigured | Self::SecretFetch(_) | Self::Launch(_)
        )
    }
}
