//! Environment-driven configuration for both functions.
//!
//! Parsing goes through a lookup closure so tests can supply a map instead of
//! touching the process environment.

use std::time::Duration;

use crate::error::ConfigError;
use crate::runtime::secret::DEFAULT_SECRET_FIELD;
use crate::runtime::upload_keys::DEFAULT_UPLOAD_FOLDER;
use crate::runtime::wait_policy::{
    WaitPolicy, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_WAIT_TIMEOUT_SECS,
};

pub const DEFAULT_LAUNCH_TYPE: &str = "EC2";
pub const DEFAULT_UPLOAD_URL_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub secret_id: String,
    pub secret_field: String,
    pub cluster: String,
    pub task_definition: String,
    pub container_name: String,
    pub launch_type: String,
    /// Attached after the function is created, so it may be absent.
    pub notify_topic_arn: Option<String>,
    pub upload_key_prefix: Option<String>,
    pub wait_policy: WaitPolicy,
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let poll_interval = seconds(
            &lookup,
            "WORKER_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let timeout = seconds(&lookup, "WORKER_WAIT_TIMEOUT_SECS", DEFAULT_WAIT_TIMEOUT_SECS)?;
        let wait_policy =
            WaitPolicy::new(poll_interval, timeout).map_err(|error| ConfigError::Invalid {
                name: "WORKER_WAIT_TIMEOUT_SECS",
                reason: error.message().to_string(),
            })?;

        Ok(Self {
            secret_id: required(&lookup, "SECRET_ARN")?,
            secret_field: optional(&lookup, "SECRET_FIELD")
                .unwrap_or_else(|| DEFAULT_SECRET_FIELD.to_string()),
            cluster: required(&lookup, "CLUSTER_NAME")?,
            task_definition: required(&lookup, "TASK_DEFINITION")?,
            container_name: required(&lookup, "CONTAINER_NAME")?,
            launch_type: optional(&lookup, "WORKER_LAUNCH_TYPE")
                .unwrap_or_else(|| DEFAULT_LAUNCH_TYPE.to_string()),
            notify_topic_arn: optional(&lookup, "NOTIFY_TOPIC_ARN"),
            upload_key_prefix: optional(&lookup, "UPLOAD_KEY_PREFIX"),
            wait_policy,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignConfig {
    pub bucket: String,
    pub upload_folder: String,
    pub url_ttl: Duration,
}

impl PresignConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: required(&lookup, "BUCKET_NAME")?,
            upload_folder: optional(&lookup, "UPLOAD_FOLDER")
                .unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.to_string()),
            url_ttl: seconds(&lookup, "UPLOAD_URL_TTL_SECS", DEFAULT_UPLOAD_URL_TTL_SECS)?,
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, name).ok_or(ConfigError::Missing { name })
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = optional(lookup, name) else {
        return Ok(Duration::from_secs(default));
    };
    let parsed: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("expected whole seconds, got '{raw}'"),
    })?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be positive".to_string(),
        });
    }
    Ok(Duration::from_secs(parsed))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn orchestrator_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "SECRET_ARN",
                "arn:aws:secretsmanager:us-east-1:123:secret:openai/api-key",
            ),
            ("CLUSTER_NAME", "claims-cluster"),
            (
                "TASK_DEFINITION",
                "arn:aws:ecs:us-east-1:123:task-definition/claim-checker:3",
            ),
            ("CONTAINER_NAME", "claim-checker"),
        ]
    }

    #[test]
    fn orchestrator_applies_defaults() {
        let config = OrchestratorConfig::from_lookup(lookup_from(&orchestrator_env()))
            .expect("config should load");

        assert_eq!(config.cluster, "claims-cluster");
        assert_eq!(config.secret_field, "OPENAI_API_KEY");
        assert_eq!(config.launch_type, "EC2");
        assert_eq!(config.notify_topic_arn, None);
        assert_eq!(config.upload_key_prefix, None);
        assert_eq!(config.wait_policy, WaitPolicy::default());
    }

    #[test]
    fn orchestrator_reads_optional_overrides() {
        let mut env = orchestrator_env();
        env.extend([
            ("NOTIFY_TOPIC_ARN", "arn:aws:sns:us-east-1:123:claim-results"),
            ("UPLOAD_KEY_PREFIX", "claimcollectors11/"),
            ("WORKER_POLL_INTERVAL_SECS", "2"),
            ("WORKER_WAIT_TIMEOUT_SECS", "20"),
            ("WORKER_LAUNCH_TYPE", "FARGATE"),
        ]);

        let config =
            OrchestratorConfig::from_lookup(lookup_from(&env)).expect("config should load");

        assert_eq!(
            config.notify_topic_arn.as_deref(),
            Some("arn:aws:sns:us-east-1:123:claim-results")
        );
        assert_eq!(config.upload_key_prefix.as_deref(), Some("claimcollectors11/"));
        assert_eq!(config.launch_type, "FARGATE");
        assert_eq!(config.wait_policy.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.wait_policy.max_polls(), 11);
    }

    #[test]
    fn orchestrator_requires_cluster() {
        let env: Vec<_> = orchestrator_env()
            .into_iter()
            .filter(|(key, _)| *key != "CLUSTER_NAME")
            .collect();

        let error =
            OrchestratorConfig::from_lookup(lookup_from(&env)).expect_err("cluster is required");
        assert_eq!(error, ConfigError::Missing { name: "CLUSTER_NAME" });
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut env = orchestrator_env();
        env.push(("SECRET_ARN", "  "));
        let lookup = lookup_from(&env);

        let error = OrchestratorConfig::from_lookup(lookup).expect_err("blank secret id");
        assert_eq!(error, ConfigError::Missing { name: "SECRET_ARN" });
    }

    #[test]
    fn rejects_non_numeric_and_zero_durations() {
        let mut env = orchestrator_env();
        env.push(("WORKER_POLL_INTERVAL_SECS", "soon"));
        let error = OrchestratorConfig::from_lookup(lookup_from(&env))
            .expect_err("non-numeric interval should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "WORKER_POLL_INTERVAL_SECS",
                ..
            }
        ));

        let error = PresignConfig::from_lookup(lookup_from(&[
            ("BUCKET_NAME", "claims-bucket"),
            ("UPLOAD_URL_TTL_SECS", "0"),
        ]))
        .expect_err("zero ttl should fail");
        assert_eq!(
            error.to_string(),
            "UPLOAD_URL_TTL_SECS is invalid: must be positive"
        );
    }

    #[test]
    fn timeout_shorter_than_interval_is_invalid() {
        let mut env = orchestrator_env();
        env.extend([
            ("WORKER_POLL_INTERVAL_SECS", "30"),
            ("WORKER_WAIT_TIMEOUT_SECS", "10"),
        ]);
        let error = OrchestratorConfig::from_lookup(lookup_from(&env))
            .expect_err("timeout below interval should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "WORKER_WAIT_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn presign_defaults_to_upload_folder_and_five_minutes() {
        let config = PresignConfig::from_lookup(lookup_from(&[("BUCKET_NAME", "claims-bucket")]))
            .expect("config should load");

        assert_eq!(config.bucket, "claims-bucket");
        assert_eq!(config.upload_folder, "claimcollectors11");
        assert_eq!(config.url_ttl, Duration::from_secs(300));
    }
}
