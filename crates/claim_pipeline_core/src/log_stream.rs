use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const LOG_GROUP_OPTION: &str = "awslogs-group";
pub const STREAM_PREFIX_OPTION: &str = "awslogs-stream-prefix";

/// Where a task definition's log driver writes worker output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSink {
    pub group: String,
    pub stream_prefix: String,
}

impl LogSink {
    pub fn from_driver_options(options: &HashMap<String, String>) -> Result<Self, String> {
        let group = required_option(options, LOG_GROUP_OPTION)?;
        let stream_prefix = required_option(options, STREAM_PREFIX_OPTION)?;
        Ok(Self {
            group,
            stream_prefix,
        })
    }

    pub fn stream_for(&self, container_name: &str, run_id: &str) -> String {
        log_stream_name(&self.stream_prefix, container_name, run_id)
    }
}

fn required_option(options: &HashMap<String, String>, name: &str) -> Result<String, String> {
    options
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("log configuration is missing '{name}'"))
}

/// Last path segment of a run identifier (`.../task/<cluster>/<id>` -> `<id>`).
pub fn run_id_suffix(run_id: &str) -> &str {
    run_id.rsplit('/').next().unwrap_or(run_id)
}

pub fn log_stream_name(stream_prefix: &str, container_name: &str, run_id: &str) -> String {
    format!(
        "{}/{container_name}/{}",
        stream_prefix.trim_end_matches('/'),
        run_id_suffix(run_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_stream_name_from_task_arn() {
        let name = log_stream_name(
            "claim-checker",
            "claim-checker",
            "arn:aws:ecs:us-east-1:123456789012:task/claims-cluster/0f1e2d3c4b5a",
        );
        assert_eq!(name, "claim-checker/claim-checker/0f1e2d3c4b5a");
    }

    #[test]
    fn bare_run_id_is_used_as_is() {
        assert_eq!(run_id_suffix("0f1e2d3c4b5a"), "0f1e2d3c4b5a");
        assert_eq!(log_stream_name("p/", "c", "abc"), "p/c/abc");
    }

    #[test]
    fn reads_sink_from_driver_options() {
        let options = HashMap::from([
            (LOG_GROUP_OPTION.to_string(), "/ecs/claim-checker".to_string()),
            (STREAM_PREFIX_OPTION.to_string(), "claim-checker".to_string()),
            ("awslogs-region".to_string(), "us-east-1".to_string()),
        ]);

        let sink = LogSink::from_driver_options(&options).expect("sink should resolve");
        assert_eq!(sink.group, "/ecs/claim-checker");
        assert_eq!(
            sink.stream_for("claim-checker", "task/claims/abc"),
            "claim-checker/claim-checker/abc"
        );
    }

    #[test]
    fn missing_stream_prefix_is_reported() {
        let options = HashMap::from([(LOG_GROUP_OPTION.to_string(), "/ecs/x".to_string())]);
        let error = LogSink::from_driver_options(&options).expect_err("prefix is required");
        assert_eq!(error, "log configuration is missing 'awslogs-stream-prefix'");
    }
}
