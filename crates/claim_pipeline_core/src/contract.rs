use std::fmt;

use serde::{Deserialize, Serialize};

pub const SECRET_ENV_NAME: &str = "OPENAI_API_KEY";
pub const BUCKET_ENV_NAME: &str = "S3_BUCKET";
pub const KEY_ENV_NAME: &str = "S3_KEY";
pub const LOG_TAIL_LIMIT: usize = 10;
pub const SUBJECT_PREFIX: &str = "Claim Processor: ";

/// One stored object, as named by an object-created notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentOverride {
    pub name: String,
    pub value: String,
}

impl EnvironmentOverride {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The three parameters injected into every worker run, in launch order.
pub fn worker_environment(secret: &str, location: &ObjectLocation) -> Vec<EnvironmentOverride> {
    vec![
        EnvironmentOverride::new(SECRET_ENV_NAME, secret),
        EnvironmentOverride::new(BUCKET_ENV_NAME, location.bucket.clone()),
        EnvironmentOverride::new(KEY_ENV_NAME, location.key.clone()),
    ]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Launched,
    Running,
    Stopped,
}

impl WorkerPhase {
    /// Maps a container-service task status onto the worker lifecycle.
    pub fn from_last_status(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "STOPPED" => Self::Stopped,
            "RUNNING" | "DEACTIVATING" | "STOPPING" | "DEPROVISIONING" => Self::Running,
            _ => Self::Launched,
        }
    }
}

/// Worker outcome category. A business rejection and a crash share the
/// non-zero category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    RejectedOrErrored,
}

impl Verdict {
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            Self::Accepted
        } else {
            Self::RejectedOrErrored
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::RejectedOrErrored => "Rejected/Errored",
        }
    }

    pub fn subject(self) -> String {
        format!("{SUBJECT_PREFIX}{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSummary {
    pub location: ObjectLocation,
    pub run_id: String,
    pub exit_code: i32,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_reason: Option<String>,
    pub log_tail: Vec<String>,
    pub completed_at: String,
}

impl ResultSummary {
    pub fn new(
        location: ObjectLocation,
        run_id: impl Into<String>,
        exit_code: i32,
        stopped_reason: Option<String>,
        log_lines: Vec<String>,
        completed_at: impl Into<String>,
    ) -> Self {
        Self {
            location,
            run_id: run_id.into(),
            exit_code,
            verdict: Verdict::from_exit_code(exit_code),
            stopped_reason: stopped_reason.filter(|reason| !reason.trim().is_empty()),
            log_tail: tail_lines(log_lines, LOG_TAIL_LIMIT),
            completed_at: completed_at.into(),
        }
    }

    pub fn subject(&self) -> String {
        self.verdict.subject()
    }

    pub fn body(&self) -> String {
        let mut body = format!(
            "{}\nExit code: {}\nVerdict: {}\n",
            self.location,
            self.exit_code,
            self.verdict.label()
        );
        if let Some(reason) = &self.stopped_reason {
            body.push_str(&format!("Stopped reason: {reason}\n"));
        }
        body.push_str(&format!("Completed at: {}\n", self.completed_at));
        body.push_str("\nLast logs:\n");
        for line in &self.log_tail {
            body.push_str(line.trim_end_matches(['\r', '\n']));
            body.push('\n');
        }
        body
    }
}

/// Keeps at most `limit` lines from the end, in the order received.
pub fn tail_lines(mut lines: Vec<String>, limit: usize) -> Vec<String> {
    if lines.len() > limit {
        let excess = lines.len() - limit;
        lines = lines.split_off(excess);
    }
    lines
}

/// Partial-batch response understood by the queue trigger: only the listed
/// messages are redelivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_location() -> ObjectLocation {
        ObjectLocation::new("claims-bucket", "claimcollectors11/report.pdf")
    }

    #[test]
    fn exit_code_zero_is_accepted_and_everything_else_is_not() {
        assert_eq!(Verdict::from_exit_code(0), Verdict::Accepted);
        for code in [1, -1, 137, 255, i32::MIN] {
            assert_eq!(Verdict::from_exit_code(code), Verdict::RejectedOrErrored);
        }
        assert_eq!(Verdict::Accepted.subject(), "Claim Processor: Accepted");
        assert_eq!(
            Verdict::RejectedOrErrored.subject(),
            "Claim Processor: Rejected/Errored"
        );
    }

    #[test]
    fn worker_environment_injects_secret_and_location() {
        let env = worker_environment("sk-test", &sample_location());

        assert_eq!(
            env,
            vec![
                EnvironmentOverride::new("OPENAI_API_KEY", "sk-test"),
                EnvironmentOverride::new("S3_BUCKET", "claims-bucket"),
                EnvironmentOverride::new("S3_KEY", "claimcollectors11/report.pdf"),
            ]
        );
    }

    #[test]
    fn maps_task_statuses_onto_lifecycle() {
        assert_eq!(
            WorkerPhase::from_last_status("PROVISIONING"),
            WorkerPhase::Launched
        );
        assert_eq!(WorkerPhase::from_last_status("PENDING"), WorkerPhase::Launched);
        assert_eq!(WorkerPhase::from_last_status("RUNNING"), WorkerPhase::Running);
        assert_eq!(WorkerPhase::from_last_status("STOPPING"), WorkerPhase::Running);
        assert_eq!(WorkerPhase::from_last_status("stopped"), WorkerPhase::Stopped);
    }

    #[test]
    fn tail_keeps_last_lines_in_received_order() {
        let lines: Vec<String> = (0..15).map(|index| format!("line {index}")).collect();
        let tail = tail_lines(lines, 10);

        assert_eq!(tail.len(), 10);
        assert_eq!(tail.first().map(String::as_str), Some("line 5"));
        assert_eq!(tail.last().map(String::as_str), Some("line 14"));
    }

    #[test]
    fn tail_does_not_reorder_unsorted_input() {
        let lines = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(tail_lines(lines.clone(), 10), lines);
    }

    #[test]
    fn summary_body_lists_location_exit_code_and_logs() {
        let summary = ResultSummary::new(
            sample_location(),
            "arn:aws:ecs:us-east-1:123456789012:task/claims/abc123",
            137,
            Some("Essential container in task exited".to_string()),
            vec!["loading claim\n".to_string(), "claim rejected".to_string()],
            "2026-02-14T00:00:00+00:00",
        );

        assert_eq!(summary.verdict, Verdict::RejectedOrErrored);
        assert_eq!(summary.subject(), "Claim Processor: Rejected/Errored");
        assert_eq!(
            summary.body(),
            "s3://claims-bucket/claimcollectors11/report.pdf\n\
             Exit code: 137\n\
             Verdict: Rejected/Errored\n\
             Stopped reason: Essential container in task exited\n\
             Completed at: 2026-02-14T00:00:00+00:00\n\
             \n\
             Last logs:\n\
             loading claim\n\
             claim rejected\n"
        );
    }

    #[test]
    fn summary_omits_blank_stopped_reason() {
        let summary = ResultSummary::new(
            sample_location(),
            "run-1",
            0,
            Some("  ".to_string()),
            Vec::new(),
            "now",
        );

        assert!(summary.stopped_reason.is_none());
        assert!(!summary.body().contains("Stopped reason"));
    }

    #[test]
    fn batch_response_uses_trigger_field_names() {
        let response = BatchResponse {
            batch_item_failures: vec![BatchItemFailure {
                item_identifier: "msg-1".to_string(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&response).expect("response should serialize"),
            serde_json::json!({"batchItemFailures": [{"itemIdentifier": "msg-1"}]})
        );
    }
}
