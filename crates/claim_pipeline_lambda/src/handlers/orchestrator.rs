//! Queue-triggered worker orchestration.
//!
//! Every inner record of every queue message is handled in order: fetch the
//! secret, launch one worker run, wait for it to stop, read its log tail and
//! publish a result summary. A failing record is collected into the batch
//! report instead of aborting the records after it.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::adapters::logs::{LogTailReader, LogTailRequest};
use crate::adapters::notify::ResultPublisher;
use crate::adapters::pause::Pause;
use crate::adapters::secrets::SecretSource;
use crate::adapters::worker::{LaunchRequest, WorkerLauncher, WorkerRunStatus};
use crate::config::OrchestratorConfig;
use crate::error::RecordError;
use crate::runtime::contract::{
    worker_environment, BatchItemFailure, BatchResponse, ObjectLocation, ResultSummary,
    LOG_TAIL_LIMIT,
};
use crate::runtime::envelope::{locations_from_body, MessageSkip, RecordSkip};
use crate::runtime::secret::SecretValue;
use crate::runtime::upload_keys::is_under_prefix;

/// Time kept back from the invocation deadline for log reading and publishing
/// once a worker stops.
pub const DEADLINE_RESERVE: Duration = Duration::from_secs(5);

/// External collaborators, passed in explicitly so the handler runs against
/// fakes in tests.
pub struct OrchestratorDeps<'a> {
    pub secrets: &'a dyn SecretSource,
    pub launcher: &'a dyn WorkerLauncher,
    pub logs: &'a dyn LogTailReader,
    pub publisher: &'a dyn ResultPublisher,
    pub pause: &'a dyn Pause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordReport {
    Skipped(RecordSkip),
    Completed(ResultSummary),
    Failed {
        location: ObjectLocation,
        error: RecordError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Skipped(MessageSkip),
    Processed(Vec<RecordReport>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReport {
    pub message_id: Option<String>,
    pub outcome: MessageOutcome,
}

impl MessageReport {
    pub fn has_failure(&self) -> bool {
        match &self.outcome {
            MessageOutcome::Skipped(_) => false,
            MessageOutcome::Processed(records) => records
                .iter()
                .any(|record| matches!(record, RecordReport::Failed { .. })),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub messages: Vec<MessageReport>,
}

impl BatchReport {
    pub fn records(&self) -> impl Iterator<Item = &RecordReport> {
        self.messages
            .iter()
            .filter_map(|message| match &message.outcome {
                MessageOutcome::Processed(records) => Some(records.iter()),
                MessageOutcome::Skipped(_) => None,
            })
            .flatten()
    }

    pub fn completed(&self) -> Vec<&ResultSummary> {
        self.records()
            .filter_map(|record| match record {
                RecordReport::Completed(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(&ObjectLocation, &RecordError)> {
        self.records()
            .filter_map(|record| match record {
                RecordReport::Failed { location, error } => Some((location, error)),
                _ => None,
            })
            .collect()
    }

    pub fn skipped_messages(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| matches!(message.outcome, MessageOutcome::Skipped(_)))
            .count()
    }

    /// A failed message that cannot be named forces whole-batch redelivery.
    pub fn has_unidentified_failure(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.has_failure() && message.message_id.is_none())
    }

    pub fn to_batch_response(&self) -> BatchResponse {
        BatchResponse {
            batch_item_failures: self
                .messages
                .iter()
                .filter(|message| message.has_failure())
                .filter_map(|message| message.message_id.clone())
                .map(|item_identifier| BatchItemFailure { item_identifier })
                .collect(),
        }
    }
}

pub fn handle_upload_batch(
    event: &Value,
    config: &OrchestratorConfig,
    deps: &OrchestratorDeps<'_>,
) -> BatchReport {
    handle_upload_batch_until(event, config, deps, None)
}

/// Like [`handle_upload_batch`], but every worker wait is cut short so it
/// ends [`DEADLINE_RESERVE`] before `deadline`.
pub fn handle_upload_batch_until(
    event: &Value,
    config: &OrchestratorConfig,
    deps: &OrchestratorDeps<'_>,
    deadline: Option<Instant>,
) -> BatchReport {
    let started_at = Instant::now();
    let messages = event
        .get("Records")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    info!(messages = messages.len(), "upload batch received");

    let mut report = BatchReport::default();
    for message in messages {
        report.messages.push(handle_message(message, config, deps, deadline));
    }

    info!(
        messages = report.messages.len(),
        skipped_messages = report.skipped_messages(),
        completed = report.completed().len(),
        failed = report.failures().len(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "upload batch finished"
    );
    report
}

fn handle_message(
    message: &Value,
    config: &OrchestratorConfig,
    deps: &OrchestratorDeps<'_>,
    deadline: Option<Instant>,
) -> MessageReport {
    let message_id = message
        .get("messageId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let Some(body) = message.get("body").and_then(Value::as_str) else {
        warn!(message_id = message_id.as_deref(), reason = %MessageSkip::MissingBody, "skipping message");
        return MessageReport {
            message_id,
            outcome: MessageOutcome::Skipped(MessageSkip::MissingBody),
        };
    };

    let locations = match locations_from_body(body) {
        Ok(locations) => locations,
        Err(skip) => {
            warn!(message_id = message_id.as_deref(), reason = %skip, "skipping message");
            return MessageReport {
                message_id,
                outcome: MessageOutcome::Skipped(skip),
            };
        }
    };

    let mut records = Vec::with_capacity(locations.len());
    for location in locations {
        let record = match location {
            Err(skip) => {
                warn!(message_id = message_id.as_deref(), reason = %skip, "skipping record");
                RecordReport::Skipped(skip)
            }
            Ok(location) if !within_upload_prefix(&location, config) => {
                let skip = RecordSkip::OutsideUploadPrefix(location);
                warn!(message_id = message_id.as_deref(), reason = %skip, "skipping record");
                RecordReport::Skipped(skip)
            }
            Ok(location) => match process_record(&location, config, deps, deadline) {
                Ok(summary) => RecordReport::Completed(summary),
                Err(record_error) => {
                    error!(
                        message_id = message_id.as_deref(),
                        bucket = %location.bucket,
                        key = %location.key,
                        stage = record_error.stage(),
                        worker_launched = record_error.worker_launched(),
                        error = %record_error,
                        "record failed"
                    );
                    RecordReport::Failed {
                        location,
                        error: record_error,
                    }
                }
            },
        };
        records.push(record);
    }

    MessageReport {
        message_id,
        outcome: MessageOutcome::Processed(records),
    }
}

fn within_upload_prefix(location: &ObjectLocation, config: &OrchestratorConfig) -> bool {
    config
        .upload_key_prefix
        .as_deref()
        .map(|prefix| is_under_prefix(&location.key, prefix))
        .unwrap_or(true)
}

fn process_record(
    location: &ObjectLocation,
    config: &OrchestratorConfig,
    deps: &OrchestratorDeps<'_>,
    deadline: Option<Instant>,
) -> Result<ResultSummary, RecordError> {
    let topic = config
        .notify_topic_arn
        .as_deref()
        .ok_or(RecordError::TopicNotConfigured)?;

    let raw_secret = deps
        .secrets
        .fetch_secret(&config.secret_id)
        .map_err(RecordError::SecretFetch)?;
    let secret = SecretValue::from_secret_string(&raw_secret, &config.secret_field);

    let request = LaunchRequest {
        cluster: config.cluster.clone(),
        task_definition: config.task_definition.clone(),
        container_name: config.container_name.clone(),
        launch_type: config.launch_type.clone(),
        environment: worker_environment(secret.expose(), location),
    };
    let run_id = deps.launcher.launch(&request).map_err(RecordError::Launch)?;
    info!(
        bucket = %location.bucket,
        key = %location.key,
        run_id = %run_id,
        secret_fingerprint = %secret.fingerprint(),
        "worker launched"
    );

    let status = wait_for_stop(&run_id, config, deps, deadline)?;
    let exit_code = status
        .exit_code
        .ok_or_else(|| RecordError::MissingExitCode {
            run_id: run_id.clone(),
            stopped_reason: status
                .stopped_reason
                .clone()
                .unwrap_or_else(|| "no reason reported".to_string()),
        })?;

    let sink = deps
        .launcher
        .log_sink(&config.task_definition, &config.container_name)
        .map_err(RecordError::LogConfig)?;
    let log_request = LogTailRequest {
        stream: sink.stream_for(&config.container_name, &run_id),
        group: sink.group,
        limit: LOG_TAIL_LIMIT,
        start_from_head: false,
    };
    let log_lines = deps
        .logs
        .read_tail(&log_request)
        .map_err(RecordError::LogFetch)?;

    let summary = ResultSummary::new(
        location.clone(),
        run_id,
        exit_code,
        status.stopped_reason,
        log_lines,
        chrono::Utc::now().to_rfc3339(),
    );
    deps.publisher
        .publish(topic, &summary.subject(), &summary.body())
        .map_err(RecordError::Publish)?;

    info!(
        bucket = %location.bucket,
        key = %location.key,
        run_id = %summary.run_id,
        exit_code = summary.exit_code,
        verdict = summary.verdict.label(),
        log_lines = summary.log_tail.len(),
        "result published"
    );
    Ok(summary)
}

/// Polls the worker until it stops or the wait policy runs out. The worker
/// is not cancelled on timeout.
fn wait_for_stop(
    run_id: &str,
    config: &OrchestratorConfig,
    deps: &OrchestratorDeps<'_>,
    deadline: Option<Instant>,
) -> Result<WorkerRunStatus, RecordError> {
    let policy = match deadline {
        Some(deadline) => config.wait_policy.clamped_to(
            deadline
                .saturating_duration_since(Instant::now())
                .saturating_sub(DEADLINE_RESERVE),
        ),
        None => config.wait_policy,
    };
    let max_polls = policy.max_polls();

    for poll in 1..=max_polls {
        let status = deps
            .launcher
            .describe(&config.cluster, run_id, &config.container_name)
            .map_err(|cause| RecordError::WaitFailed {
                run_id: run_id.to_string(),
                cause,
            })?;
        if status.is_stopped() {
            return Ok(status);
        }
        if poll < max_polls {
            deps.pause.pause(policy.poll_interval());
        }
    }

    Err(RecordError::WaitTimedOut {
        run_id: run_id.to_string(),
        waited_secs: policy.timeout().as_secs(),
    })
}
