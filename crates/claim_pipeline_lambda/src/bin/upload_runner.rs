use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use aws_sdk_ecs::types::{ContainerOverride, KeyValuePair, LaunchType, TaskOverride};
use claim_pipeline_lambda::adapters::logs::{LogTailReader, LogTailRequest};
use claim_pipeline_lambda::adapters::notify::ResultPublisher;
use claim_pipeline_lambda::adapters::pause::RuntimePause;
use claim_pipeline_lambda::adapters::secrets::SecretSource;
use claim_pipeline_lambda::adapters::worker::{LaunchRequest, WorkerLauncher, WorkerRunStatus};
use claim_pipeline_lambda::config::OrchestratorConfig;
use claim_pipeline_lambda::handlers::orchestrator::{
    handle_upload_batch_until, OrchestratorDeps,
};
use claim_pipeline_lambda::runtime::contract::WorkerPhase;
use claim_pipeline_lambda::runtime::log_stream::LogSink;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, warn};

struct SecretsManagerSource {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretSource for SecretsManagerSource {
    fn fetch_secret(&self, secret_id: &str) -> Result<String, String> {
        let client = self.client.clone();
        let secret_id = secret_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_secret_value()
                    .secret_id(secret_id)
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "get_secret_value failed: {}",
                            aws_sdk_secretsmanager::error::DisplayErrorContext(&error)
                        )
                    })?;
                output
                    .secret_string()
                    .map(str::to_string)
                    .ok_or_else(|| "secret has no string value".to_string())
            })
        })
    }
}

struct EcsWorkerLauncher {
    client: aws_sdk_ecs::Client,
}

impl WorkerLauncher for EcsWorkerLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<String, String> {
        let client = self.client.clone();
        let environment = request
            .environment
            .iter()
            .map(|entry| {
                KeyValuePair::builder()
                    .name(&entry.name)
                    .value(&entry.value)
                    .build()
            })
            .collect::<Vec<_>>();
        let overrides = TaskOverride::builder()
            .container_overrides(
                ContainerOverride::builder()
                    .name(&request.container_name)
                    .set_environment(Some(environment))
                    .build(),
            )
            .build();
        let request = request.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .run_task()
                    .cluster(request.cluster)
                    .task_definition(request.task_definition)
                    .launch_type(LaunchType::from(request.launch_type.as_str()))
                    .count(1)
                    .overrides(overrides)
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "run_task failed: {}",
                            aws_sdk_ecs::error::DisplayErrorContext(&error)
                        )
                    })?;

                if let Some(task_arn) = output.tasks().first().and_then(|task| task.task_arn()) {
                    return Ok(task_arn.to_string());
                }
                let reasons = output
                    .failures()
                    .iter()
                    .map(|failure| failure.reason().unwrap_or("unknown").to_string())
                    .collect::<Vec<_>>();
                Err(if reasons.is_empty() {
                    "run_task returned no task".to_string()
                } else {
                    format!("run_task returned no task: {}", reasons.join(", "))
                })
            })
        })
    }

    fn describe(
        &self,
        cluster: &str,
        run_id: &str,
        container_name: &str,
    ) -> Result<WorkerRunStatus, String> {
        let client = self.client.clone();
        let cluster = cluster.to_string();
        let run_id = run_id.to_string();
        let container_name = container_name.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .describe_tasks()
                    .cluster(cluster)
                    .tasks(&run_id)
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "describe_tasks failed: {}",
                            aws_sdk_ecs::error::DisplayErrorContext(&error)
                        )
                    })?;
                let task = output
                    .tasks()
                    .first()
                    .ok_or_else(|| format!("task {run_id} was not found"))?;

                let phase = WorkerPhase::from_last_status(task.last_status().unwrap_or_default());
                let containers = task.containers();
                let container = containers
                    .iter()
                    .find(|container| container.name() == Some(container_name.as_str()))
                    .or_else(|| containers.first());

                Ok(WorkerRunStatus {
                    phase,
                    exit_code: container.and_then(|container| container.exit_code()),
                    stopped_reason: task.stopped_reason().map(str::to_string),
                })
            })
        })
    }

    fn log_sink(&self, task_definition: &str, container_name: &str) -> Result<LogSink, String> {
        let client = self.client.clone();
        let task_definition = task_definition.to_string();
        let container_name = container_name.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .describe_task_definition()
                    .task_definition(&task_definition)
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "describe_task_definition failed: {}",
                            aws_sdk_ecs::error::DisplayErrorContext(&error)
                        )
                    })?;
                let definition = output
                    .task_definition()
                    .ok_or_else(|| format!("task definition {task_definition} was not found"))?;
                let options = definition
                    .container_definitions()
                    .iter()
                    .find(|container| container.name() == Some(container_name.as_str()))
                    .and_then(|container| container.log_configuration())
                    .and_then(|logging| logging.options())
                    .ok_or_else(|| {
                        format!("container {container_name} has no log driver options")
                    })?;
                LogSink::from_driver_options(options)
            })
        })
    }
}

struct CloudWatchLogTail {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl LogTailReader for CloudWatchLogTail {
    fn read_tail(&self, request: &LogTailRequest) -> Result<Vec<String>, String> {
        let client = self.client.clone();
        let request = request.clone();
        let limit = i32::try_from(request.limit).unwrap_or(i32::MAX);

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_log_events()
                    .log_group_name(request.group)
                    .log_stream_name(request.stream)
                    .limit(limit)
                    .start_from_head(request.start_from_head)
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "get_log_events failed: {}",
                            aws_sdk_cloudwatchlogs::error::DisplayErrorContext(&error)
                        )
                    })?;
                Ok(output
                    .events()
                    .iter()
                    .filter_map(|event| event.message())
                    .map(str::to_string)
                    .collect())
            })
        })
    }
}

struct SnsResultPublisher {
    client: aws_sdk_sns::Client,
}

impl ResultPublisher for SnsResultPublisher {
    fn publish(&self, destination: &str, subject: &str, body: &str) -> Result<(), String> {
        let client = self.client.clone();
        let topic_arn = destination.to_string();
        let subject = subject.to_string();
        let message = body.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .publish()
                    .topic_arn(topic_arn)
                    .subject(subject)
                    .message(message)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        format!(
                            "publish failed: {}",
                            aws_sdk_sns::error::DisplayErrorContext(&error)
                        )
                    })
            })
        })
    }
}

struct RuntimeDependencies {
    config: OrchestratorConfig,
    secrets: SecretsManagerSource,
    launcher: EcsWorkerLauncher,
    logs: CloudWatchLogTail,
    publisher: SnsResultPublisher,
}

async fn handle_request(
    deps: &RuntimeDependencies,
    event: LambdaEvent<Value>,
) -> Result<Value, Error> {
    let orchestrator = OrchestratorDeps {
        secrets: &deps.secrets,
        launcher: &deps.launcher,
        logs: &deps.logs,
        publisher: &deps.publisher,
        pause: &RuntimePause,
    };
    let deadline = invocation_deadline(event.context.deadline);
    let report =
        handle_upload_batch_until(&event.payload, &deps.config, &orchestrator, Some(deadline));

    if report.has_unidentified_failure() {
        error!(
            request_id = %event.context.request_id,
            "failed message has no messageId; failing the whole batch"
        );
        return Err(Error::from(
            "record processing failed for a message without messageId",
        ));
    }
    Ok(serde_json::to_value(report.to_batch_response())?)
}

/// Converts the runtime's epoch-millisecond deadline into a monotonic instant.
fn invocation_deadline(deadline_ms: u64) -> Instant {
    let deadline = UNIX_EPOCH + Duration::from_millis(deadline_ms);
    let remaining = deadline
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Instant::now() + remaining
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let config = OrchestratorConfig::from_env().map_err(|error| {
        error!(error = %error, "invalid orchestrator configuration");
        error
    })?;
    if config.notify_topic_arn.is_none() {
        warn!("NOTIFY_TOPIC_ARN is not set; every record will fail until it is configured");
    }

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config,
        secrets: SecretsManagerSource {
            client: aws_sdk_secretsmanager::Client::new(&aws_config),
        },
        launcher: EcsWorkerLauncher {
            client: aws_sdk_ecs::Client::new(&aws_config),
        },
        logs: CloudWatchLogTail {
            client: aws_sdk_cloudwatchlogs::Client::new(&aws_config),
        },
        publisher: SnsResultPublisher {
            client: aws_sdk_sns::Client::new(&aws_config),
        },
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(deps, event).await
    }))
    .await
}
